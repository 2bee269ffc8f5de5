//! Core types shared by the chain collaborators and the gallery pipeline.

use crate::error::GalleryError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use alloy_primitives::{Address, U256};

/// Identifier of a minted business card token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub u64);

impl CardId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for CardId {
    fn from(value: u64) -> Self {
        CardId(value)
    }
}

impl From<CardId> for U256 {
    fn from(card: CardId) -> Self {
        U256::from(card.0)
    }
}

impl TryFrom<U256> for CardId {
    type Error = GalleryError;

    fn try_from(value: U256) -> Result<Self, Self::Error> {
        u64::try_from(value)
            .map(CardId)
            .map_err(|_| GalleryError::fetch(format!("token id {} does not fit in 64 bits", value)))
    }
}

/// One metadata trait on a card.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeEntry {
    pub trait_type: String,
    pub value: String,
}

impl AttributeEntry {
    pub fn new(trait_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            trait_type: trait_type.into(),
            value: value.into(),
        }
    }
}

/// Card metadata as served by the token URI.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CardMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub attributes: Vec<AttributeEntry>,
}

impl CardMetadata {
    /// Decode a metadata document, rejecting a missing or malformed attribute list.
    pub fn from_json(card: CardId, document: &serde_json::Value) -> Result<Self, GalleryError> {
        let shape_error = |reason: String| GalleryError::MetadataShape { card, reason };

        let object = document
            .as_object()
            .ok_or_else(|| shape_error("document is not a JSON object".to_string()))?;

        let raw_attributes = object
            .get("attributes")
            .ok_or_else(|| shape_error("missing `attributes`".to_string()))?
            .as_array()
            .ok_or_else(|| shape_error("`attributes` is not a list".to_string()))?;

        let mut attributes = Vec::with_capacity(raw_attributes.len());
        for (index, raw) in raw_attributes.iter().enumerate() {
            let trait_type = raw
                .get("trait_type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| shape_error(format!("attribute {} has no string `trait_type`", index)))?;

            let value = match raw.get("value") {
                None | Some(serde_json::Value::Null) => String::new(),
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Number(n)) => n.to_string(),
                Some(serde_json::Value::Bool(b)) => b.to_string(),
                Some(_) => {
                    return Err(shape_error(format!(
                        "attribute `{}` has a non-scalar value",
                        trait_type
                    )))
                }
            };

            attributes.push(AttributeEntry::new(trait_type, value));
        }

        let text = |key: &str| object.get(key).and_then(|v| v.as_str()).map(str::to_string);

        Ok(Self {
            name: text("name"),
            description: text("description"),
            image: text("image"),
            attributes,
        })
    }
}

/// A marketplace listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketItem {
    pub token_id: CardId,
    pub seller: Address,
    /// Asking price in wei
    pub price: U256,
}
