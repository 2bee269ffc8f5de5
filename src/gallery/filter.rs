//! Attribute filtering of candidate sets against card metadata.
//!
//! A query constrains the five common traits to sets of accepted values and
//! lists "special" traits that must be present. Special traits are matched by
//! a normalized marker: for `Shadow` and `Special lettering` the value names
//! the trait (a card has a "Long" shadow), for everything else the trait type
//! does.

use crate::chain::MetadataCache;
use crate::error::{GalleryError, Result};
use crate::gallery::types::CandidateSet;
use crate::types::{AttributeEntry, CardId, CardMetadata};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, instrument};

/// Traits every card carries, filtered by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommonTrait {
    Setting,
    Paper,
    Coloring,
    Font,
    Location,
}

impl CommonTrait {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommonTrait::Setting => "Setting",
            CommonTrait::Paper => "Paper",
            CommonTrait::Coloring => "Coloring",
            CommonTrait::Font => "Font",
            CommonTrait::Location => "Location",
        }
    }

    pub fn all() -> [CommonTrait; 5] {
        [
            CommonTrait::Setting,
            CommonTrait::Paper,
            CommonTrait::Coloring,
            CommonTrait::Font,
            CommonTrait::Location,
        ]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|t| t.as_str() == name)
    }
}

/// Marker identifying a special trait.
fn special_marker<'a>(trait_type: &'a str, value: &'a str) -> &'a str {
    match trait_type {
        "Shadow" | "Special lettering" => value,
        _ => trait_type,
    }
}

/// A structured search over card attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterQuery {
    #[serde(rename = "Setting", default)]
    pub setting: BTreeSet<String>,
    #[serde(rename = "Paper", default)]
    pub paper: BTreeSet<String>,
    #[serde(rename = "Coloring", default)]
    pub coloring: BTreeSet<String>,
    #[serde(rename = "Font", default)]
    pub font: BTreeSet<String>,
    #[serde(rename = "Location", default)]
    pub location: BTreeSet<String>,
    /// Free-form traits that must all be present
    #[serde(rename = "Special", default)]
    pub special: Vec<AttributeEntry>,
}

impl FilterQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `values` for `common_trait` (in addition to any already accepted).
    pub fn with_values<I, S>(mut self, common_trait: CommonTrait, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_mut(common_trait)
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Require a special trait.
    pub fn with_special(mut self, trait_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.special.push(AttributeEntry::new(trait_type, value));
        self
    }

    pub fn allowed(&self, common_trait: CommonTrait) -> &BTreeSet<String> {
        match common_trait {
            CommonTrait::Setting => &self.setting,
            CommonTrait::Paper => &self.paper,
            CommonTrait::Coloring => &self.coloring,
            CommonTrait::Font => &self.font,
            CommonTrait::Location => &self.location,
        }
    }

    fn allowed_mut(&mut self, common_trait: CommonTrait) -> &mut BTreeSet<String> {
        match common_trait {
            CommonTrait::Setting => &mut self.setting,
            CommonTrait::Paper => &mut self.paper,
            CommonTrait::Coloring => &mut self.coloring,
            CommonTrait::Font => &mut self.font,
            CommonTrait::Location => &mut self.location,
        }
    }

    /// No constraint at all; filtering with it is a no-op.
    pub fn is_empty(&self) -> bool {
        self.special.is_empty() && CommonTrait::all().iter().all(|t| self.allowed(*t).is_empty())
    }

    /// Whether a card with `metadata` satisfies the query.
    pub fn matches(&self, metadata: &CardMetadata) -> bool {
        let mut markers = HashSet::new();

        for attribute in &metadata.attributes {
            match CommonTrait::from_name(&attribute.trait_type) {
                Some(common_trait) => {
                    let allowed = self.allowed(common_trait);
                    if !allowed.is_empty() && !allowed.contains(&attribute.value) {
                        return false;
                    }
                }
                None if !attribute.value.is_empty() => {
                    markers.insert(special_marker(&attribute.trait_type, &attribute.value));
                }
                None => {}
            }
        }

        self.special
            .iter()
            .all(|entry| markers.contains(special_marker(&entry.trait_type, &entry.value)))
    }
}

/// Narrows candidate sets by matching fetched metadata against a query.
#[derive(Clone)]
pub struct AttributeFilterEngine {
    metadata: MetadataCache,
    concurrency: usize,
}

impl AttributeFilterEngine {
    pub fn new(metadata: MetadataCache, concurrency: usize) -> Self {
        Self {
            metadata,
            concurrency: concurrency.max(1),
        }
    }

    /// Order-preserving subsequence of `candidates` whose metadata matches.
    #[instrument(skip(self, query, candidates), fields(candidates = candidates.len()))]
    pub async fn apply(&self, query: &FilterQuery, candidates: CandidateSet) -> Result<CandidateSet> {
        if query.is_empty() {
            debug!("Empty query, skipping metadata fetches");
            return Ok(candidates);
        }

        let verdicts: Vec<(CardId, bool)> = stream::iter(candidates.cards().to_vec())
            .map(|card| async move {
                let metadata = self.metadata.get(card).await?;
                Ok::<_, GalleryError>((card, query.matches(&metadata)))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let passing: HashSet<CardId> = verdicts
            .into_iter()
            .filter_map(|(card, passes)| passes.then_some(card))
            .collect();

        let total = candidates.len();
        let filtered = candidates.retain(|card| passing.contains(&card));
        info!("Filter kept {} of {} candidates", filtered.len(), total);

        Ok(filtered)
    }
}
