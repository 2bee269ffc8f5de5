//! View mode resolution from the gallery switches.

use crate::gallery::types::ViewMode;
use crate::types::Address;

/// Maps the two gallery switches (and the connected account) to a view mode.
pub struct ViewModeResolver;

impl ViewModeResolver {
    /// Pure mapping of the switch pair.
    pub fn resolve(owned_on: bool, marketplace_on: bool) -> ViewMode {
        match (owned_on, marketplace_on) {
            (false, false) => ViewMode::All,
            (true, false) => ViewMode::Owned,
            (false, true) => ViewMode::Marketplace,
            (true, true) => ViewMode::OwnedListings,
        }
    }

    /// Resolve with the account constraint applied: the owned switch is
    /// forced off when nobody is connected. Returns the effective owned
    /// switch alongside the mode.
    pub fn resolve_for(owned_on: bool, marketplace_on: bool, account: Option<&Address>) -> (bool, ViewMode) {
        let owned_on = owned_on && account.is_some();
        (owned_on, Self::resolve(owned_on, marketplace_on))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_table() {
        assert_eq!(ViewModeResolver::resolve(false, false), ViewMode::All);
        assert_eq!(ViewModeResolver::resolve(true, false), ViewMode::Owned);
        assert_eq!(ViewModeResolver::resolve(false, true), ViewMode::Marketplace);
        assert_eq!(ViewModeResolver::resolve(true, true), ViewMode::OwnedListings);
    }

    #[test]
    fn test_owned_requires_account() {
        let account = Address::with_last_byte(0xa1);

        assert_eq!(
            ViewModeResolver::resolve_for(true, true, None),
            (false, ViewMode::Marketplace)
        );
        assert_eq!(
            ViewModeResolver::resolve_for(true, false, None),
            (false, ViewMode::All)
        );
        assert_eq!(
            ViewModeResolver::resolve_for(true, true, Some(&account)),
            (true, ViewMode::OwnedListings)
        );
    }

    #[test]
    fn test_account_modes() {
        assert!(ViewMode::Owned.requires_account());
        assert!(ViewMode::OwnedListings.requires_account());
        assert!(!ViewMode::Marketplace.requires_account());
        assert!(ViewMode::OwnedListings.uses_marketplace());
    }
}
