//! Gallery events and the switch/account/search state they update.

use crate::gallery::filter::FilterQuery;
use crate::gallery::mode::ViewModeResolver;
use crate::gallery::types::ViewMode;
use crate::types::Address;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSwitch {
    Owned(bool),
    Marketplace(bool),
}

/// Everything that can happen to a gallery.
#[derive(Debug, Clone, PartialEq)]
pub enum GalleryEvent {
    /// Initial load, or a manual retry after an error
    Refresh,
    ModeChanged(ModeSwitch),
    AccountChanged(Option<Address>),
    SearchChanged(Option<FilterQuery>),
    /// The viewport came close to the end of the loaded content
    ScrollThreshold,
}

/// Work an event asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Resolve a new candidate set and load its first page
    Refetch,
    /// Load the next page of the current candidate set
    LoadPage(usize),
    Nothing,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GalleryState {
    pub owned_on: bool,
    pub marketplace_on: bool,
    pub account: Option<Address>,
    pub search: Option<FilterQuery>,
}

impl GalleryState {
    pub fn mode(&self) -> ViewMode {
        ViewModeResolver::resolve_for(self.owned_on, self.marketplace_on, self.account.as_ref()).1
    }

    /// Return the view switches and search to those of `shown` after a
    /// failed cycle. The account is an external fact and stays as reported.
    pub fn restore_view(&mut self, shown: &GalleryState) {
        self.marketplace_on = shown.marketplace_on;
        self.search = shown.search.clone();
        self.owned_on = shown.owned_on && self.account.is_some();
    }

    /// Apply `event` and return the action it calls for.
    pub fn apply(&mut self, event: GalleryEvent, scroll_page_size: usize) -> Action {
        match event {
            GalleryEvent::Refresh => Action::Refetch,
            GalleryEvent::ModeChanged(ModeSwitch::Owned(on)) => {
                if on == self.owned_on {
                    return Action::Nothing;
                }
                if on && self.account.is_none() {
                    warn!("Ignoring owned switch without a connected account");
                    return Action::Nothing;
                }
                self.owned_on = on;
                Action::Refetch
            }
            GalleryEvent::ModeChanged(ModeSwitch::Marketplace(on)) => {
                if on == self.marketplace_on {
                    return Action::Nothing;
                }
                self.marketplace_on = on;
                Action::Refetch
            }
            GalleryEvent::AccountChanged(account) => {
                if account == self.account {
                    return Action::Nothing;
                }
                self.account = account;
                if !self.owned_on {
                    return Action::Nothing;
                }
                let (owned_on, _) =
                    ViewModeResolver::resolve_for(self.owned_on, self.marketplace_on, self.account.as_ref());
                if !owned_on {
                    debug!("Account disconnected, turning the owned switch off");
                }
                self.owned_on = owned_on;
                Action::Refetch
            }
            GalleryEvent::SearchChanged(search) => {
                self.search = search;
                Action::Refetch
            }
            GalleryEvent::ScrollThreshold => Action::LoadPage(scroll_page_size),
        }
    }
}
