//! The gallery controller and the service that owns it.
//!
//! [`Gallery`] turns events into resolution cycles and is the only place the
//! candidate set, loaded page and loading flag change. A cycle never touches
//! that state while it runs: it produces a [`Commit`] that is applied after
//! its last await, so dropping a cycle midway leaves the gallery untouched.
//! Switch and search changes only become the shown view once their cycle
//! commits; a failed cycle puts them back.
//! [`GalleryService`] runs one gallery behind a channel and supersedes an
//! in-flight cycle whenever a newer event arrives.

use crate::chain::CardSources;
use crate::error::{GalleryError, Result};
use crate::gallery::fetcher::CardSetFetcher;
use crate::gallery::filter::{AttributeFilterEngine, FilterQuery};
use crate::gallery::loader::{IncrementalLoader, ScrollSubscription};
use crate::gallery::state::{Action, GalleryEvent, GalleryState, ModeSwitch};
use crate::gallery::types::{CandidateSet, GalleryConfig, GallerySnapshot, LoadedCard, LoadedPage, ViewMode};
use crate::types::Address;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

/// Result of a successful cycle, applied in one step.
#[derive(Debug)]
pub enum Commit {
    /// A new candidate set together with its first page
    Replace {
        view: GalleryState,
        candidates: CandidateSet,
        first_page: Vec<LoadedCard>,
    },
    /// Next page of the current candidate set
    Append(Vec<LoadedCard>),
}

enum CycleKind {
    Resolve(GalleryState),
    Page {
        candidates: Arc<CandidateSet>,
        loaded_len: usize,
        page_size: usize,
    },
}

/// One unit of work, detached from the gallery that started it.
pub struct Cycle {
    kind: CycleKind,
    fetcher: CardSetFetcher,
    filter: AttributeFilterEngine,
    loader: IncrementalLoader,
}

impl Cycle {
    pub async fn run(self) -> Result<Commit> {
        match self.kind {
            CycleKind::Resolve(view) => {
                let mut candidates = self.fetcher.fetch(view.mode(), view.account.as_ref()).await?;
                if let Some(query) = &view.search {
                    candidates = self.filter.apply(query, candidates).await?;
                }
                let first_page = self
                    .loader
                    .load_more(&candidates, 0, self.loader.first_page_size())
                    .await?;
                Ok(Commit::Replace {
                    view,
                    candidates,
                    first_page,
                })
            }
            CycleKind::Page {
                candidates,
                loaded_len,
                page_size,
            } => {
                let page = self.loader.load_more(&candidates, loaded_len, page_size).await?;
                Ok(Commit::Append(page))
            }
        }
    }
}

/// Card-set resolution and paging for one gallery view.
pub struct Gallery {
    /// Switches as last requested
    state: GalleryState,
    /// Switches the current candidate set was resolved for
    shown: GalleryState,
    fetcher: CardSetFetcher,
    filter: AttributeFilterEngine,
    loader: IncrementalLoader,
    candidates: Arc<CandidateSet>,
    loaded: LoadedPage,
    is_loading: bool,
    last_error: Option<GalleryError>,
    scroll_threshold: f64,
}

impl Gallery {
    pub fn new(sources: CardSources, config: &GalleryConfig) -> Self {
        Self {
            state: GalleryState::default(),
            shown: GalleryState::default(),
            fetcher: CardSetFetcher::new(sources.ledger, sources.marketplace),
            filter: AttributeFilterEngine::new(sources.metadata.clone(), config.metadata_concurrency),
            loader: IncrementalLoader::new(sources.metadata, config.first_page_size, config.scroll_page_size),
            candidates: Arc::new(CandidateSet::default()),
            loaded: LoadedPage::default(),
            is_loading: false,
            last_error: None,
            scroll_threshold: config.scroll_threshold_px,
        }
    }

    pub fn state(&self) -> &GalleryState {
        &self.state
    }

    /// Mode of the cards on display.
    pub fn mode(&self) -> ViewMode {
        self.shown.mode()
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    pub fn loaded(&self) -> &LoadedPage {
        &self.loaded
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn last_error(&self) -> Option<&GalleryError> {
        self.last_error.as_ref()
    }

    pub fn scroll_threshold(&self) -> f64 {
        self.scroll_threshold
    }

    /// Handle `event` and run whatever cycle it calls for to completion.
    #[instrument(skip(self))]
    pub async fn dispatch(&mut self, event: GalleryEvent) -> Result<()> {
        let action = self.transition(event);
        self.perform(action).await
    }

    /// Run `action` to completion.
    pub async fn perform(&mut self, action: Action) -> Result<()> {
        match self.begin(action) {
            Some(cycle) => {
                let result = cycle.run().await;
                self.finish(result)
            }
            None => Ok(()),
        }
    }

    /// Update the switch state for `event`.
    pub fn transition(&mut self, event: GalleryEvent) -> Action {
        let action = self.state.apply(event, self.loader.scroll_page_size());
        if let Action::LoadPage(_) = action {
            if self.is_loading {
                debug!("Load in progress, dropping scroll trigger");
                return Action::Nothing;
            }
            if self.loaded.len() >= self.candidates.len() {
                debug!("All {} candidates loaded, dropping scroll trigger", self.candidates.len());
                return Action::Nothing;
            }
        }
        action
    }

    /// Start the cycle for `action`, marking the gallery as loading.
    pub fn begin(&mut self, action: Action) -> Option<Cycle> {
        let kind = match action {
            Action::Nothing => return None,
            Action::Refetch => CycleKind::Resolve(self.state.clone()),
            Action::LoadPage(page_size) => CycleKind::Page {
                candidates: self.candidates.clone(),
                loaded_len: self.loaded.len(),
                page_size,
            },
        };

        self.is_loading = true;
        Some(Cycle {
            kind,
            fetcher: self.fetcher.clone(),
            filter: self.filter.clone(),
            loader: self.loader.clone(),
        })
    }

    /// Apply the outcome of the cycle started by the last [`Gallery::begin`].
    pub fn finish(&mut self, result: Result<Commit>) -> Result<()> {
        self.is_loading = false;
        match result {
            Ok(commit) => {
                self.commit(commit);
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                warn!("Gallery cycle failed, keeping the {} view: {}", self.shown.mode(), e);
                self.state.restore_view(&self.shown);
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Forget the cycle started by the last [`Gallery::begin`].
    pub fn abandon(&mut self) {
        self.is_loading = false;
    }

    fn commit(&mut self, commit: Commit) {
        match commit {
            Commit::Replace {
                view,
                candidates,
                first_page,
            } => {
                info!(
                    "Showing {} of {} candidates in {} view",
                    first_page.len(),
                    candidates.len(),
                    view.mode()
                );
                self.shown = view;
                self.candidates = Arc::new(candidates);
                self.loaded = LoadedPage::default();
                self.loaded.extend(first_page);
            }
            Commit::Append(page) => {
                debug!("Appending {} cards", page.len());
                self.loaded.extend(page);
            }
        }
    }

    pub fn snapshot(&self) -> GallerySnapshot {
        GallerySnapshot {
            mode: self.shown.mode(),
            owned_on: self.shown.owned_on,
            marketplace_on: self.shown.marketplace_on,
            candidate_count: self.candidates.len(),
            loaded: self.loaded.cards().to_vec(),
            is_loading: self.is_loading,
            error: self.last_error.as_ref().map(ToString::to_string),
        }
    }
}

/// Runs a [`Gallery`] and publishes its snapshots.
pub struct GalleryService {
    gallery: Gallery,
    events: mpsc::Receiver<GalleryEvent>,
    snapshots: watch::Sender<GallerySnapshot>,
}

/// Create a service for `gallery` and the handle that drives it.
pub fn channel(gallery: Gallery, capacity: usize) -> (GalleryService, GalleryHandle) {
    let (event_tx, event_rx) = mpsc::channel(capacity.max(1));
    let (snapshot_tx, snapshot_rx) = watch::channel(gallery.snapshot());
    let handle = GalleryHandle {
        events: event_tx,
        snapshots: snapshot_rx,
        scroll_threshold: gallery.scroll_threshold(),
    };
    let service = GalleryService {
        gallery,
        events: event_rx,
        snapshots: snapshot_tx,
    };
    (service, handle)
}

impl GalleryService {
    /// Process events until every handle and scroll subscription is gone.
    ///
    /// A non-scroll event that arrives while a cycle runs drops that cycle and
    /// is handled next; if it asks for nothing, the dropped cycle is started
    /// again. Scroll events that arrive mid-cycle are discarded.
    pub async fn run(mut self) -> Gallery {
        info!("Gallery service is running...");
        while let Some(event) = self.events.recv().await {
            let action = self.gallery.transition(event);
            if !self.drive(action).await {
                break;
            }
        }
        info!("Gallery channels closed. Shutting down.");
        self.gallery
    }

    /// Run `action` and any cycles that supersede it. Returns false once the
    /// event channel is closed.
    async fn drive(&mut self, mut action: Action) -> bool {
        loop {
            let Some(cycle) = self.gallery.begin(action) else {
                self.publish();
                return true;
            };
            self.publish();

            let run = cycle.run();
            tokio::pin!(run);

            let superseded_by = loop {
                tokio::select! {
                    result = &mut run => {
                        // Errors are kept in the snapshot.
                        let _ = self.gallery.finish(result);
                        self.publish();
                        return true;
                    },
                    next = self.events.recv() => match next {
                        Some(GalleryEvent::ScrollThreshold) => {
                            debug!("Load in progress, dropping scroll trigger");
                        }
                        other => break other,
                    },
                }
            };

            self.gallery.abandon();
            let Some(event) = superseded_by else {
                self.publish();
                return false;
            };

            debug!("Superseding in-flight cycle with {:?}", event);
            action = match self.gallery.transition(event) {
                Action::Nothing => action,
                next => next,
            };
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.gallery.snapshot());
    }
}

/// Cloneable front end of a running [`GalleryService`].
#[derive(Clone)]
pub struct GalleryHandle {
    events: mpsc::Sender<GalleryEvent>,
    snapshots: watch::Receiver<GallerySnapshot>,
    scroll_threshold: f64,
}

impl GalleryHandle {
    pub async fn send(&self, event: GalleryEvent) -> Result<()> {
        self.events.send(event).await.map_err(|_| GalleryError::Closed)
    }

    pub async fn refresh(&self) -> Result<()> {
        self.send(GalleryEvent::Refresh).await
    }

    pub async fn set_owned(&self, on: bool) -> Result<()> {
        self.send(GalleryEvent::ModeChanged(ModeSwitch::Owned(on))).await
    }

    pub async fn set_marketplace(&self, on: bool) -> Result<()> {
        self.send(GalleryEvent::ModeChanged(ModeSwitch::Marketplace(on))).await
    }

    pub async fn set_account(&self, account: Option<Address>) -> Result<()> {
        self.send(GalleryEvent::AccountChanged(account)).await
    }

    pub async fn set_search(&self, search: Option<FilterQuery>) -> Result<()> {
        self.send(GalleryEvent::SearchChanged(search)).await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> GallerySnapshot {
        self.snapshots.borrow().clone()
    }

    /// Wait for the next published snapshot.
    pub async fn changed(&mut self) -> Result<GallerySnapshot> {
        self.snapshots.changed().await.map_err(|_| GalleryError::Closed)?;
        Ok(self.snapshots.borrow_and_update().clone())
    }

    /// Wait until a published snapshot satisfies `ready`.
    pub async fn wait_for(&mut self, mut ready: impl FnMut(&GallerySnapshot) -> bool) -> Result<GallerySnapshot> {
        let snapshot = self
            .snapshots
            .wait_for(|snapshot| ready(snapshot))
            .await
            .map_err(|_| GalleryError::Closed)?;
        Ok(snapshot.clone())
    }

    /// A scroll listener feeding this gallery.
    pub fn subscribe_scroll(&self) -> ScrollSubscription {
        ScrollSubscription::new(self.events.clone(), self.scroll_threshold)
    }
}
