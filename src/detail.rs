// src/detail.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use log::{debug, error, warn};
use tokio::sync::RwLock;
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::feature::Feature;
use crate::route::{RouteParams, FEATURE_NAME_PARAM};
use crate::{Backend, LaikaError};

/// How completions of overlapping requests are applied to the view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompletionOrder {
    /// Every completion is applied as it arrives, so the last one to resolve wins.
    #[default]
    LastResolved,
    /// Completions of requests issued before the most recent one are dropped.
    LatestIssued,
}

/// What the detail view renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub feature: Option<Feature>,
    pub error: Option<String>,
}

/// View-model for a single feature: follows the route, fetches the feature it
/// names and toggles its environments.
pub struct FeatureDetail<B> {
    backend: Arc<B>,
    state: RwLock<ViewState>,
    order: CompletionOrder,
    issued: AtomicU64,
}

impl<B: Backend> FeatureDetail<B> {
    pub fn new(backend: B) -> Self {
        Self::with_backend(Arc::new(backend))
    }

    pub fn with_backend(backend: Arc<B>) -> Self {
        Self {
            backend,
            state: RwLock::new(ViewState::default()),
            order: CompletionOrder::default(),
            issued: AtomicU64::new(0),
        }
    }

    pub fn with_completion_order(mut self, order: CompletionOrder) -> Self {
        self.order = order;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn snapshot(&self) -> ViewState {
        self.state.read().await.clone()
    }

    pub async fn feature(&self) -> Option<Feature> {
        self.state.read().await.feature.clone()
    }

    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Applies the outcome of request `ticket`. Returns false when the
    /// completion was dropped as stale.
    async fn settle(&self, ticket: u64, outcome: Result<Feature, String>) -> bool {
        let mut state = self.state.write().await;

        if self.order == CompletionOrder::LatestIssued {
            let latest = self.issued.load(Ordering::SeqCst);
            if ticket < latest {
                debug!("Dropping completion #{} superseded by #{}", ticket, latest);
                return false;
            }
        }

        match outcome {
            Ok(feature) => {
                state.feature = Some(feature);
                state.error = None;
            }
            Err(message) => state.error = Some(message),
        }
        true
    }

    /// Fetches `name` and shows it. On failure the previous feature stays and
    /// the error message is shown next to it.
    pub async fn load(&self, name: &str) -> Result<(), LaikaError> {
        let ticket = self.issue();
        debug!("Fetching feature {:?} (#{})", name, ticket);

        match self.backend.get_feature(name).await {
            Ok(feature) => {
                self.settle(ticket, Ok(feature)).await;
                Ok(())
            }
            Err(e) => {
                warn!("Failed to fetch feature {:?}: {}", name, e);
                self.settle(ticket, Err(e.to_string())).await;
                Err(e)
            }
        }
    }

    /// Switches `environment` of the shown feature to `status`.
    ///
    /// The locally updated copy is adopted once the backend accepts the
    /// change; whatever the backend returns is ignored. On failure the view
    /// keeps the feature as it was before the call.
    pub async fn toggle(&self, status: bool, environment: &str) -> Result<(), LaikaError> {
        let current = match self.feature().await {
            Some(feature) => feature,
            None => {
                let err = LaikaError::NoFeatureLoaded;
                self.state.write().await.error = Some(err.to_string());
                return Err(err);
            }
        };

        let ticket = self.issue();
        let updated = current.with_status(environment, status);

        match self
            .backend
            .toggle_feature(environment, &current.name, status)
            .await
        {
            Ok(_) => {
                self.settle(ticket, Ok(updated)).await;
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Failed to toggle {:?} in {:?}: {}",
                    current.name, environment, e
                );
                self.settle(ticket, Err(e.to_string())).await;
                Err(e)
            }
        }
    }
}

impl<B: Backend + 'static> FeatureDetail<B> {
    /// Follows `params` for as long as the returned subscription is alive.
    ///
    /// Each emission starts its own fetch; earlier fetches keep running.
    pub fn initialize<S>(self: &Arc<Self>, params: S) -> Subscription
    where
        S: Stream<Item = RouteParams> + Send + 'static,
    {
        let detail = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut params = Box::pin(params);
            let mut fetches = JoinSet::new();

            loop {
                tokio::select! {
                    next = params.next() => match next {
                        Some(route) => detail.on_route(route, &mut fetches).await,
                        None => break,
                    },
                    Some(joined) = fetches.join_next() => log_join(joined),
                }
            }

            while let Some(joined) = fetches.join_next().await {
                log_join(joined);
            }
            debug!("Route parameter stream ended");
        });

        Subscription {
            handle: Some(handle),
        }
    }

    async fn on_route(self: &Arc<Self>, route: RouteParams, fetches: &mut JoinSet<()>) {
        let name = match route.feature_name() {
            Some(name) => name.to_string(),
            None => {
                let err = LaikaError::MissingParam(FEATURE_NAME_PARAM.to_string());
                warn!("{}", err);
                let ticket = self.issue();
                self.settle(ticket, Err(err.to_string())).await;
                return;
            }
        };

        let detail = Arc::clone(self);
        fetches.spawn(async move {
            // already recorded in the view state
            if let Err(e) = detail.load(&name).await {
                debug!("Route fetch for {:?} failed: {}", name, e);
            }
        });
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!("Feature fetch panicked: {}", e);
        }
    }
}

/// Keeps a route subscription alive. Dropping it stops the listener and
/// aborts the fetches it still has in flight.
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn unsubscribe(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Waits until the parameter stream ends and every fetch it started has settled.
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!("Route listener panicked: {}", e);
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
