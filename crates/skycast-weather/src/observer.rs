//! Consumer-side reactive query.
//!
//! A [`QueryObserver`] follows one cache key at a time, derived from a
//! metric and the caller's [`CoordinateQuery`]. It exposes a [`QueryView`]
//! through a watch channel or a callback subscription.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cache::{EntrySnapshot, FetchStatus, QueryCache};
use crate::types::{CacheKey, CoordinateQuery, Metric};

/// What the presentation layer renders
#[derive(Debug, Clone, PartialEq)]
pub struct QueryView {
    pub query: CoordinateQuery,
    pub status: FetchStatus,
    /// Last successfully fetched display value. Kept while loading and on a
    /// failed refetch; cleared when the observed key fails without ever succeeding.
    pub display: Option<String>,
    /// User-facing message for the latest failure
    pub error: Option<String>,
}

struct ObserverState {
    query: CoordinateQuery,
    /// Bumped whenever the observed key changes
    generation: u64,
    applied_version: Option<u64>,
    active: bool,
    forwarder: Option<JoinHandle<()>>,
}

struct Shared {
    cache: Arc<QueryCache>,
    metric: Metric,
    state: Mutex<ObserverState>,
    view: watch::Sender<QueryView>,
}

impl Shared {
    /// Fold an entry snapshot into the view if it belongs to the current key
    /// and is newer than anything applied so far.
    fn apply(&self, generation: u64, snapshot: &EntrySnapshot) {
        let mut state = self.state.lock();
        if state.generation != generation {
            return;
        }
        if state
            .applied_version
            .is_some_and(|v| snapshot.version <= v)
        {
            return;
        }
        state.applied_version = Some(snapshot.version);

        self.view.send_if_modified(|view| {
            let mut next = view.clone();
            next.status = snapshot.status;
            match (&snapshot.display, snapshot.status) {
                (Some(display), _) => next.display = Some(display.clone()),
                // This key never succeeded; a value from another location would mislead.
                (None, FetchStatus::Error) => next.display = None,
                (None, _) => {}
            }
            next.error = match snapshot.status {
                FetchStatus::Error => snapshot.error.as_ref().map(|e| e.user_message()),
                _ => None,
            };
            if *view == next {
                false
            } else {
                *view = next;
                true
            }
        });
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.state.get_mut().forwarder.take() {
            handle.abort();
        }
    }
}

/// Forward every change of the observed entry into the view.
fn spawn_forwarder(
    shared: Weak<Shared>,
    mut rx: watch::Receiver<EntrySnapshot>,
    generation: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            match shared.upgrade() {
                Some(shared) => shared.apply(generation, &snapshot),
                None => break,
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    })
}

/// Live query over one metric at a caller-supplied location
pub struct QueryObserver {
    shared: Arc<Shared>,
}

impl QueryObserver {
    pub fn new(cache: Arc<QueryCache>, metric: Metric, query: CoordinateQuery) -> Self {
        let (view, _rx) = watch::channel(QueryView {
            query: query.clone(),
            status: FetchStatus::Idle,
            display: None,
            error: None,
        });

        Self {
            shared: Arc::new(Shared {
                cache,
                metric,
                state: Mutex::new(ObserverState {
                    query,
                    generation: 0,
                    applied_version: None,
                    active: false,
                    forwarder: None,
                }),
                view,
            }),
        }
    }

    /// Observer of the current temperature, rendered as `"<temp>°C"`.
    pub fn temperature(cache: Arc<QueryCache>, query: CoordinateQuery) -> Self {
        Self::new(cache, Metric::Current, query)
    }

    pub fn metric(&self) -> Metric {
        self.shared.metric
    }

    pub fn query(&self) -> CoordinateQuery {
        self.shared.state.lock().query.clone()
    }

    pub fn view(&self) -> QueryView {
        self.shared.view.borrow().clone()
    }

    pub fn display(&self) -> Option<String> {
        self.shared.view.borrow().display.clone()
    }

    /// Start observing the current query and fetch it unless fresh.
    pub async fn start(&self) -> QueryView {
        let query = self.query();
        self.run(query, false).await
    }

    /// Switch to a new location. Any field change is a new cache key; the
    /// result of a request still in flight for the old key is ignored.
    pub async fn set_query(&self, query: CoordinateQuery) -> QueryView {
        self.run(query, false).await
    }

    /// The consuming surface became active again.
    pub async fn focus(&self) -> QueryView {
        let query = self.query();
        let force = self.shared.cache.policy().refetch_on_focus;
        self.run(query, force).await
    }

    /// Fetch the current key regardless of freshness.
    pub async fn refetch(&self) -> QueryView {
        let query = self.query();
        self.run(query, true).await
    }

    async fn run(&self, query: CoordinateQuery, force: bool) -> QueryView {
        let key = CacheKey::new(self.shared.metric, &query);
        let generation = self.activate(query, &key);

        let snapshot = if force {
            self.shared.cache.refetch(&key).await
        } else {
            self.shared.cache.ensure(&key).await
        };
        self.shared.apply(generation, &snapshot);

        self.view()
    }

    /// Point the observer at `key`, rewiring the forwarder if it changed.
    fn activate(&self, query: CoordinateQuery, key: &CacheKey) -> u64 {
        let mut state = self.shared.state.lock();
        if state.active && state.query == query {
            return state.generation;
        }

        tracing::debug!("Observer switching to {}", key);
        if let Some(handle) = state.forwarder.take() {
            handle.abort();
        }
        state.generation += 1;
        state.applied_version = None;
        state.active = true;
        state.query = query.clone();

        let rx = self.shared.cache.subscribe(key);
        state.forwarder = Some(spawn_forwarder(
            Arc::downgrade(&self.shared),
            rx,
            state.generation,
        ));

        self.shared.view.send_modify(|view| view.query = query);
        state.generation
    }

    /// Watch the view; dropping the receiver unregisters.
    pub fn subscribe(&self) -> watch::Receiver<QueryView> {
        self.shared.view.subscribe()
    }

    /// Call `handler` on every view change until the returned guard is dropped.
    pub fn on_update<F>(&self, mut handler: F) -> Subscription
    where
        F: FnMut(&QueryView) + Send + 'static,
    {
        let mut rx = self.shared.view.subscribe();
        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let view = rx.borrow_and_update().clone();
                handler(&view);
            }
        });
        Subscription { task }
    }
}

/// Registration of an update handler; unregisters on drop.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
