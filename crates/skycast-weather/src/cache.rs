//! Keyed query cache over forecast requests.
//!
//! Each key owns one entry with an explicit status (`Idle`, `Loading`,
//! `Success`, `Error`). At most one request per key is in flight; other
//! callers wait on the entry's watch channel. Entries keep their last
//! successful body and display value across failed refetches.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::WeatherError;
use crate::forecast::ForecastClient;
use crate::retry::{with_retry, RetryConfig};
use crate::types::CacheKey;

pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(60);
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);

/// Freshness, retry and lifecycle settings for the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CachePolicy {
    /// A successful entry younger than this is reused without a request
    pub stale_time: Duration,
    /// Unobserved entries idle for longer than this are evicted
    pub gc_time: Duration,
    pub retry: RetryConfig,
    /// Whether regaining focus forces a refetch
    pub refetch_on_focus: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
            gc_time: DEFAULT_GC_TIME,
            retry: RetryConfig::default(),
            refetch_on_focus: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Point-in-time state of one cache entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot {
    pub key: CacheKey,
    pub status: FetchStatus,
    /// Last successful body
    pub data: Option<Arc<serde_json::Value>>,
    /// Display value derived from `data`
    pub display: Option<String>,
    /// Error of the latest fetch, cleared on success
    pub error: Option<WeatherError>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Bumped on every transition
    pub version: u64,
}

impl EntrySnapshot {
    fn idle(key: CacheKey) -> Self {
        Self {
            key,
            status: FetchStatus::Idle,
            data: None,
            display: None,
            error: None,
            updated_at: None,
            version: 0,
        }
    }
}

struct Entry {
    tx: watch::Sender<EntrySnapshot>,
    fetched_at: Option<Instant>,
    last_used: Instant,
    /// Bumped by `invalidate`; a fetch started under an older epoch does not
    /// mark the entry fresh.
    epoch: u64,
}

impl Entry {
    fn new(key: CacheKey) -> Self {
        let (tx, _rx) = watch::channel(EntrySnapshot::idle(key));
        Self {
            tx,
            fetched_at: None,
            last_used: Instant::now(),
            epoch: 0,
        }
    }

    fn is_fresh(&self, stale_time: Duration) -> bool {
        self.tx.borrow().status == FetchStatus::Success
            && self
                .fetched_at
                .is_some_and(|at| at.elapsed() < stale_time)
    }

    fn transition(&mut self, update: impl FnOnce(&mut EntrySnapshot)) -> EntrySnapshot {
        self.tx.send_modify(|snapshot| {
            update(snapshot);
            snapshot.version += 1;
        });
        self.tx.borrow().clone()
    }

    fn invalidate(&mut self) {
        self.fetched_at = None;
        self.epoch += 1;
    }
}

type Entries = Arc<Mutex<HashMap<CacheKey, Entry>>>;

/// What a caller should do after inspecting an entry.
enum Plan {
    Reuse(EntrySnapshot),
    Join(watch::Receiver<EntrySnapshot>),
    Fetch {
        rx: watch::Receiver<EntrySnapshot>,
        epoch: u64,
    },
}

pub struct QueryCache {
    client: ForecastClient,
    policy: CachePolicy,
    entries: Entries,
}

impl QueryCache {
    pub fn new(client: ForecastClient, policy: CachePolicy) -> Self {
        Self {
            client,
            policy,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Return the entry for `key`, fetching only if it is missing or stale.
    pub async fn ensure(&self, key: &CacheKey) -> EntrySnapshot {
        self.fetch(key, false).await
    }

    /// Fetch `key` regardless of freshness. Joins a request already in flight.
    pub async fn refetch(&self, key: &CacheKey) -> EntrySnapshot {
        self.fetch(key, true).await
    }

    /// Requests run on their own task, so dropping the returned future only
    /// stops waiting. The entry still settles into `Success` or `Error`.
    async fn fetch(&self, key: &CacheKey, force: bool) -> EntrySnapshot {
        match self.plan(key, force) {
            Plan::Reuse(snapshot) => snapshot,
            Plan::Join(rx) => self.join(key, rx).await,
            Plan::Fetch { rx, epoch } => {
                self.spawn_fetch(key.clone(), epoch);
                self.join(key, rx).await
            }
        }
    }

    fn plan(&self, key: &CacheKey, force: bool) -> Plan {
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(key.clone()));
        entry.last_used = Instant::now();

        if entry.tx.borrow().status == FetchStatus::Loading {
            tracing::debug!("Joining in-flight request for {}", key);
            return Plan::Join(entry.tx.subscribe());
        }

        if !force && entry.is_fresh(self.policy.stale_time) {
            tracing::debug!("Fresh cache hit for {}", key);
            return Plan::Reuse(entry.tx.borrow().clone());
        }

        entry.transition(|s| s.status = FetchStatus::Loading);
        Plan::Fetch {
            rx: entry.tx.subscribe(),
            epoch: entry.epoch,
        }
    }

    async fn join(&self, key: &CacheKey, mut rx: watch::Receiver<EntrySnapshot>) -> EntrySnapshot {
        let settled = rx
            .wait_for(|s| s.status != FetchStatus::Loading)
            .await
            .map(|s| s.clone());

        match settled {
            Ok(snapshot) => snapshot,
            // Entry was dropped while we waited; fall back to whatever is cached now.
            Err(_) => self
                .get(key)
                .unwrap_or_else(|| EntrySnapshot::idle(key.clone())),
        }
    }

    fn spawn_fetch(&self, key: CacheKey, epoch: u64) {
        let client = self.client.clone();
        let retry = self.policy.retry.clone();
        let entries = Arc::clone(&self.entries);

        tokio::spawn(async move {
            let query = key.query();
            let metric = key.metric;

            let result = with_retry(&retry, || client.fetch(metric, &query))
                .await
                .and_then(|body| {
                    let label = metric.display(&body)?;
                    Ok((body, label))
                });

            settle(&entries, &key, epoch, result);
        });
    }

    /// Current snapshot for `key`, if an entry exists.
    pub fn get(&self, key: &CacheKey) -> Option<EntrySnapshot> {
        self.entries.lock().get(key).map(|e| e.tx.borrow().clone())
    }

    /// Watch an entry, creating an idle one if needed.
    /// Entries with live receivers are never garbage collected.
    pub fn subscribe(&self, key: &CacheKey) -> watch::Receiver<EntrySnapshot> {
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(key.clone()));
        entry.last_used = Instant::now();
        entry.tx.subscribe()
    }

    /// Mark an entry stale so the next `ensure` refetches it.
    pub fn invalidate(&self, key: &CacheKey) {
        if let Some(entry) = self.entries.lock().get_mut(key) {
            entry.invalidate();
        }
    }

    pub fn invalidate_all(&self) {
        for entry in self.entries.lock().values_mut() {
            entry.invalidate();
        }
    }

    /// Evict entries that are idle, unobserved and unused for `gc_time`.
    /// Returns the number of evicted entries.
    pub fn collect_garbage(&self) -> usize {
        let gc_time = self.policy.gc_time;
        let mut entries = self.entries.lock();
        let before = entries.len();

        entries.retain(|key, entry| {
            let keep = entry.tx.borrow().status == FetchStatus::Loading
                || entry.tx.receiver_count() > 0
                || entry.last_used.elapsed() < gc_time;
            if !keep {
                tracing::debug!("Evicting cache entry {}", key);
            }
            keep
        });

        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Record the outcome of a request for `key`.
fn settle(
    entries: &Mutex<HashMap<CacheKey, Entry>>,
    key: &CacheKey,
    epoch: u64,
    result: Result<(serde_json::Value, String), WeatherError>,
) {
    let mut entries = entries.lock();
    let entry = entries
        .entry(key.clone())
        .or_insert_with(|| Entry::new(key.clone()));
    entry.last_used = Instant::now();

    match result {
        Ok((body, label)) => {
            tracing::info!("Fetched {}: {}", key, label);
            if entry.epoch == epoch {
                entry.fetched_at = Some(Instant::now());
            } else {
                tracing::debug!("{} was invalidated while loading", key);
            }
            entry.transition(|s| {
                s.status = FetchStatus::Success;
                s.data = Some(Arc::new(body));
                s.display = Some(label);
                s.error = None;
                s.updated_at = Some(Utc::now());
            });
        }
        Err(e) => {
            tracing::error!("Fetch for {} failed: {}", key, e);
            entry.transition(|s| {
                s.status = FetchStatus::Error;
                s.error = Some(e);
            });
        }
    }
}
