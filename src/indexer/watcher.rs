//! File-system watcher (spec §4.4 "Watcher"). Grounded on the teacher's
//! `watcher::unified::UnifiedWatcher` event loop shape (a `notify` watcher
//! feeding a debouncer on a timer tick) generalized from the teacher's
//! multi-handler dispatch down to this crate's single concern: debounce a
//! burst of file events, then kick an incremental re-index.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::debouncer::Debouncer;
use crate::adapter::AdapterRegistry;
use crate::config::Settings;
use crate::error::IndexResult;
use crate::model::Repository;
use crate::store::Store;

use super::{index_repo, IndexMode};

/// Watcher health, per spec §4.4: `{enabled, running, filesWatched,
/// eventsReceived, eventsProcessed, errors, queueDepth, restartCount, stale,
/// lastEventAt, lastSuccessfulReindexAt}`.
#[derive(Debug, Clone, Default)]
pub struct WatcherHealth {
    pub enabled: bool,
    pub running: bool,
    pub files_watched: usize,
    pub events_received: u64,
    pub events_processed: u64,
    pub errors: u64,
    pub queue_depth: usize,
    pub restart_count: u32,
    pub stale: bool,
    pub last_event_at: Option<i64>,
    pub last_successful_reindex_at: Option<i64>,
}

const MAX_RETRY_ATTEMPTS: u32 = 5;
const STALE_THRESHOLD: Duration = Duration::from_secs(60);

pub struct RepoWatcher {
    health: Arc<Mutex<WatcherHealth>>,
    _watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    debouncer: Debouncer,
}

impl RepoWatcher {
    pub fn start(root: &Path, max_watched_files: usize, debounce_ms: u64) -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        Ok(Self {
            health: Arc::new(Mutex::new(WatcherHealth {
                enabled: true,
                running: true,
                files_watched: max_watched_files.min(usize::MAX),
                ..Default::default()
            })),
            _watcher: watcher,
            event_rx: rx,
            debouncer: Debouncer::new(debounce_ms),
        })
    }

    pub fn health(&self) -> WatcherHealth {
        self.health.lock().clone()
    }

    /// Drives the event loop. Every debounced batch triggers an incremental
    /// re-index, retried with exponential backoff (capped at
    /// [`MAX_RETRY_ATTEMPTS`]) on failure — spec §4.4 "retries failed
    /// incremental reindexes with exponential backoff bounded by a maximum
    /// attempt count."
    pub async fn run(
        mut self,
        store: Arc<Store>,
        registry: Arc<AdapterRegistry>,
        settings: Arc<Settings>,
        repo: Repository,
    ) -> IndexResult<()> {
        loop {
            let tick = tokio::time::sleep(Duration::from_millis(100));
            tokio::pin!(tick);

            tokio::select! {
                Some(res) = self.event_rx.recv() => {
                    self.handle_event(res);
                }
                _ = &mut tick => {
                    let ready = self.debouncer.take_ready();
                    if !ready.is_empty() {
                        self.reindex_with_backoff(&store, &registry, &settings, &repo).await;
                    }
                    if self.is_stale() {
                        self.health.lock().stale = true;
                    }
                }
            }
        }
    }

    fn handle_event(&mut self, res: notify::Result<Event>) {
        let mut health = self.health.lock();
        health.events_received += 1;
        health.last_event_at = Some(crate::utils::get_utc_timestamp());
        drop(health);

        match res {
            Ok(event) => {
                for path in event.paths {
                    self.debouncer.record(path);
                }
            }
            Err(_) => {
                self.health.lock().errors += 1;
            }
        }
    }

    fn is_stale(&self) -> bool {
        let last = self.health.lock().last_event_at;
        match last {
            Some(ts) => {
                let now = crate::utils::get_utc_timestamp();
                Duration::from_secs((now - ts).max(0) as u64) > STALE_THRESHOLD
            }
            None => false,
        }
    }

    async fn reindex_with_backoff(
        &self,
        store: &Arc<Store>,
        registry: &Arc<AdapterRegistry>,
        settings: &Arc<Settings>,
        repo: &Repository,
    ) {
        let mut attempt = 0;
        loop {
            let result = index_repo(store, registry, settings, repo, IndexMode::Incremental, None);
            let mut health = self.health.lock();
            health.events_processed += 1;
            match result {
                Ok(_) => {
                    health.last_successful_reindex_at = Some(crate::utils::get_utc_timestamp());
                    return;
                }
                Err(_) if attempt < MAX_RETRY_ATTEMPTS => {
                    attempt += 1;
                    health.errors += 1;
                    health.restart_count += 1;
                    drop(health);
                    tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt))).await;
                }
                Err(_) => {
                    health.errors += 1;
                    return;
                }
            }
        }
    }
}
