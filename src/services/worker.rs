//! Queue worker loop
//!
//! A single long-lived task claims queued URLs one at a time, scrapes them,
//! persists the result and backs off when the source site starts throttling.
//! Control state and counters live in a [`WorkerSession`] owned by the
//! [`QueueWorker`] and shared with the status endpoints.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::models::queue::QueueEntry;
use crate::services::catalog::{CatalogError, CatalogStore};
use crate::services::clock::Clock;
use crate::services::orchestrator::{ScrapeError, Scraper};
use crate::services::queue::{QueueError, ScrapeQueue};

/// Pacing rules toward the source site.
#[derive(Debug, Clone)]
pub struct WorkerPolicy {
    pub inter_request_delay: Duration,
    pub short_cooldown: Duration,
    pub long_cooldown: Duration,
    /// Consecutive rate-limit hits that trigger the long cooldown.
    pub rate_limit_threshold: u32,
    pub recent_error_capacity: usize,
}

impl Default for WorkerPolicy {
    fn default() -> Self {
        Self {
            inter_request_delay: Duration::from_secs(15),
            short_cooldown: Duration::from_secs(120),
            long_cooldown: Duration::from_secs(300),
            rate_limit_threshold: 3,
            recent_error_capacity: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkerState {
    Running,
    Paused,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorSample {
    pub url: String,
    pub kind: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SessionCounters {
    current_url: Option<String>,
    processed: u64,
    succeeded: u64,
    failed: u64,
    rate_limited: u64,
    skipped: u64,
    consecutive_rate_limits: u32,
    started_at: Option<DateTime<Utc>>,
    recent_errors: VecDeque<ErrorSample>,
}

/// Point-in-time view of a worker session for status reporting.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionSnapshot {
    pub state: WorkerState,
    pub current_url: Option<String>,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub rate_limited: u64,
    pub skipped: u64,
    pub consecutive_rate_limits: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub recent_errors: Vec<ErrorSample>,
}

/// Control state plus counters of the worker. Starts paused.
pub struct WorkerSession {
    state: watch::Sender<WorkerState>,
    counters: RwLock<SessionCounters>,
    error_capacity: usize,
}

impl WorkerSession {
    pub fn new(error_capacity: usize) -> Self {
        let (state, _) = watch::channel(WorkerState::Paused);
        Self {
            state,
            counters: RwLock::new(SessionCounters::default()),
            error_capacity,
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == WorkerState::Running
    }

    /// Flip to running; false when already running.
    fn try_begin(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == WorkerState::Running {
                false
            } else {
                *state = WorkerState::Running;
                true
            }
        })
    }

    /// Request a cooperative pause; true if the worker was running.
    pub fn pause(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == WorkerState::Paused {
                false
            } else {
                *state = WorkerState::Paused;
                true
            }
        })
    }

    /// Resolves once the session is paused.
    async fn paused(&self) {
        let mut rx = self.state.subscribe();
        loop {
            let paused = *rx.borrow_and_update() == WorkerState::Paused;
            if paused {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    async fn started(&self) {
        let mut counters = self.counters.write().await;
        counters.started_at = Some(Utc::now());
        counters.consecutive_rate_limits = 0;
    }

    async fn set_current(&self, url: Option<&str>) {
        self.counters.write().await.current_url = url.map(str::to_string);
    }

    async fn record_error(&self, url: &str, kind: &str, message: &str) {
        let mut counters = self.counters.write().await;
        if self.error_capacity == 0 {
            return;
        }
        while counters.recent_errors.len() >= self.error_capacity {
            counters.recent_errors.pop_front();
        }
        counters.recent_errors.push_back(ErrorSample {
            url: url.to_string(),
            kind: kind.to_string(),
            message: message.to_string(),
            at: Utc::now(),
        });
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let counters = self.counters.read().await;
        SessionSnapshot {
            state: self.state(),
            current_url: counters.current_url.clone(),
            processed: counters.processed,
            succeeded: counters.succeeded,
            failed: counters.failed,
            rate_limited: counters.rate_limited,
            skipped: counters.skipped,
            consecutive_rate_limits: counters.consecutive_rate_limits,
            started_at: counters.started_at,
            recent_errors: counters.recent_errors.iter().cloned().collect(),
        }
    }
}

/// Result of asking the worker to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    Started { reset_stuck: u64, pending: i64 },
    AlreadyRunning,
    /// A stop was requested and the in-flight scrape has not finished yet.
    Stopping,
    NothingPending { reset_stuck: u64 },
}

enum Step {
    Drained,
    Skipped,
    Succeeded,
    Failed,
    InvalidData,
    RateLimited(Duration),
}

pub struct QueueWorker {
    queue: Arc<dyn ScrapeQueue>,
    catalog: Arc<dyn CatalogStore>,
    scraper: Arc<dyn Scraper>,
    clock: Arc<dyn Clock>,
    policy: WorkerPolicy,
    session: Arc<WorkerSession>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl QueueWorker {
    pub fn new(
        queue: Arc<dyn ScrapeQueue>,
        catalog: Arc<dyn CatalogStore>,
        scraper: Arc<dyn Scraper>,
        clock: Arc<dyn Clock>,
        policy: WorkerPolicy,
    ) -> Self {
        let session = Arc::new(WorkerSession::new(policy.recent_error_capacity));
        Self {
            queue,
            catalog,
            scraper,
            clock,
            policy,
            session,
            task: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Arc<WorkerSession> {
        &self.session
    }

    /// Recover stuck entries and launch the loop as a background task.
    pub async fn start(self: &Arc<Self>) -> Result<StartOutcome, WorkerError> {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(if self.session.is_running() {
                StartOutcome::AlreadyRunning
            } else {
                StartOutcome::Stopping
            });
        }
        if !self.session.try_begin() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let prepared = self.prepare().await;
        let (reset_stuck, pending) = match prepared {
            Ok(counts) => counts,
            Err(e) => {
                self.session.pause();
                return Err(e);
            }
        };
        if pending == 0 {
            self.session.pause();
            info!(reset_stuck, "Queue worker not started, nothing pending");
            return Ok(StartOutcome::NothingPending { reset_stuck });
        }

        let worker = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            worker.run_loop().await;
        }));

        info!(reset_stuck, pending, "Queue worker started");
        Ok(StartOutcome::Started {
            reset_stuck,
            pending,
        })
    }

    /// Ask the loop to pause after the in-flight scrape. True if it was running.
    pub fn stop(&self) -> bool {
        let was_running = self.session.pause();
        if was_running {
            info!("Queue worker stop requested");
        }
        was_running
    }

    /// Run the loop on the current task until the queue is drained or the
    /// session is paused.
    pub async fn run_until_drained(&self) -> Result<SessionSnapshot, WorkerError> {
        if !self.session.try_begin() {
            return Ok(self.session.snapshot().await);
        }
        if let Err(e) = self.prepare().await {
            self.session.pause();
            return Err(e);
        }
        self.run_loop().await;
        Ok(self.session.snapshot().await)
    }

    async fn prepare(&self) -> Result<(u64, i64), WorkerError> {
        let reset = self.queue.reset_stuck().await?;
        if reset > 0 {
            warn!(reset, "Recovered entries left in processing");
        }
        let pending = self.queue.stats().await?.pending;
        self.session.started().await;
        Ok((reset, pending))
    }

    async fn run_loop(&self) {
        while self.session.is_running() {
            let step = match self.step().await {
                Ok(step) => step,
                Err(e) => {
                    error!(error = %e, "Queue worker iteration failed");
                    self.session.record_error("", "queue", &e.to_string()).await;
                    Step::Failed
                }
            };

            match step {
                Step::Drained => {
                    info!("Queue drained");
                    break;
                }
                Step::Skipped | Step::InvalidData => continue,
                Step::Succeeded | Step::Failed => {
                    self.pause_for(self.policy.inter_request_delay).await
                }
                Step::RateLimited(cooldown) => self.pause_for(cooldown).await,
            }
        }

        self.session.pause();
        self.session.set_current(None).await;
        let snapshot = self.session.snapshot().await;
        info!(
            processed = snapshot.processed,
            succeeded = snapshot.succeeded,
            failed = snapshot.failed,
            rate_limited = snapshot.rate_limited,
            skipped = snapshot.skipped,
            "Queue worker stopped"
        );
    }

    async fn step(&self) -> Result<Step, WorkerError> {
        let Some(entry) = self.queue.dequeue_next().await? else {
            return Ok(Step::Drained);
        };
        let url = entry.url.as_str();
        self.session.set_current(Some(url)).await;

        if !entry.force_rescrape && self.catalog.exists_by_source_url(url).await? {
            debug!(url, "Already in catalog, skipping");
            self.queue.mark_done(url).await?;
            self.session.counters.write().await.skipped += 1;
            return Ok(Step::Skipped);
        }

        info!(
            url,
            retry_count = entry.retry_count,
            force = entry.force_rescrape,
            "Scraping queued URL"
        );
        let outcome = if entry.force_rescrape {
            self.scraper.scrape_fresh(url).await
        } else {
            self.scraper.scrape_one(url).await
        };
        self.session.counters.write().await.processed += 1;

        match outcome {
            Ok(perfume) => self.persist(&entry, &perfume).await,
            Err(ScrapeError::RateLimited(message)) => self.requeue(&entry, &message).await,
            Err(e @ ScrapeError::InvalidData(_)) => {
                self.fail(&entry, &e).await?;
                self.session.counters.write().await.consecutive_rate_limits = 0;
                Ok(Step::InvalidData)
            }
            Err(e) => {
                self.fail(&entry, &e).await?;
                Ok(Step::Failed)
            }
        }
    }

    async fn persist(
        &self,
        entry: &QueueEntry,
        perfume: &crate::models::perfume::ScrapedPerfume,
    ) -> Result<Step, WorkerError> {
        match self.catalog.upsert(perfume).await {
            Ok(stored) => {
                self.queue.mark_done(&entry.url).await?;
                let mut counters = self.session.counters.write().await;
                counters.succeeded += 1;
                counters.consecutive_rate_limits = 0;
                info!(url = %entry.url, id = %stored.id, name = %stored.name, "Perfume saved");
                Ok(Step::Succeeded)
            }
            Err(e) => {
                let message = format!("catalog upsert failed: {}", e);
                error!(url = %entry.url, error = %e, "Failed to save scraped perfume");
                self.queue.mark_failed(&entry.url, &message).await?;
                self.session.counters.write().await.failed += 1;
                self.session.record_error(&entry.url, "catalog", &message).await;
                Ok(Step::Failed)
            }
        }
    }

    async fn requeue(&self, entry: &QueueEntry, message: &str) -> Result<Step, WorkerError> {
        self.queue.mark_pending(&entry.url).await?;

        let cooldown = {
            let mut counters = self.session.counters.write().await;
            counters.rate_limited += 1;
            counters.consecutive_rate_limits += 1;
            if counters.consecutive_rate_limits >= self.policy.rate_limit_threshold {
                counters.consecutive_rate_limits = 0;
                self.policy.long_cooldown
            } else {
                self.policy.short_cooldown
            }
        };

        warn!(
            url = %entry.url,
            cooldown_secs = cooldown.as_secs(),
            "Rate limited, requeued"
        );
        self.session.record_error(&entry.url, "rate_limited", message).await;
        Ok(Step::RateLimited(cooldown))
    }

    async fn fail(&self, entry: &QueueEntry, err: &ScrapeError) -> Result<(), WorkerError> {
        let message = err.to_string();
        warn!(url = %entry.url, kind = err.kind(), error = %message, "Scrape failed");
        self.queue.mark_failed(&entry.url, &message).await?;
        self.session.counters.write().await.failed += 1;
        self.session.record_error(&entry.url, err.kind(), &message).await;
        Ok(())
    }

    /// Sleep through the clock, waking early if the session is paused.
    async fn pause_for(&self, duration: Duration) {
        tokio::select! {
            _ = self.clock.sleep(duration) => {}
            _ = self.session.paused() => debug!("Delay cut short by stop request"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}
