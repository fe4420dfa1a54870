//! Background reaping of idle sessions.
//!
//! The [`Evictor`] wakes on a fixed interval and removes every session that
//! has been idle for longer than the stale threshold. It only ever removes
//! whole sessions through the registry, so it never contends with an
//! in-flight action for longer than one map write.
//!
//! ```text
//!   spawn ──→ [jitter + interval] ──→ tick ──→ reap_stale(now, stale_after)
//!                                      ↑                │
//!                                      └── interval ────┘
//!   shutdown() ends the loop after the current tick.
//! ```
//!
//! Skipping or delaying a tick costs nothing but latency: the next tick
//! reaps whatever the missed one would have.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cardroom_session::SessionRegistry;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Reaping more than this many sessions in one tick is logged as a warning.
const LARGE_REAP_BATCH: usize = 1_000;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when ticks are missed (the runtime was busy or the previous
/// tick ran long).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissedTickPolicy {
    /// Drop missed ticks and stay on the original schedule.
    #[default]
    Skip,
    /// Fire missed ticks back to back until caught up.
    Burst,
    /// Restart the schedule from the late tick.
    Delay,
}

impl From<MissedTickPolicy> for MissedTickBehavior {
    fn from(policy: MissedTickPolicy) -> Self {
        match policy {
            MissedTickPolicy::Skip => MissedTickBehavior::Skip,
            MissedTickPolicy::Burst => MissedTickBehavior::Burst,
            MissedTickPolicy::Delay => MissedTickBehavior::Delay,
        }
    }
}

/// Evictor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvictorConfig {
    /// Seconds between ticks. Default: 60.
    pub interval_secs: u64,
    /// Idle time after which a session is reaped. `None` means
    /// [`STALE_INTERVALS`](Self::STALE_INTERVALS) times the interval.
    pub stale_after_secs: Option<u64>,
    /// Random delay (0 to max ms) added before the first tick, so several
    /// processes started together do not reap in lockstep.
    pub initial_jitter_ms: u64,
    pub policy: MissedTickPolicy,
}

impl Default for EvictorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            stale_after_secs: None,
            initial_jitter_ms: 0,
            policy: MissedTickPolicy::default(),
        }
    }
}

impl EvictorConfig {
    /// Default stale threshold, in intervals.
    pub const STALE_INTERVALS: u64 = 60;

    /// A config ticking every `interval_secs`, everything else default.
    pub fn with_interval(interval_secs: u64) -> Self {
        Self {
            interval_secs,
            ..Default::default()
        }
    }

    /// Fixes out-of-range values. Called by [`Evictor::new`].
    ///
    /// - `interval_secs` is raised to at least 1.
    pub fn validated(mut self) -> Self {
        if self.interval_secs == 0 {
            warn!("evictor interval_secs is 0, using 1");
            self.interval_secs = 1;
        }
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        let secs = self
            .stale_after_secs
            .unwrap_or_else(|| self.interval_secs.saturating_mul(Self::STALE_INTERVALS));
        Duration::from_secs(secs)
    }

    fn initial_jitter(&self) -> Duration {
        if self.initial_jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=self.initial_jitter_ms))
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters since the evictor was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictorMetrics {
    /// Ticks run, including on-demand [`Evictor::tick_once`] calls.
    pub total_ticks: u64,
    /// Sessions removed across all ticks.
    pub total_reaped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    reaped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> EvictorMetrics {
        EvictorMetrics {
            total_ticks: self.ticks.load(Ordering::Relaxed),
            total_reaped: self.reaped.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Evictor
// ---------------------------------------------------------------------------

/// Periodically reaps idle sessions from a registry.
///
/// Cheap to clone; clones share counters.
#[derive(Clone)]
pub struct Evictor {
    registry: Arc<SessionRegistry>,
    config: EvictorConfig,
    counters: Arc<Counters>,
}

impl Evictor {
    pub fn new(registry: Arc<SessionRegistry>, config: EvictorConfig) -> Self {
        Self {
            registry,
            config: config.validated(),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &EvictorConfig {
        &self.config
    }

    /// Runs one reaping pass now, at the registry clock's current time.
    ///
    /// Returns how many sessions were removed.
    pub async fn tick_once(&self) -> usize {
        let now = self.registry.clock().now();
        let stale_after = self.config.stale_after();
        let reaped = self.registry.reap_stale(now, stale_after).await;

        let tick = self.counters.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        self.counters
            .reaped
            .fetch_add(reaped as u64, Ordering::Relaxed);

        if reaped > LARGE_REAP_BATCH {
            warn!(tick, reaped, "evictor reaped a large batch");
        } else {
            debug!(tick, reaped, "evictor tick");
        }
        reaped
    }

    pub fn metrics(&self) -> EvictorMetrics {
        self.counters.snapshot()
    }

    /// Starts the periodic loop on the current Tokio runtime.
    ///
    /// The loop runs until [`EvictorHandle::shutdown`] is called or the
    /// handle is dropped.
    pub fn spawn(&self) -> EvictorHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let evictor = self.clone();
        let task = tokio::spawn(async move { evictor.run(shutdown_rx).await });
        EvictorHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
            counters: Arc::clone(&self.counters),
        }
    }

    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let period = self.config.interval();
        let first = Instant::now() + self.config.initial_jitter() + period;
        let mut ticker = time::interval_at(first, period);
        ticker.set_missed_tick_behavior(self.config.policy.into());

        info!(
            interval_secs = self.config.interval_secs,
            stale_after_secs = self.config.stale_after().as_secs(),
            policy = ?self.config.policy,
            "evictor started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.tick_once().await;
                }
            }
        }

        info!(
            total_ticks = self.counters.ticks.load(Ordering::Relaxed),
            total_reaped = self.counters.reaped.load(Ordering::Relaxed),
            "evictor stopped"
        );
    }
}

impl std::fmt::Debug for Evictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evictor")
            .field("config", &self.config)
            .field("metrics", &self.metrics())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Controls a running evictor loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct EvictorHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl EvictorHandle {
    pub fn metrics(&self) -> EvictorMetrics {
        self.counters.snapshot()
    }

    /// Whether the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stops the loop and waits for it to exit. Idempotent.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            // The loop may already be gone; nothing to signal then.
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "evictor task ended abnormally");
            }
        }
    }
}
