//! Background loop that checks every tracked source for a new latest item.
//!
//! One cycle visits sources sequentially in id order. Per source: fetch the
//! latest item, compare with the stored `last_video_id`, deliver when it
//! changed, then record it. A source's failure never stops the cycle, and a
//! `Failed` delivery leaves the stored id alone so the item is retried.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use rand::Rng;
use tokio::{sync::Notify, task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::{Config, PrimingMode},
    delivery::DeliveryPipeline,
    domain::{DeliveryOutcome, SourceId},
    errors::ErrorKind,
    ports::FeedFetcher,
    store::SourceStore,
    utils::{iso_timestamp_utc, with_timeout},
};

/// What one cycle did, per source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub finished_at: String,
    pub sources: usize,
    /// Recorded without notifying.
    pub primed: usize,
    pub unchanged: usize,
    pub delivered: usize,
    pub link_fallbacks: usize,
    pub failed: usize,
    /// Fetch failed or timed out; nothing changed.
    pub skipped: usize,
}

impl CycleReport {
    pub fn notified(&self) -> usize {
        self.delivered + self.link_fallbacks
    }
}

#[derive(Clone)]
pub struct SourcePoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    cfg: Arc<Config>,
    store: Arc<SourceStore>,
    fetcher: Arc<dyn FeedFetcher>,
    pipeline: Arc<DeliveryPipeline>,
    wake: Notify,
    // Set once the first cycle of this process has finished.
    process_primed: AtomicBool,
    cycle_lock: tokio::sync::Mutex<()>,
    state: tokio::sync::Mutex<PollerState>,
}

#[derive(Default)]
struct PollerState {
    task: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
    last_report: Option<CycleReport>,
}

impl SourcePoller {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<SourceStore>,
        fetcher: Arc<dyn FeedFetcher>,
        pipeline: Arc<DeliveryPipeline>,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                cfg,
                store,
                fetcher,
                pipeline,
                wake: Notify::new(),
                process_primed: AtomicBool::new(false),
                cycle_lock: tokio::sync::Mutex::new(()),
                state: tokio::sync::Mutex::new(PollerState::default()),
            }),
        }
    }

    /// Spawn the polling loop. Returns `false` if it is already running.
    pub async fn start(&self) -> bool {
        let mut st = self.inner.state.lock().await;
        if st.task.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }

        let cancel = CancellationToken::new();
        let poller = self.clone();
        let token = cancel.clone();
        st.task = Some(tokio::spawn(async move {
            poller.run_loop(token).await;
        }));
        st.cancel = Some(cancel);

        info!(
            interval_secs = self.inner.cfg.poll_interval.as_secs(),
            priming = ?self.inner.cfg.priming_mode,
            "poller started"
        );
        true
    }

    /// Cancel the loop and wait for it to exit. An in-flight delivery is
    /// abandoned and retried after the next start.
    pub async fn stop(&self) {
        let (cancel, task) = {
            let mut st = self.inner.state.lock().await;
            (st.cancel.take(), st.task.take())
        };
        if let Some(tok) = cancel {
            tok.cancel();
        }
        if let Some(task) = task {
            let _ = task.await;
            info!("poller stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        let st = self.inner.state.lock().await;
        st.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cut the current sleep short and start a cycle now.
    pub fn trigger(&self) {
        self.inner.wake.notify_one();
    }

    pub async fn last_report(&self) -> Option<CycleReport> {
        self.inner.state.lock().await.last_report.clone()
    }

    async fn run_loop(&self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.run_cycle() => {}
            }

            let pause = self.next_pause();
            debug!(pause_secs = pause.as_secs(), "sleeping until next cycle");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(pause) => {}
                _ = self.inner.wake.notified() => info!("poll triggered"),
            }
        }
    }

    fn next_pause(&self) -> Duration {
        let base = self.inner.cfg.poll_interval;
        let jitter_ms = self.inner.cfg.poll_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }

    /// One pass over every tracked source.
    pub async fn run_cycle(&self) -> CycleReport {
        let _cycle = self.inner.cycle_lock.lock().await;
        let started = Instant::now();
        let mode = self.inner.cfg.priming_mode;
        let prime_all =
            mode == PrimingMode::PerProcess && !self.inner.process_primed.load(Ordering::SeqCst);

        let sources = self.inner.store.load();
        let mut report = CycleReport {
            sources: sources.len(),
            ..CycleReport::default()
        };

        for (id, source) in &sources {
            let fetched = with_timeout(
                "feed fetch",
                self.inner.cfg.fetch_timeout,
                self.inner.fetcher.fetch_latest(id),
            )
            .await;
            let latest = match fetched {
                Ok(item) => item,
                Err(e) => {
                    report.skipped += 1;
                    let kind = e.kind();
                    if kind == ErrorKind::NotFound {
                        info!(source = %id, %kind, error = %e, "no latest item, skipping");
                    } else if kind.is_transient() {
                        warn!(source = %id, %kind, error = %e, "fetch failed, retrying next cycle");
                    } else {
                        error!(source = %id, %kind, error = %e, "fetch failed");
                    }
                    continue;
                }
            };

            if source.has_seen(&latest.item_id) {
                report.unchanged += 1;
                continue;
            }

            let prime = prime_all
                || (mode == PrimingMode::PerSource && source.last_seen_item_id.is_none());
            if prime {
                debug!(source = %id, item = %latest.item_id, "priming");
                self.record(id, &latest.item_id);
                report.primed += 1;
                continue;
            }

            info!(
                source = %id,
                name = %source.display_name,
                item = %latest.item_id,
                title = %latest.title,
                "new item"
            );
            let outcome = self.inner.pipeline.deliver(&latest, &source.display_name).await;
            match &outcome {
                DeliveryOutcome::MediaSent => report.delivered += 1,
                DeliveryOutcome::LinkSent => report.link_fallbacks += 1,
                DeliveryOutcome::Failed(reason) => {
                    report.failed += 1;
                    warn!(source = %id, item = %latest.item_id, %reason, "delivery failed, will retry next cycle");
                }
            }
            if outcome.advances_state() {
                self.record(id, &latest.item_id);
            }
        }

        if mode == PrimingMode::PerProcess {
            self.inner.process_primed.store(true, Ordering::SeqCst);
        }

        report.finished_at = iso_timestamp_utc();
        info!(
            sources = report.sources,
            primed = report.primed,
            unchanged = report.unchanged,
            delivered = report.delivered,
            link_fallbacks = report.link_fallbacks,
            failed = report.failed,
            skipped = report.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cycle finished"
        );
        self.inner.state.lock().await.last_report = Some(report.clone());
        report
    }

    fn record(&self, id: &SourceId, item_id: &str) {
        match self.inner.store.record_seen(id, item_id) {
            Ok(true) => {}
            Ok(false) => debug!(source = %id, "source removed during cycle"),
            Err(e) => warn!(source = %id, kind = %e.kind(), error = %e, "failed to persist last seen item"),
        }
    }
}
