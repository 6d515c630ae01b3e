use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::detection::DetectionSource;
use crate::settings::PipelineConfig;

use super::motion::{MotionLevel, MotionState};
use super::pipeline::{ConfirmedDetection, FrameOutcome, FramePipeline};

// Set to true to enable per-tick logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Counters shared between the loop and whoever started it.
#[derive(Debug, Default)]
pub struct LoopStats {
    ticks: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
    confirmed: AtomicU64,
}

impl LoopStats {
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Ticks that fired while a frame cycle was still outstanding.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn confirmed(&self) -> u64 {
        self.confirmed.load(Ordering::Relaxed)
    }
}

fn ticker_for(config: &PipelineConfig, level: MotionLevel) -> time::Interval {
    let period = config.interval(level == MotionLevel::High);
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Runs frame cycles on a fixed interval with at most one cycle in flight.
/// Ticks that land on a busy pipeline are dropped, never queued.
pub async fn detection_loop<S: DetectionSource>(
    pipeline: Arc<Mutex<FramePipeline<S>>>,
    config: PipelineConfig,
    mut motion: watch::Receiver<MotionState>,
    events: mpsc::Sender<ConfirmedDetection>,
    stats: Arc<LoopStats>,
    cancel_token: CancellationToken,
) {
    let mut level = motion.borrow_and_update().level;
    let mut ticker = ticker_for(&config, level);
    let busy = Arc::new(AtomicBool::new(false));
    let mut motion_open = true;
    let mut in_flight: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("detection loop shutting down");
                break;
            }
            changed = motion.changed(), if motion_open => {
                if changed.is_err() {
                    // monitor dropped; keep the current cadence
                    motion_open = false;
                    continue;
                }
                let new_level = motion.borrow_and_update().level;
                if new_level != level {
                    level = new_level;
                    ticker = ticker_for(&config, level);
                    log_debug!("motion level {:?}, interval now {:?}", level, config.interval(level == MotionLevel::High));
                }
            }
            _ = ticker.tick() => {
                stats.ticks.fetch_add(1, Ordering::Relaxed);
                if busy.swap(true, Ordering::AcqRel) {
                    stats.dropped.fetch_add(1, Ordering::Relaxed);
                    log_debug!("tick dropped: previous frame still processing");
                    continue;
                }
                in_flight = Some(tokio::spawn(run_cycle(
                    pipeline.clone(),
                    busy.clone(),
                    events.clone(),
                    stats.clone(),
                    cancel_token.clone(),
                )));
            }
        }
    }

    if let Some(handle) = in_flight.take() {
        handle.abort();
    }
}

async fn run_cycle<S: DetectionSource>(
    pipeline: Arc<Mutex<FramePipeline<S>>>,
    busy: Arc<AtomicBool>,
    events: mpsc::Sender<ConfirmedDetection>,
    stats: Arc<LoopStats>,
    cancel_token: CancellationToken,
) {
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || -> Result<(FrameOutcome, u64)> {
        let mut guard = pipeline
            .lock()
            .map_err(|_| anyhow!("frame pipeline mutex poisoned"))?;
        let outcome = guard.process_next()?;
        Ok((outcome, guard.frames_processed()))
    })
    .await;
    busy.store(false, Ordering::Release);

    if cancel_token.is_cancelled() {
        log_info!("discarding frame result that finished after shutdown");
        return;
    }
    stats.completed.fetch_add(1, Ordering::Relaxed);

    match result {
        Ok(Ok((FrameOutcome::Confirmed(detection), _))) => {
            stats.confirmed.fetch_add(1, Ordering::Relaxed);
            log_info!(
                "detection confirmed: {:.1} cm wide, confidence {:.2} ({}ms)",
                detection.width_cm,
                detection.candidate.confidence(),
                started.elapsed().as_millis()
            );
            if events.send(detection).await.is_err() {
                log_debug!("no listener for confirmed detection");
            }
        }
        Ok(Ok((FrameOutcome::Unconfirmed { accepted }, frame))) => {
            log_debug!(
                "frame {} processed: {} candidates accepted ({}ms)",
                frame,
                accepted,
                started.elapsed().as_millis()
            );
        }
        Ok(Err(err)) => log_error!("frame cycle failed: {err:?}"),
        Err(join_err) => log_error!("frame worker join failed: {join_err}"),
    }
}

/// Default bound on undelivered confirmations.
pub const EVENT_BUFFER: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::filter::ideal_shape;
    use crate::detection::{CandidateFilter, FrameShapes};
    use crate::geometry::CameraFrameContext;
    use crate::stabilizer::TemporalStabilizer;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::Duration;

    /// Always reports the same shape; sleeps to simulate extraction cost and
    /// records the highest number of overlapping calls.
    struct SlowSource {
        delay: std::time::Duration,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
    }

    impl DetectionSource for SlowSource {
        fn next_frame(&mut self) -> Result<FrameShapes> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(FrameShapes {
                frame_width_px: 1000,
                frame_height_px: 1000,
                timestamp_ms: 0,
                shapes: vec![ideal_shape(400.0, 400.0)],
            })
        }
    }

    fn pipeline_with(source: SlowSource) -> Arc<Mutex<FramePipeline<SlowSource>>> {
        let camera = CameraFrameContext::new(1000, 1000, 67.0).unwrap();
        let (_tx, rx) = watch::channel(camera);
        Arc::new(Mutex::new(FramePipeline::new(
            source,
            CandidateFilter::default(),
            TemporalStabilizer::default(),
            rx,
        )))
    }

    fn slow_source(delay_ms: u64) -> (SlowSource, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let max_active = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let source = SlowSource {
            delay: std::time::Duration::from_millis(delay_ms),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: max_active.clone(),
            calls: calls.clone(),
        };
        (source, max_active, calls)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn slow_frames_drop_ticks_instead_of_queueing() {
        let (source, max_active, calls) = slow_source(120);
        let config = PipelineConfig {
            processing_interval_ms: 20,
            high_motion_multiplier: 1.5,
        };
        let (motion_tx, motion_rx) = watch::channel(MotionState::default());
        let (events_tx, _events_rx) = mpsc::channel(EVENT_BUFFER);
        let stats = Arc::new(LoopStats::default());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(detection_loop(
            pipeline_with(source),
            config,
            motion_rx,
            events_tx,
            stats.clone(),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(400)).await;
        cancel.cancel();
        handle.await.unwrap();
        drop(motion_tx);

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert!(stats.dropped() > 0, "expected dropped ticks");
        assert!(calls.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn confirmed_detection_is_delivered() {
        let (source, _max, _calls) = slow_source(0);
        let config = PipelineConfig {
            processing_interval_ms: 10,
            high_motion_multiplier: 1.5,
        };
        let (_motion_tx, motion_rx) = watch::channel(MotionState::default());
        let (events_tx, mut events_rx) = mpsc::channel(EVENT_BUFFER);
        let stats = Arc::new(LoopStats::default());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(detection_loop(
            pipeline_with(source),
            config,
            motion_rx,
            events_tx,
            stats.clone(),
            cancel.clone(),
        ));

        let detection = tokio::time::timeout(Duration::from_secs(2), events_rx.recv())
            .await
            .expect("confirmation within timeout")
            .expect("channel open");
        assert!(detection.width_cm > 0.0);

        cancel.cancel();
        handle.await.unwrap();
        assert!(stats.confirmed() >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn result_finishing_after_cancel_is_discarded() {
        let (source, _max, calls) = slow_source(150);
        let config = PipelineConfig {
            processing_interval_ms: 10,
            high_motion_multiplier: 1.5,
        };
        let (_motion_tx, motion_rx) = watch::channel(MotionState::default());
        let (events_tx, mut events_rx) = mpsc::channel(EVENT_BUFFER);
        let stats = Arc::new(LoopStats::default());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(detection_loop(
            pipeline_with(source),
            config,
            motion_rx,
            events_tx,
            stats.clone(),
            cancel.clone(),
        ));

        // first cycle is mid-flight
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.completed(), 0);
        assert!(events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn high_motion_stretches_tick_period() {
        let config = PipelineConfig::default();
        assert_eq!(ticker_for(&config, MotionLevel::Normal).period(), Duration::from_millis(1000));
        assert_eq!(ticker_for(&config, MotionLevel::High).period(), Duration::from_millis(1500));
    }
}
