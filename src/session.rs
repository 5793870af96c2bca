use crate::cancel::CancellationToken;
use crate::capture::CaptureSource;
use crate::classifier::{top_prediction, Classifier, Prediction};
use crate::debounce::DebounceEngine;
use crate::report::{ReportSink, SinkError};
use crate::status::{Status, StatusBoard};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Failures that cost one poll cycle and nothing more
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("frame capture failed: {0:#}")]
    Capture(anyhow::Error),

    #[error("classifier unavailable: {0:#}")]
    ClassifierUnavailable(anyhow::Error),

    #[error("classifier returned no predictions")]
    EmptyPredictionList,
}

/// Source of observation timestamps
pub trait Clock {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Wait after each cycle completes, so cadence is delay + cycle latency
    pub poll_delay: Duration,
    /// Publish captured frames on the status board for the preview
    pub publish_frames: bool,
}

/// Per-session state, owned by the polling loop
#[derive(Debug)]
pub struct Session {
    debounce: DebounceEngine,
    prediction: Option<Prediction>,
    alert_active: bool,
    completed: u64,
}

impl Session {
    pub fn new(debounce: DebounceEngine) -> Self {
        Self {
            debounce,
            prediction: None,
            alert_active: false,
            completed: 0,
        }
    }

    #[cfg(test)]
    pub fn prediction(&self) -> Option<&Prediction> {
        self.prediction.as_ref()
    }

    #[cfg(test)]
    pub fn alert_active(&self) -> bool {
        self.alert_active
    }

    #[cfg(test)]
    pub fn debounce(&self) -> &DebounceEngine {
        &self.debounce
    }

    /// Apply one observation and return the new alert flag
    fn observe(&mut self, prediction: Prediction, now: Instant) -> bool {
        if let Some(line) = status_change(self.prediction.as_ref(), &prediction) {
            tracing::info!("{}", line);
        }

        let was_active = self.alert_active;
        self.alert_active = self.debounce.update(&prediction.label, now);

        if self.alert_active && !was_active {
            tracing::warn!(
                "Alert raised: {} held for {:?}",
                prediction.label,
                self.debounce.threshold()
            );
        } else if was_active && !self.alert_active {
            tracing::info!("Alert cleared: {}", prediction);
        }

        self.prediction = Some(prediction);
        self.completed += 1;
        self.alert_active
    }
}

/// Status line to show when the top label differs from the previous cycle's
fn status_change(previous: Option<&Prediction>, next: &Prediction) -> Option<String> {
    match previous {
        Some(previous) if previous.label == next.label => None,
        _ => Some(next.to_string()),
    }
}

/// How a loop run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub cycles: u64,
    pub skipped: u64,
}

#[derive(Default)]
struct Stats {
    cycles: u64,
    capture: Duration,
    classify: Duration,
    report: Duration,
}

impl Stats {
    fn log_every(&self, every: u64) {
        if self.cycles == 0 || self.cycles % every != 0 {
            return;
        }
        let n = self.cycles as f64;
        let avg_capture_ms = self.capture.as_secs_f64() * 1000.0 / n;
        let avg_classify_ms = self.classify.as_secs_f64() * 1000.0 / n;
        let avg_report_ms = self.report.as_secs_f64() * 1000.0 / n;
        tracing::info!(
            "Cycle {}: capture={:.1}ms, classify={:.1}ms, report={:.1}ms",
            self.cycles,
            avg_capture_ms,
            avg_classify_ms,
            avg_report_ms
        );
    }
}

/// Capture → classify → debounce → report, one cycle at a time
///
/// The loop owns the capture source and the sink, so both are released when
/// [`PollLoop::run`] returns.
pub struct PollLoop<C, K, S, T = SystemClock> {
    capture: C,
    classifier: K,
    sink: S,
    clock: T,
    session: Session,
    board: StatusBoard,
    config: LoopConfig,
    stats: Stats,
}

impl<C, K, S> PollLoop<C, K, S, SystemClock>
where
    C: CaptureSource,
    K: Classifier,
    S: ReportSink,
{
    pub fn new(
        capture: C,
        classifier: K,
        sink: S,
        debounce: DebounceEngine,
        board: StatusBoard,
        config: LoopConfig,
    ) -> Self {
        Self::with_clock(capture, classifier, sink, debounce, board, config, SystemClock)
    }
}

impl<C, K, S, T> PollLoop<C, K, S, T>
where
    C: CaptureSource,
    K: Classifier,
    S: ReportSink,
    T: Clock,
{
    pub fn with_clock(
        capture: C,
        classifier: K,
        sink: S,
        debounce: DebounceEngine,
        board: StatusBoard,
        config: LoopConfig,
        clock: T,
    ) -> Self {
        Self {
            capture,
            classifier,
            sink,
            clock,
            session: Session::new(debounce),
            board,
            config,
            stats: Stats::default(),
        }
    }

    #[cfg(test)]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run cycles until `token` is cancelled
    pub fn run(mut self, token: &CancellationToken) -> LoopSummary {
        let mut summary = LoopSummary {
            cycles: 0,
            skipped: 0,
        };

        tracing::info!(
            "Starting polling loop: alert on {} after {:?}, delay {:?}",
            self.session.debounce.alert_label(),
            self.session.debounce.threshold(),
            self.config.poll_delay
        );

        while !token.is_cancelled() {
            summary.cycles += 1;
            if let Err(e) = self.run_cycle() {
                summary.skipped += 1;
                tracing::warn!("Skipping cycle {}: {}", summary.cycles, e);
            }

            if token.wait_timeout(self.config.poll_delay) {
                break;
            }
        }

        tracing::info!(
            "Polling loop stopped after {} cycles ({} skipped)",
            summary.cycles,
            summary.skipped
        );
        summary
    }

    /// One poll cycle
    ///
    /// A failed capture or classification returns before the debounce engine
    /// or the sink are touched, so a missed frame never resets the dwell timer.
    fn run_cycle(&mut self) -> Result<(), CycleError> {
        let capture_start = Instant::now();
        let frame = self
            .capture
            .capture_frame()
            .map_err(CycleError::Capture)?;
        let capture_time = capture_start.elapsed();

        let classify_start = Instant::now();
        let predictions = self
            .classifier
            .classify(&frame)
            .map_err(CycleError::ClassifierUnavailable)?;
        let classify_time = classify_start.elapsed();

        let prediction = top_prediction(predictions).ok_or(CycleError::EmptyPredictionList)?;
        let now = self.clock.now();

        tracing::debug!(
            "Predicted class: {}, probability: {}",
            prediction.label,
            prediction.confidence
        );

        let label = prediction.label.clone();
        let alert_active = self.session.observe(prediction, now);

        self.board.publish(Status {
            prediction: self.session.prediction.clone(),
            alert_active,
            frame: self.config.publish_frames.then(|| Arc::new(frame)),
            cycle: self.session.completed,
        });

        let report_start = Instant::now();
        match self.sink.write(label.as_bytes()) {
            Ok(()) => {}
            Err(SinkError::NotConnected) => tracing::trace!("No sink connected, dropping report"),
            Err(e) => tracing::warn!("{}", e),
        }
        let report_time = report_start.elapsed();

        // skipped cycles never reach here, so averages cover whole cycles only
        self.stats.capture += capture_time;
        self.stats.classify += classify_time;
        self.stats.report += report_time;
        self.stats.cycles += 1;
        self.stats.log_every(30);

        Ok(())
    }
}
