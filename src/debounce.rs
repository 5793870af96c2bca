use std::time::{Duration, Instant};

/// Label that triggers the alert when it stays on top long enough
pub const DEFAULT_ALERT_LABEL: &str = "BAD_POSITION";

/// Dwell time in the alert label before the alert is raised
pub const DEFAULT_THRESHOLD: Duration = Duration::from_millis(10_000);

/// Two-state dwell timer for the alert label
///
/// The engine never reads the clock itself. Every decision is made from the
/// `now` values handed to [`DebounceEngine::update`], so replaying the same
/// observations always produces the same alert trace.
#[derive(Debug, Clone)]
pub struct DebounceEngine {
    alert_label: String,
    threshold: Duration,
    since: Option<Instant>,
    alert_active: bool,
}

impl DebounceEngine {
    pub fn new(alert_label: impl Into<String>, threshold: Duration) -> Self {
        Self {
            alert_label: alert_label.into(),
            threshold,
            since: None,
            alert_active: false,
        }
    }

    /// Feed one observation and return whether the alert is active
    ///
    /// Any label other than the alert label clears both the dwell timer and
    /// the alert immediately; a single interrupting cycle is enough.
    pub fn update(&mut self, current_label: &str, now: Instant) -> bool {
        if current_label != self.alert_label {
            self.since = None;
            self.alert_active = false;
            return false;
        }

        match self.since {
            None => self.since = Some(now),
            Some(since) => {
                // saturating: a caller stepping backwards in time sees zero dwell
                if now.saturating_duration_since(since) >= self.threshold {
                    self.alert_active = true;
                }
            }
        }

        self.alert_active
    }

    #[cfg(test)]
    pub fn alert_active(&self) -> bool {
        self.alert_active
    }

    /// Start of the current run of the alert label, if one is in progress
    #[cfg(test)]
    pub fn since(&self) -> Option<Instant> {
        self.since
    }

    pub fn alert_label(&self) -> &str {
        &self.alert_label
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }
}

impl Default for DebounceEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_LABEL, DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const A: &str = "BAD_POSITION";
    const B: &str = "GOOD_POSITION";

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    fn trace(engine: &mut DebounceEngine, t0: Instant, inputs: &[(&str, u64)]) -> Vec<bool> {
        inputs
            .iter()
            .map(|(label, ms)| engine.update(label, at(t0, *ms)))
            .collect()
    }

    #[test]
    fn scenario_resets_on_other_label_and_restarts_dwell() {
        let t0 = Instant::now();
        let mut engine = DebounceEngine::default();

        let flags = trace(
            &mut engine,
            t0,
            &[(A, 0), (A, 3000), (A, 11000), (B, 11100), (A, 11200)],
        );

        assert_eq!(flags, vec![false, false, true, false, false]);
        assert_eq!(engine.since(), Some(at(t0, 11200)));
    }

    #[test]
    fn trips_on_first_cycle_reaching_threshold() {
        let t0 = Instant::now();
        let mut engine = DebounceEngine::default();

        let flags = trace(&mut engine, t0, &[(A, 0), (A, 9999), (A, 10000), (A, 10100)]);

        assert_eq!(flags, vec![false, false, true, true]);
    }

    #[test]
    fn other_label_clears_everything() {
        let t0 = Instant::now();
        let mut engine = DebounceEngine::default();
        trace(&mut engine, t0, &[(A, 0), (A, 20000)]);
        assert!(engine.alert_active());

        assert!(!engine.update(B, at(t0, 20100)));
        assert!(!engine.alert_active());
        assert_eq!(engine.since(), None);
    }

    #[test]
    fn staying_tripped_does_not_move_since() {
        let t0 = Instant::now();
        let mut engine = DebounceEngine::default();
        trace(&mut engine, t0, &[(A, 0), (A, 10000)]);

        for ms in [10100, 15000, 60000] {
            assert!(engine.update(A, at(t0, ms)));
            assert_eq!(engine.since(), Some(t0));
        }
    }

    #[test]
    fn short_run_never_trips() {
        let t0 = Instant::now();
        let mut engine = DebounceEngine::default();

        let flags = trace(
            &mut engine,
            t0,
            &[(A, 0), (A, 4000), (A, 9999), (B, 10500), (A, 10600)],
        );

        assert!(flags.iter().all(|f| !f));
    }

    #[test]
    fn trace_does_not_depend_on_real_delay() {
        let t0 = Instant::now();
        let inputs = [(A, 0), (A, 5000), (B, 6000), (A, 7000), (A, 17000)];

        let mut fast = DebounceEngine::default();
        let fast_flags = trace(&mut fast, t0, &inputs);

        let mut slow = DebounceEngine::default();
        let slow_flags: Vec<bool> = inputs
            .iter()
            .map(|(label, ms)| {
                std::thread::sleep(Duration::from_millis(2));
                slow.update(label, at(t0, *ms))
            })
            .collect();

        assert_eq!(fast_flags, slow_flags);
        assert_eq!(fast_flags, vec![false, false, false, false, true]);
    }

    #[test]
    fn backwards_time_counts_as_no_dwell() {
        let t0 = Instant::now();
        let mut engine = DebounceEngine::new(A, Duration::from_millis(100));

        assert!(!engine.update(A, at(t0, 500)));
        assert!(!engine.update(A, at(t0, 0)));
        assert!(engine.update(A, at(t0, 600)));
    }

    #[test]
    fn custom_alert_label() {
        let t0 = Instant::now();
        let mut engine = DebounceEngine::new("SLOUCH", Duration::from_millis(50));

        assert!(!engine.update(A, at(t0, 0)));
        assert!(!engine.update("SLOUCH", at(t0, 0)));
        assert!(engine.update("SLOUCH", at(t0, 50)));
    }
}
