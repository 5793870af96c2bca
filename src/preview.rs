use crate::cancel::CancellationToken;
use crate::output::{Compositor, OutputSink};
use crate::status::{Status, StatusBoard};
use anyhow::{Context, Result};
use std::io::Write;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const BELL: &[u8] = b"\x07";
const BELL_INTERVAL: Duration = Duration::from_secs(1);

/// Reads the status board at its own cadence and turns it into something a
/// person notices: the masked preview feed and the terminal bell
pub struct Presenter<O, W> {
    preview: Option<(Compositor, O)>,
    bell: Option<W>,
    last_bell: Option<Instant>,
}

impl<O, W> Presenter<O, W>
where
    O: OutputSink,
    W: Write,
{
    pub fn new(preview: Option<(Compositor, O)>, bell: Option<W>) -> Self {
        Self {
            preview,
            bell,
            last_bell: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.preview.is_none() && self.bell.is_none()
    }

    /// Present one snapshot
    pub fn present(&mut self, status: &Status, now: Instant) -> Result<()> {
        if let Some(bell) = self.bell.as_mut() {
            if !status.alert_active {
                self.last_bell = None;
            } else if self
                .last_bell
                .map_or(true, |last| now.saturating_duration_since(last) >= BELL_INTERVAL)
            {
                bell.write_all(BELL).and_then(|_| bell.flush())?;
                self.last_bell = Some(now);
            }
        }

        if let Some((compositor, output)) = self.preview.as_mut() {
            let canvas = compositor.render(status);
            output.write_frame(&canvas).context("Failed to write preview frame")?;
        }

        Ok(())
    }
}

impl<O, W> Presenter<O, W>
where
    O: OutputSink + Send + 'static,
    W: Write + Send + 'static,
{
    /// Run on a background thread until `token` is cancelled
    pub fn spawn(mut self, board: StatusBoard, fps: u32, token: CancellationToken) -> JoinHandle<()> {
        let frame_interval = Duration::from_secs_f32(1.0 / fps.max(1) as f32);

        thread::spawn(move || {
            tracing::info!("Presentation running at {} fps", fps);
            let mut failures = 0u64;

            while !token.wait_timeout(frame_interval) {
                let status = board.snapshot();
                match self.present(&status, Instant::now()) {
                    Ok(()) => failures = 0,
                    Err(e) => {
                        failures += 1;
                        // one line per burst of failures
                        if failures == 1 {
                            tracing::warn!("Presentation failed at cycle {}: {:#}", status.cycle, e);
                        }
                    }
                }
            }

            tracing::info!("Presentation stopped");
        })
    }
}
