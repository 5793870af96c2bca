use crate::classifier::Prediction;
use image::RgbImage;
use std::sync::{Arc, RwLock};

/// What the presentation layer gets to see after each poll cycle
#[derive(Debug, Clone, Default)]
pub struct Status {
    pub prediction: Option<Prediction>,
    pub alert_active: bool,
    pub frame: Option<Arc<RgbImage>>,
    pub cycle: u64,
}

/// Latest status, written by the polling loop and read by anyone else
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<Status>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, status: Status) {
        match self.inner.write() {
            Ok(mut guard) => *guard = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }
    }

    pub fn snapshot(&self) -> Status {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
