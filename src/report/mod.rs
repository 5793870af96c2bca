mod serial;

pub use serial::{list_ports, SerialSink};

use thiserror::Error;

/// Why a report could not be delivered
#[derive(Debug, Error)]
pub enum SinkError {
    /// No connection yet; the report is dropped
    #[error("report sink is not connected")]
    NotConnected,

    #[error("failed to write report: {0}")]
    Write(#[from] std::io::Error),
}

/// Trait for byte-stream destinations of the current label
///
/// Writes carry no framing. The receiver treats every arrival as the new
/// current state.
pub trait ReportSink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError>;
}

/// No sink configured: every report is dropped as not connected
impl<S: ReportSink> ReportSink for Option<S> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        match self {
            Some(sink) => sink.write(bytes),
            None => Err(SinkError::NotConnected),
        }
    }
}

impl<S: ReportSink + ?Sized> ReportSink for Box<S> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        (**self).write(bytes)
    }
}
