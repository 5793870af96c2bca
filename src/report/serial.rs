use super::{ReportSink, SinkError};
use anyhow::{Context, Result};
use serialport::SerialPortType;
use std::io::Write;
use std::time::{Duration, Instant};

const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Opens the byte stream behind the sink, given a path and baud rate
type Opener = Box<dyn FnMut(&str, u32) -> serialport::Result<Box<dyn Write + Send>> + Send>;

fn open_serial(path: &str, baud_rate: u32) -> serialport::Result<Box<dyn Write + Send>> {
    let port = serialport::new(path, baud_rate).timeout(WRITE_TIMEOUT).open()?;
    Ok(Box::new(port))
}

/// Serial link to the Arduino
///
/// The port is opened lazily and reopened after failures, at most once per
/// `retry_interval`. Until it is open every write reports `NotConnected`.
pub struct SerialSink {
    path: String,
    baud_rate: u32,
    retry_interval: Duration,
    opener: Opener,
    port: Option<Box<dyn Write + Send>>,
    last_attempt: Option<Instant>,
}

impl SerialSink {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self::with_opener(path, baud_rate, Box::new(open_serial))
    }

    fn with_opener(path: impl Into<String>, baud_rate: u32, opener: Opener) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            retry_interval: Duration::from_secs(2),
            opener,
            port: None,
            last_attempt: None,
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    #[cfg(test)]
    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    /// Try to open the port unless the last attempt was too recent
    fn try_connect(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_attempt {
            if now.duration_since(last) < self.retry_interval {
                return;
            }
        }
        self.last_attempt = Some(now);

        match (self.opener)(&self.path, self.baud_rate) {
            Ok(port) => {
                tracing::info!(
                    "Connected to serial port {} at {} baud",
                    self.path,
                    self.baud_rate
                );
                self.port = Some(port);
            }
            Err(e) => {
                tracing::debug!("Serial port {} unavailable: {}", self.path, e);
            }
        }
    }
}

impl ReportSink for SerialSink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        if self.port.is_none() {
            self.try_connect();
        }
        let port = self.port.as_mut().ok_or(SinkError::NotConnected)?;

        let result = port.write_all(bytes).and_then(|_| port.flush());
        if let Err(e) = result {
            tracing::info!("Serial port {} disconnected", self.path);
            self.port = None;
            return Err(SinkError::Write(e));
        }

        Ok(())
    }
}

/// Print the serial ports the system can see
pub fn list_ports() -> Result<()> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        match port.port_type {
            SerialPortType::UsbPort(usb) => println!(
                "{} (USB {:04x}:{:04x} {})",
                port.port_name,
                usb.vid,
                usb.pid,
                usb.product.unwrap_or_default()
            ),
            _ => println!("{}", port.port_name),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Port whose writes fail while `unplugged` is set
    #[derive(Clone, Default)]
    struct FakePort {
        unplugged: Arc<AtomicBool>,
        received: Arc<Mutex<Vec<u8>>>,
    }

    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.unplugged.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            self.received.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn fake_sink(port: &FakePort, opens: &Arc<AtomicUsize>) -> SerialSink {
        let port = port.clone();
        let opens = Arc::clone(opens);
        let opener: Opener = Box::new(move |_: &str, _: u32| -> serialport::Result<Box<dyn Write + Send>> {
            opens.fetch_add(1, Ordering::SeqCst);
            if port.unplugged.load(Ordering::SeqCst) {
                return Err(serialport::Error::new(serialport::ErrorKind::NoDevice, "unplugged"));
            }
            Ok(Box::new(port.clone()))
        });
        SerialSink::with_opener("/dev/ttyFAKE", 9600, opener).with_retry_interval(Duration::ZERO)
    }

    #[test]
    fn failed_write_drops_port_and_next_write_reconnects() {
        let port = FakePort::default();
        let opens = Arc::new(AtomicUsize::new(0));
        let mut sink = fake_sink(&port, &opens);

        sink.write(b"GOOD_POSITION").unwrap();
        assert!(sink.is_connected());
        assert_eq!(opens.load(Ordering::SeqCst), 1);

        port.unplugged.store(true, Ordering::SeqCst);
        assert!(matches!(sink.write(b"BAD_POSITION"), Err(SinkError::Write(_))));
        assert!(!sink.is_connected());

        // still unplugged: reopening fails
        assert!(matches!(sink.write(b"BAD_POSITION"), Err(SinkError::NotConnected)));
        assert_eq!(opens.load(Ordering::SeqCst), 2);

        port.unplugged.store(false, Ordering::SeqCst);
        sink.write(b"BAD_POSITION").unwrap();
        assert!(sink.is_connected());
        assert_eq!(opens.load(Ordering::SeqCst), 3);
        assert_eq!(
            port.received.lock().unwrap().as_slice(),
            b"GOOD_POSITIONBAD_POSITION"
        );
    }

    #[test]
    fn connected_port_is_not_reopened() {
        let port = FakePort::default();
        let opens = Arc::new(AtomicUsize::new(0));
        let mut sink = fake_sink(&port, &opens);

        for _ in 0..3 {
            sink.write(b"GOOD_POSITION").unwrap();
        }

        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    const MISSING: &str = "/dev/posture-alarm-no-such-port";

    #[test]
    fn missing_port_reports_not_connected() {
        let mut sink = SerialSink::new(MISSING, 9600);

        let result = sink.write(b"BAD_POSITION");

        assert!(matches!(result, Err(SinkError::NotConnected)));
        assert!(!sink.is_connected());
        assert!(sink.last_attempt.is_some());
    }

    #[test]
    fn reconnect_attempts_are_rate_limited() {
        let mut sink = SerialSink::new(MISSING, 9600).with_retry_interval(Duration::from_secs(60));

        let _ = sink.write(b"A");
        let first = sink.last_attempt;
        let _ = sink.write(b"B");

        assert_eq!(sink.last_attempt, first);
    }

    #[test]
    fn zero_interval_retries_every_write() {
        let mut sink = SerialSink::new(MISSING, 9600).with_retry_interval(Duration::ZERO);

        let _ = sink.write(b"A");
        let first = sink.last_attempt;
        std::thread::sleep(Duration::from_millis(2));
        let _ = sink.write(b"B");

        assert!(sink.last_attempt > first);
    }
}
