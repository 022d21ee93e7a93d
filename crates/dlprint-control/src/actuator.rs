//! Build-stage actuators.
//!
//! Calls block until the device acknowledges; the controller runs them on
//! blocking worker threads and bounds them with a timeout.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::ActuatorError;

/// Something that moves the build stage.
pub trait Actuator: Send + Sync + 'static {
    /// Move by `steps` (sign gives direction) and block until acknowledged.
    fn move_steps(&self, steps: i64) -> Result<(), ActuatorError>;

    /// Bring the stage to a safe stop. Moves after a halt are refused.
    fn halt(&self) -> Result<(), ActuatorError>;
}

/// Line protocol stepper board.
///
/// Each command is the step count as decimal text terminated by `\n`; the
/// board answers one line, `OK`, when the move is complete.
pub struct LineStepper<R, W> {
    reader: Mutex<R>,
    writer: Mutex<W>,
    halted: AtomicBool,
}

impl LineStepper<BufReader<File>, File> {
    /// Open a serial device that is already configured (baud rate, raw mode).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ActuatorError> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let reader = BufReader::new(file.try_clone()?);
        info!(device = %path.display(), "opened stepper device");
        Ok(Self::new(reader, file))
    }
}

impl<R: BufRead, W: Write> LineStepper<R, W> {
    /// Wrap a reply reader and a command writer.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            halted: AtomicBool::new(false),
        }
    }

    /// Whether `halt` has been called.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Recover the reader and writer.
    pub fn into_inner(self) -> Result<(R, W), ActuatorError> {
        let reader = self.reader.into_inner().map_err(|_| poisoned())?;
        let writer = self.writer.into_inner().map_err(|_| poisoned())?;
        Ok((reader, writer))
    }

    fn send(&self, steps: i64) -> Result<(), ActuatorError> {
        let mut writer = self.writer.lock().map_err(|_| poisoned())?;
        writeln!(writer, "{steps}")?;
        writer.flush()?;
        Ok(())
    }

    fn await_reply(&self) -> Result<(), ActuatorError> {
        let mut reader = self.reader.lock().map_err(|_| poisoned())?;
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(ActuatorError::Disconnected);
        }
        let reply = line.trim();
        if reply == "OK" {
            Ok(())
        } else {
            Err(ActuatorError::UnexpectedReply(reply.to_string()))
        }
    }
}

impl<R, W> Actuator for LineStepper<R, W>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    fn move_steps(&self, steps: i64) -> Result<(), ActuatorError> {
        if self.is_halted() {
            return Err(ActuatorError::Halted);
        }
        debug!(steps, "stepper move");
        self.send(steps)?;
        self.await_reply()
    }

    fn halt(&self) -> Result<(), ActuatorError> {
        self.halted.store(true, Ordering::SeqCst);
        warn!("halting stepper");
        // The board idles once any move in flight ends.
        self.send(0)
    }
}

fn poisoned() -> ActuatorError {
    ActuatorError::Fault("stepper lock poisoned".into())
}

/// Actuator that only logs and counts, for dry runs.
#[derive(Debug, Default)]
pub struct SimulatedActuator {
    delay: Duration,
    position: AtomicI64,
    moves: AtomicU64,
    halted: AtomicBool,
}

impl SimulatedActuator {
    /// Simulator whose moves complete instantly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every move take `delay`.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Sum of all steps moved.
    pub fn position(&self) -> i64 {
        self.position.load(Ordering::SeqCst)
    }

    /// Number of completed moves.
    pub fn moves(&self) -> u64 {
        self.moves.load(Ordering::SeqCst)
    }

    /// Whether `halt` has been called.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }
}

impl Actuator for SimulatedActuator {
    fn move_steps(&self, steps: i64) -> Result<(), ActuatorError> {
        if self.is_halted() {
            return Err(ActuatorError::Halted);
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let position = self.position.fetch_add(steps, Ordering::SeqCst) + steps;
        self.moves.fetch_add(1, Ordering::SeqCst);
        info!(steps, position, "simulated move");
        Ok(())
    }

    fn halt(&self) -> Result<(), ActuatorError> {
        self.halted.store(true, Ordering::SeqCst);
        info!(position = self.position(), "simulated halt");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio_test::assert_ok;

    fn stepper(replies: &str) -> LineStepper<Cursor<Vec<u8>>, Vec<u8>> {
        LineStepper::new(Cursor::new(replies.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_moves_write_lines_and_read_ok() {
        let s = stepper("OK\nOK\r\n");
        assert_ok!(s.move_steps(720));
        assert_ok!(s.move_steps(-7200));
        let (_, written) = s.into_inner().unwrap();
        assert_eq!(String::from_utf8(written).unwrap(), "720\n-7200\n");
    }

    #[test]
    fn test_unexpected_reply() {
        let s = stepper("ERR limit\n");
        match s.move_steps(720) {
            Err(ActuatorError::UnexpectedReply(r)) => assert_eq!(r, "ERR limit"),
            other => panic!("expected UnexpectedReply, got {other:?}"),
        }
    }

    #[test]
    fn test_eof_is_disconnect() {
        let s = stepper("");
        assert!(matches!(s.move_steps(1), Err(ActuatorError::Disconnected)));
    }

    #[test]
    fn test_halt_sends_zero_and_refuses_moves() {
        let s = stepper("OK\n");
        assert_ok!(s.halt());
        assert!(s.is_halted());
        assert!(matches!(s.move_steps(720), Err(ActuatorError::Halted)));
        let (_, written) = s.into_inner().unwrap();
        assert_eq!(written, b"0\n");
    }

    #[test]
    fn test_open_missing_device() {
        assert!(matches!(
            LineStepper::open("/nonexistent/dlprint/tty"),
            Err(ActuatorError::Io(_))
        ));
    }

    #[test]
    fn test_simulated_tracks_position() {
        let sim = SimulatedActuator::new();
        assert_ok!(sim.move_steps(720));
        assert_ok!(sim.move_steps(720));
        assert_ok!(sim.move_steps(-40));
        assert_eq!(sim.position(), 1400);
        assert_eq!(sim.moves(), 3);
        assert_ok!(sim.halt());
        assert!(matches!(sim.move_steps(1), Err(ActuatorError::Halted)));
        assert_eq!(sim.moves(), 3);
    }

    #[test]
    fn test_simulated_delay() {
        let sim = SimulatedActuator::with_delay(Duration::from_millis(20));
        let start = std::time::Instant::now();
        assert_ok!(sim.move_steps(1));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
