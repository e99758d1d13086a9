//! I²C side-band control channel (§4.C "I²C side-band", §6.2).
//!
//! Latency-sensitive control operations (estop, clear, flush, step, pause,
//! unpause) bypass the serial pipe entirely. The bus is shared with a power
//! monitor outside core scope (§5 "Shared resources") and must be reopened
//! on every I/O error rather than assumed recoverable in place.

use std::path::PathBuf;
use std::time::Duration;

use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;
use tracing::warn;

use mc_common::consts::{I2C_RETRIES, I2C_RETRY_SPACING_MS};

use crate::error::FirmwareError;

/// Optional payload accompanying a side-band op byte (§6.2).
#[derive(Debug, Clone, Copy)]
pub enum Payload {
    None,
    Byte(u8),
    Word(u16),
}

impl Payload {
    fn encode(self, op: u8) -> Vec<u8> {
        match self {
            Payload::None => vec![op],
            Payload::Byte(b) => vec![op, b],
            Payload::Word(w) => {
                let bytes = w.to_le_bytes();
                vec![op, bytes[0], bytes[1]]
            }
        }
    }
}

/// Abstraction over the physical bus so the retry/reopen policy is
/// unit-testable without real I²C hardware.
pub trait I2cBus {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()>;
    fn reopen(&mut self) -> std::io::Result<()>;
}

/// The production bus: a Linux I²C character device at a fixed 7-bit
/// address, reopened on any `IOError` per §5.
pub struct LinuxI2cSideband {
    path: PathBuf,
    address: u16,
    device: LinuxI2CDevice,
}

impl LinuxI2cSideband {
    pub fn open(path: impl Into<PathBuf>, address: u16) -> Result<Self, FirmwareError> {
        let path = path.into();
        let device = LinuxI2CDevice::new(&path, address)
            .map_err(|e| FirmwareError::I2c(e.to_string()))?;
        Ok(LinuxI2cSideband {
            path,
            address,
            device,
        })
    }
}

impl I2cBus for LinuxI2cSideband {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.device
            .write(bytes)
            .map_err(|e| std::io::Error::other(e.to_string()))
    }

    fn reopen(&mut self) -> std::io::Result<()> {
        let device = LinuxI2CDevice::new(&self.path, self.address)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        self.device = device;
        Ok(())
    }
}

/// Single-byte op codes routed over the side-band (§4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebandOp {
    Estop,
    Clear,
    Flush,
    Step,
    Unpause,
    Pause,
}

impl SidebandOp {
    fn byte(self) -> u8 {
        match self {
            SidebandOp::Estop => b'E',
            SidebandOp::Clear => b'C',
            SidebandOp::Flush => b'F',
            SidebandOp::Step => b'S',
            SidebandOp::Unpause => b'U',
            SidebandOp::Pause => b'P',
        }
    }
}

/// Transmit one side-band operation, retrying up to [`I2C_RETRIES`] times at
/// [`I2C_RETRY_SPACING_MS`] spacing, reopening the bus between attempts
/// (§4.C, §6.2).
pub async fn send(bus: &mut dyn I2cBus, op: SidebandOp, payload: Payload) -> Result<(), FirmwareError> {
    let bytes = payload.encode(op.byte());
    let mut last_err = None;

    for attempt in 0..=I2C_RETRIES {
        match bus.write(&bytes) {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!("i2c write failed (attempt {attempt}): {e}");
                last_err = Some(e);
                if attempt < I2C_RETRIES {
                    if let Err(reopen_err) = bus.reopen() {
                        warn!("i2c reopen failed: {reopen_err}");
                    }
                    tokio::time::sleep(Duration::from_millis(I2C_RETRY_SPACING_MS)).await;
                }
            }
        }
    }

    Err(FirmwareError::I2c(
        last_err.map(|e| e.to_string()).unwrap_or_default(),
    ))
}

pub async fn estop(bus: &mut dyn I2cBus) -> Result<(), FirmwareError> {
    send(bus, SidebandOp::Estop, Payload::None).await
}
pub async fn clear(bus: &mut dyn I2cBus) -> Result<(), FirmwareError> {
    send(bus, SidebandOp::Clear, Payload::None).await
}
pub async fn flush(bus: &mut dyn I2cBus) -> Result<(), FirmwareError> {
    send(bus, SidebandOp::Flush, Payload::None).await
}
pub async fn step(bus: &mut dyn I2cBus) -> Result<(), FirmwareError> {
    send(bus, SidebandOp::Step, Payload::None).await
}
pub async fn unpause(bus: &mut dyn I2cBus) -> Result<(), FirmwareError> {
    send(bus, SidebandOp::Unpause, Payload::None).await
}

/// `pause()` with `optional=false` (required) or `true` (§4.E, §4.B).
pub async fn pause(bus: &mut dyn I2cBus, optional: bool) -> Result<(), FirmwareError> {
    send(bus, SidebandOp::Pause, Payload::Byte(optional as u8)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct FlakyBus {
        fail_count: usize,
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
        reopens: usize,
    }

    impl I2cBus for FlakyBus {
        fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
            if self.fail_count > 0 {
                self.fail_count -= 1;
                return Err(std::io::Error::other("nack"));
            }
            self.writes.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }

        fn reopen(&mut self) -> std::io::Result<()> {
            self.reopens += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let mut bus = FlakyBus {
            fail_count: 2,
            writes: writes.clone(),
            reopens: 0,
        };
        estop(&mut bus).await.unwrap();
        assert_eq!(bus.reopens, 2);
        assert_eq!(writes.lock().unwrap().len(), 1);
        assert_eq!(writes.lock().unwrap()[0], vec![b'E']);
    }

    #[tokio::test]
    async fn gives_up_after_exhausting_retries() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let mut bus = FlakyBus {
            fail_count: 100,
            writes,
            reopens: 0,
        };
        let err = estop(&mut bus).await.unwrap_err();
        assert!(matches!(err, FirmwareError::I2c(_)));
        assert_eq!(bus.reopens, I2C_RETRIES as usize);
    }

    #[tokio::test]
    async fn pause_encodes_optional_byte() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let mut bus = FlakyBus {
            fail_count: 0,
            writes: writes.clone(),
            reopens: 0,
        };
        pause(&mut bus, true).await.unwrap();
        assert_eq!(writes.lock().unwrap()[0], vec![b'P', 1]);
    }
}
