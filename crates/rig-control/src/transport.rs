//! Serial transport for CI-V frames
//!
//! Frames are written whole and read back one byte at a time until the
//! terminator shows up. Every read is bounded by a timeout so a silent rig
//! cannot hang the caller.
//!
//! The transport is generic over the I/O type to support both real serial
//! ports and the simulated rig (`tokio::io::duplex()`).

use std::time::Duration;

use civ_protocol::{FrameError, MAX_FRAME_LEN, TERMINATOR};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info, trace};

use crate::error::RigError;

/// Line speed the IC-7410 CI-V port is configured for
pub const DEFAULT_BAUD_RATE: u32 = 19_200;
/// Default bound on waiting for one frame
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Byte-level CI-V transport
pub struct SerialTransport<T> {
    name: String,
    io: T,
    timeout: Duration,
}

impl SerialTransport<SerialStream> {
    /// Open a serial device in raw 8N1 mode without modem control
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, RigError> {
        let stream = tokio_serial::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(100))
            .open_native_async()
            .map_err(|e| RigError::DeviceOpen {
                port: port_name.to_string(),
                reason: e.to_string(),
            })?;

        info!("Opened {} at {} baud", port_name, baud_rate);
        Ok(Self::new(port_name.to_string(), stream))
    }
}

impl<T> SerialTransport<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an existing byte stream
    pub fn new(name: String, io: T) -> Self {
        Self {
            name,
            io,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-frame read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Port or stream name, for logging
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current per-frame read timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Write a complete frame
    pub async fn write_frame(&mut self, frame: &[u8]) -> Result<(), RigError> {
        trace!("{} <- {:02X?}", self.name, frame);
        self.io.write_all(frame).await.map_err(RigError::Write)?;
        self.io.flush().await.map_err(RigError::Write)?;
        Ok(())
    }

    /// Read one frame, terminator included
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, RigError> {
        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.read_until_terminator()).await {
            Ok(result) => {
                let frame = result?;
                trace!("{} -> {:02X?}", self.name, frame);
                Ok(frame)
            }
            Err(_) => {
                debug!("{}: no frame within {:?}", self.name, timeout);
                Err(RigError::Timeout(timeout.as_millis() as u64))
            }
        }
    }

    /// Drop whatever input is already waiting, without blocking
    ///
    /// Returns the number of bytes thrown away.
    pub async fn discard_input(&mut self) -> usize {
        let mut buf = [0u8; 64];
        let mut discarded = 0;
        while let Ok(Ok(n)) = tokio::time::timeout(Duration::ZERO, self.io.read(&mut buf)).await {
            if n == 0 {
                break;
            }
            trace!("{} -> {:02X?} (discarded)", self.name, &buf[..n]);
            discarded += n;
        }
        discarded
    }

    async fn read_until_terminator(&mut self) -> Result<Vec<u8>, RigError> {
        let mut frame = Vec::with_capacity(16);
        loop {
            let byte = self.io.read_u8().await.map_err(RigError::Read)?;
            frame.push(byte);
            if byte == TERMINATOR {
                return Ok(frame);
            }
            if frame.len() >= MAX_FRAME_LEN {
                return Err(FrameError::MalformedFrame {
                    scanned: frame.len(),
                }
                .into());
            }
        }
    }

    /// Give back the underlying stream
    pub fn into_inner(self) -> T {
        self.io
    }
}

/// Names of the serial ports present on this machine
pub fn list_ports() -> Result<Vec<String>, RigError> {
    let ports = serialport::available_ports().map_err(|e| RigError::DeviceOpen {
        port: "*".to_string(),
        reason: e.to_string(),
    })?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_read_frame_stops_at_terminator() {
        let (client, mut rig) = duplex(64);
        let mut transport = SerialTransport::new("test".into(), client);

        rig.write_all(&[0xFE, 0xFE, 0xE0, 0x80, 0xFB, 0xFD, 0xFE])
            .await
            .unwrap();

        let frame = transport.read_frame().await.unwrap();
        assert_eq!(frame, vec![0xFE, 0xFE, 0xE0, 0x80, 0xFB, 0xFD]);
    }

    #[tokio::test]
    async fn test_write_frame() {
        let (client, mut rig) = duplex(64);
        let mut transport = SerialTransport::new("test".into(), client);

        transport
            .write_frame(&[0xFE, 0xFE, 0x80, 0xE0, 0x03, 0xFD])
            .await
            .unwrap();

        let mut buf = [0u8; 6];
        rig.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0xFE, 0xFE, 0x80, 0xE0, 0x03, 0xFD]);
    }

    #[tokio::test]
    async fn test_read_frame_times_out() {
        let (client, _rig) = duplex(64);
        let mut transport = SerialTransport::new("test".into(), client)
            .with_timeout(Duration::from_millis(20));

        let err = transport.read_frame().await.unwrap_err();
        assert!(matches!(err, RigError::Timeout(20)));
    }

    #[tokio::test]
    async fn test_discard_input_empties_pending_bytes() {
        let (client, mut rig) = duplex(64);
        let mut transport = SerialTransport::new("test".into(), client)
            .with_timeout(Duration::from_millis(20));

        assert_eq!(transport.discard_input().await, 0);

        rig.write_all(&[0xFE, 0xFE, 0xE0, 0x80, 0xFB, 0xFD, 0x14])
            .await
            .unwrap();
        assert_eq!(transport.discard_input().await, 7);

        let err = transport.read_frame().await.unwrap_err();
        assert!(matches!(err, RigError::Timeout(20)));
    }

    #[tokio::test]
    async fn test_read_frame_eof_is_read_error() {
        let (client, mut rig) = duplex(64);
        let mut transport = SerialTransport::new("test".into(), client);

        rig.write_all(&[0xFE, 0xFE]).await.unwrap();
        drop(rig);

        let err = transport.read_frame().await.unwrap_err();
        assert!(matches!(err, RigError::Read(_)));
    }

    #[tokio::test]
    async fn test_read_frame_bounded_without_terminator() {
        let (client, mut rig) = duplex(1024);
        let mut transport = SerialTransport::new("test".into(), client);

        rig.write_all(&[0x00; 300]).await.unwrap();

        let err = transport.read_frame().await.unwrap_err();
        assert!(matches!(
            err,
            RigError::Frame(FrameError::MalformedFrame { scanned: 256 })
        ));
    }
}
