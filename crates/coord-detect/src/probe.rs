//! Active Z-Stack (ZNP) probing
//!
//! This module opens a serial port and exchanges `SYS_PING` / `SYS_VERSION`
//! frames with the device. A valid ping response is proof of Z-Stack
//! firmware; the version response adds release details when the firmware
//! supplies them.

use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, trace, warn};
use znp_protocol::commands::{sys, Subsystem};
use znp_protocol::{verify_fcs, EncodeCommand, SysVersion, ZnpFrame, SOF};

use crate::classify::Driver;
use crate::error::{looks_busy, DetectError};

/// Z-Stack coordinators talk at this rate unless reflashed otherwise
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Hint appended to messages when another process holds the port
pub const PORT_BUSY_HINT: &str =
    "port is busy: stop the services using it (docker compose stop, or stop zigbee2mqtt) and retry";

/// Details gathered by a probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeDetails {
    /// Nothing beyond the message
    None,
    /// ZNP ping answered, version query did not
    ZnpPing,
    /// ZNP version response
    ZnpVersion(SysVersion),
    /// Output of the Silicon Labs flasher tool
    Ember(EmberDetails),
}

/// Information extracted from `universal-silabs-flasher ... info`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmberDetails {
    /// Firmware version, when the output names one
    pub firmware_version: Option<String>,
    /// Combined stdout and stderr of the tool
    pub raw_output: String,
}

/// Result of probing a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    /// Identified driver family
    pub driver: Driver,
    /// The probe produced an authoritative answer
    pub ok: bool,
    pub details: ProbeDetails,
    /// Human readable status with the next step on failure
    pub message: String,
}

impl ProbeResult {
    /// Negative result carrying only a message
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            driver: Driver::Unknown,
            ok: false,
            details: ProbeDetails::None,
            message: message.into(),
        }
    }

    /// Negative result for an I/O failure, with the busy-port hint when it applies
    pub(crate) fn from_error(context: &str, error: &DetectError) -> Self {
        let mut message = format!("{}: {}", context, error);
        if error.is_port_busy() {
            message.push_str(" (");
            message.push_str(PORT_BUSY_HINT);
            message.push(')');
        }
        Self::failed(message)
    }
}

/// Configuration for ZNP probing
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Serial baud rate
    pub baud_rate: u32,
    /// Time allowed to see the start of a response frame
    pub read_timeout: Duration,
    /// Time allowed for each remaining part of a frame once it has started
    pub byte_timeout: Duration,
    /// Ping requests sent before giving up
    pub ping_attempts: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_secs(1),
            byte_timeout: Duration::from_millis(200),
            ping_attempts: 3,
        }
    }
}

/// Z-Stack (ZNP) prober
pub struct ZnpProber {
    config: ProbeConfig,
}

impl ZnpProber {
    /// Create a new prober with default configuration
    pub fn new() -> Self {
        Self {
            config: ProbeConfig::default(),
        }
    }

    /// Create a prober with custom configuration
    pub fn with_config(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Open `device_path` and probe it
    pub async fn probe_port(&self, device_path: &str) -> ProbeResult {
        debug!("Probing {} at {} baud", device_path, self.config.baud_rate);

        let mut stream = match open_port(device_path, self.config.baud_rate) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to open {}: {}", device_path, e);
                return ProbeResult::from_error("Z-Stack probe failed", &e);
            }
        };

        {
            use tokio_serial::SerialPort;
            if let Err(e) = stream.clear(tokio_serial::ClearBuffer::All) {
                trace!("Could not clear buffers on {}: {}", device_path, e);
            }
        }

        self.run(device_path, &mut stream).await
    }

    /// Probe an already open stream
    pub async fn probe_stream<S>(&self, stream: &mut S) -> ProbeResult
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.run("stream", stream).await
    }

    /// Probe `stream`, naming it `port` in error messages
    async fn run<S>(&self, port: &str, stream: &mut S) -> ProbeResult
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.identify(port, stream).await {
            Ok(result) => result,
            Err(e) => {
                warn!("ZNP probe aborted: {}", e);
                ProbeResult::from_error("Z-Stack probe failed", &e)
            }
        }
    }

    async fn identify<S>(&self, port: &str, stream: &mut S) -> Result<ProbeResult, DetectError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        debug!("Probing for Z-Stack (ZNP)...");

        let ping = self
            .request_with_retry(stream, port, &ZnpFrame::sys_ping(), self.config.ping_attempts, |f| {
                f.is_response_to(Subsystem::Sys, sys::PING)
            })
            .await?;

        if ping.is_none() {
            debug!("No ZNP ping response");
            return Ok(ProbeResult::failed(
                "no ZNP ping response (probably not Z-Stack firmware, or wrong port/baud rate; check the adapter connection)",
            ));
        }

        let version = self
            .request_with_retry(stream, port, &ZnpFrame::sys_version(), 1, |f| {
                f.is_response_to(Subsystem::Sys, sys::VERSION)
            })
            .await?;

        let Some(frame) = version else {
            info!("Identified Z-Stack via ZNP ping (version query unanswered)");
            return Ok(ProbeResult {
                driver: Driver::Zstack,
                ok: true,
                details: ProbeDetails::ZnpPing,
                message: "ZNP ping ok, but the version query did not answer (old or limited firmware)"
                    .to_string(),
            });
        };

        let version = SysVersion::parse(frame.payload());
        info!("Identified Z-Stack firmware {}", version);
        Ok(ProbeResult {
            driver: Driver::Zstack,
            ok: true,
            details: ProbeDetails::ZnpVersion(version),
            message: "ZNP probe succeeded".to_string(),
        })
    }

    /// Send `request` up to `attempts` times until a frame satisfying `accept` arrives
    async fn request_with_retry<S, P>(
        &self,
        stream: &mut S,
        port: &str,
        request: &ZnpFrame,
        attempts: usize,
        accept: P,
    ) -> Result<Option<ZnpFrame>, DetectError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        P: Fn(&ZnpFrame) -> bool,
    {
        let bytes = request.encode();

        for attempt in 1..=attempts {
            trace!("Sending {} (attempt {}/{})", request, attempt, attempts);
            stream.write_all(&bytes).await.map_err(|e| io_error(port, e))?;
            stream.flush().await.map_err(|e| io_error(port, e))?;

            match read_frame(stream, port, self.config.read_timeout, self.config.byte_timeout).await? {
                Some(frame) if accept(&frame) => return Ok(Some(frame)),
                Some(frame) => trace!("Ignoring unrelated frame {}", frame),
                None => trace!("No valid frame for attempt {}", attempt),
            }
        }

        Ok(None)
    }
}

impl Default for ZnpProber {
    fn default() -> Self {
        Self::new()
    }
}

/// Read one ZNP frame
///
/// Bytes before the start-of-frame marker are skipped until `read_timeout`
/// expires. After the marker, the header, payload and FCS must each arrive
/// within `byte_timeout`. Short reads and FCS mismatches yield `Ok(None)`;
/// only genuine I/O failures are errors, reported against `port`.
pub async fn read_frame<S>(
    stream: &mut S,
    port: &str,
    read_timeout: Duration,
    byte_timeout: Duration,
) -> Result<Option<ZnpFrame>, DetectError>
where
    S: AsyncRead + Unpin,
{
    let deadline = Instant::now() + read_timeout;
    let mut byte = [0u8; 1];
    loop {
        match timeout_at(deadline, stream.read(&mut byte)).await {
            Err(_) => return Ok(None),
            Ok(Ok(0)) => return Ok(None),
            Ok(Ok(_)) if byte[0] == SOF => break,
            Ok(Ok(_)) => trace!("Skipping 0x{:02X} before SOF", byte[0]),
            Ok(Err(e)) if is_transient(&e) => continue,
            Ok(Err(e)) => return Err(io_error(port, e)),
        }
    }

    let mut header = [0u8; 3];
    if !read_exact_within(stream, port, &mut header, byte_timeout).await? {
        return Ok(None);
    }

    let mut payload = vec![0u8; header[0] as usize];
    if !read_exact_within(stream, port, &mut payload, byte_timeout).await? {
        return Ok(None);
    }

    let mut fcs = [0u8; 1];
    if !read_exact_within(stream, port, &mut fcs, byte_timeout).await? {
        return Ok(None);
    }

    if !verify_fcs(header, &payload, fcs[0]) {
        debug!("Discarding frame with bad FCS: {:02X?} {:02X?} {:02X}", header, payload, fcs[0]);
        return Ok(None);
    }

    let frame = match ZnpFrame::new(header[1], header[2], payload) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("Discarding frame from {}: {}", port, e);
            return Ok(None);
        }
    };
    trace!("Received {}", frame);
    Ok(Some(frame))
}

/// Fill `buf` within `limit`; `false` on timeout or end of stream
async fn read_exact_within<S>(
    stream: &mut S,
    port: &str,
    buf: &mut [u8],
    limit: Duration,
) -> Result<bool, DetectError>
where
    S: AsyncRead + Unpin,
{
    if buf.is_empty() {
        return Ok(true);
    }
    match timeout(limit, stream.read_exact(buf)).await {
        Err(_) => Ok(false),
        Ok(Ok(_)) => Ok(true),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Ok(Err(e)) if is_transient(&e) => Ok(false),
        Ok(Err(e)) => Err(io_error(port, e)),
    }
}

fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
    )
}

fn io_error(port: &str, e: std::io::Error) -> DetectError {
    DetectError::IoError {
        port: port.to_string(),
        reason: e.to_string(),
    }
}

/// Open a serial port for probing, 8N1 without flow control
pub fn open_port(device_path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream, DetectError> {
    use tokio_serial::SerialPortBuilderExt;

    tokio_serial::new(device_path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .timeout(Duration::from_millis(100))
        .open_native_async()
        .map_err(|e| {
            if looks_busy(&e.description) {
                DetectError::PortBusy(device_path.to_string())
            } else {
                DetectError::OpenFailed {
                    port: device_path.to_string(),
                    reason: e.to_string(),
                }
            }
        })
}
