//! Error types for coordinator detection

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to a device or an external tool
///
/// These stay inside the crate's components: the public probe, install and
/// enumeration entry points turn them into result values with a message.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Failed to open serial port
    #[error("failed to open port {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// Port busy or in use by another process
    #[error("port {0} is busy or in use")]
    PortBusy(String),

    /// I/O error while talking to the device
    #[error("I/O error on {port}: {reason}")]
    IoError { port: String, reason: String },

    /// External executable is not installed
    #[error("{0} not found")]
    ToolNotFound(String),

    /// External process could not be run
    #[error("failed to run {program}: {reason}")]
    Process { program: String, reason: String },

    /// Operation exceeded its time budget
    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },
}

impl DetectError {
    /// True if the error means another process holds the port
    pub fn is_port_busy(&self) -> bool {
        match self {
            DetectError::PortBusy(_) => true,
            DetectError::OpenFailed { reason, .. } | DetectError::IoError { reason, .. } => {
                looks_busy(reason)
            }
            _ => false,
        }
    }
}

/// Recognize the messages operating systems use for an exclusively held port
pub(crate) fn looks_busy(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("busy")
        || lower.contains("multiple access")
        || lower.contains("device disconnected")
        || lower.contains("access is denied")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_detection() {
        let err = DetectError::OpenFailed {
            port: "/dev/ttyUSB0".to_string(),
            reason: "Device or resource busy".to_string(),
        };
        assert!(err.is_port_busy());
        assert!(DetectError::PortBusy("/dev/ttyACM0".to_string()).is_port_busy());

        let err = DetectError::OpenFailed {
            port: "/dev/ttyUSB0".to_string(),
            reason: "No such file or directory".to_string(),
        };
        assert!(!err.is_port_busy());
    }

    #[test]
    fn test_multiple_access_is_busy() {
        let err = DetectError::IoError {
            port: "/dev/ttyUSB0".to_string(),
            reason: "device reports readiness to read but returned no data (device disconnected or multiple access on port?)".to_string(),
        };
        assert!(err.is_port_busy());
    }

    #[test]
    fn test_tool_errors_are_not_busy() {
        assert!(!DetectError::ToolNotFound("udevadm".to_string()).is_port_busy());
        let err = DetectError::Timeout {
            what: "universal-silabs-flasher".to_string(),
            after: std::time::Duration::from_secs(30),
        };
        assert!(!err.is_port_busy());
        assert_eq!(err.to_string(), "universal-silabs-flasher timed out after 30s");
    }
}
