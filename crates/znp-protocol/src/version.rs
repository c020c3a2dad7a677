//! `SYS_VERSION` response payload
//!
//! Depending on the firmware build the payload may start with a status
//! byte. After it come transport revision, product id, major, minor and
//! maintenance release, then an optional little-endian 32-bit revision.

use crate::to_hex;

/// Highest value treated as a leading status byte
const MAX_STATUS: u8 = 3;
/// Shortest payload that can carry a status byte plus the release fields
const MIN_LEN_WITH_STATUS: usize = 7;

/// Firmware version information reported by a ZNP coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SysVersion {
    /// Leading status byte, when the firmware sends one
    pub status: Option<u8>,
    /// Transport protocol revision
    pub transport_rev: Option<u8>,
    /// Product id (0 = Z-Stack 1.2, 1 = Z-Stack 3.x, 2 = Z-Stack 3.0.x)
    pub product: Option<u8>,
    /// Major release number
    pub major: Option<u8>,
    /// Minor release number
    pub minor: Option<u8>,
    /// Maintenance release number
    pub maint: Option<u8>,
    /// Firmware build revision, usually a date such as 20230507
    pub revision: Option<u32>,
    /// Raw payload as hex
    pub raw_hex: String,
}

impl SysVersion {
    /// Parse as many fields as `payload` carries
    pub fn parse(payload: &[u8]) -> Self {
        let mut version = SysVersion {
            raw_hex: to_hex(payload),
            ..Default::default()
        };

        let offset = match payload.first() {
            Some(&first) if first <= MAX_STATUS && payload.len() >= MIN_LEN_WITH_STATUS => {
                version.status = Some(first);
                1
            }
            _ => 0,
        };
        let fields = &payload[offset.min(payload.len())..];

        version.transport_rev = fields.first().copied();
        version.product = fields.get(1).copied();
        version.major = fields.get(2).copied();
        version.minor = fields.get(3).copied();
        version.maint = fields.get(4).copied();
        version.revision = fields
            .get(5..9)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]));

        version
    }

    /// `major.minor.maint`, when all three are known
    pub fn release(&self) -> Option<String> {
        match (self.major, self.minor, self.maint) {
            (Some(major), Some(minor), Some(maint)) => Some(format!("{}.{}.{}", major, minor, maint)),
            _ => None,
        }
    }
}

impl std::fmt::Display for SysVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.release() {
            Some(release) => write!(f, "{}", release)?,
            None => write!(f, "?")?,
        }
        if let Some(revision) = self.revision {
            write!(f, " (rev {})", revision)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_status() {
        // status, transport 2, product 1, 2.7.1, revision 20230715
        let payload = [0x00, 0x02, 0x01, 0x02, 0x07, 0x01, 0x3B, 0xB2, 0x34, 0x01];
        let version = SysVersion::parse(&payload);

        assert_eq!(version.status, Some(0));
        assert_eq!(version.transport_rev, Some(2));
        assert_eq!(version.product, Some(1));
        assert_eq!(version.release().as_deref(), Some("2.7.1"));
        assert_eq!(version.revision, Some(20_230_715));
        assert_eq!(version.raw_hex, "0002010207013bb23401");
    }

    #[test]
    fn test_parse_without_status() {
        let payload = [0x05, 0x00, 0x02, 0x06, 0x03];
        let version = SysVersion::parse(&payload);

        assert_eq!(version.status, None);
        assert_eq!(version.transport_rev, Some(5));
        assert_eq!(version.product, Some(0));
        assert_eq!(version.release().as_deref(), Some("2.6.3"));
        assert_eq!(version.revision, None);
    }

    #[test]
    fn test_short_payload_keeps_first_byte_as_field() {
        // Too short for a status byte, so the leading 2 is the transport revision
        let version = SysVersion::parse(&[0x02, 0x01, 0x02]);
        assert_eq!(version.status, None);
        assert_eq!(version.transport_rev, Some(2));
        assert_eq!(version.major, Some(2));
        assert_eq!(version.minor, None);
        assert_eq!(version.release(), None);
    }

    #[test]
    fn test_partial_revision_is_ignored() {
        let payload = [0x00, 0x02, 0x01, 0x02, 0x07, 0x01, 0x3B, 0xAE];
        let version = SysVersion::parse(&payload);
        assert_eq!(version.maint, Some(1));
        assert_eq!(version.revision, None);
    }

    #[test]
    fn test_empty_payload() {
        let version = SysVersion::parse(&[]);
        assert_eq!(version, SysVersion::default());
        assert_eq!(version.to_string(), "?");
    }

    #[test]
    fn test_display() {
        let payload = [0x00, 0x02, 0x01, 0x02, 0x07, 0x01, 0x3B, 0xB2, 0x34, 0x01];
        assert_eq!(SysVersion::parse(&payload).to_string(), "2.7.1 (rev 20230715)");
    }
}
