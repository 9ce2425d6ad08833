//! Shared types for the sensor gateway

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One physical gateway board, fixed for the lifetime of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayTarget {
    pub ip: String,
    pub port: u16,
    pub building: String,
}

impl GatewayTarget {
    pub fn new(ip: impl Into<String>, port: u16, building: impl Into<String>) -> Self {
        Self { ip: ip.into(), port, building: building.into() }
    }

    /// `ip:port` form accepted by the resolver
    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl std::fmt::Display for GatewayTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} ({})", self.ip, self.port, self.building)
    }
}

/// Sensor slot as stored in the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub id: String,
    pub floor: i32,
}

/// Bytes returned by the gateway for one sensor request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawResponse(pub Bytes);

impl RawResponse {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex form; classifier offsets are counted over this
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for RawResponse {
    fn from(value: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(value))
    }
}

impl From<Vec<u8>> for RawResponse {
    fn from(value: Vec<u8>) -> Self {
        Self(Bytes::from(value))
    }
}

/// Occupancy / connectivity state of a single slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occupancy {
    /// Present on the bus but not reporting
    Disconnected,
    Free,
    Occupied,
    /// Too short or an undocumented status code
    Malformed,
}

impl Occupancy {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Occupancy::Disconnected => "disconnected",
            Occupancy::Free => "free",
            Occupancy::Occupied => "occupied",
            Occupancy::Malformed => "malformed",
        }
    }
}

/// One classification result, consumed immediately by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub sensor_id: String,
    pub kind: Occupancy,
}

/// Severity carried inside the log payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Critical,
}

impl LogLevel {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Critical => "critical",
        }
    }
}

/// Server-side log codes understood by the consumer
///
/// | Code | Level    | Case                          |
/// |------|----------|-------------------------------|
/// | 1301 | info     | Section status (free/occupied) |
/// | 2300 | warning  | Sensor disconnected           |
/// | 4200 | critical | Sensor directory unavailable  |
/// | 4300 | critical | Gateway socket fault          |
/// | 4400 | critical | Floor not found               |
pub mod codes {
    pub const SECTION_STATUS: i64 = 1301;
    pub const SENSOR_DISCONNECTED: i64 = 2300;
    pub const DIRECTORY_UNAVAILABLE: i64 = 4200;
    pub const SOCKET_FAULT: i64 = 4300;
    pub const FLOOR_NOT_FOUND: i64 = 4400;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_response_hex() {
        let raw = RawResponse::from(&[0x01u8, 0xAB, 0x00][..]);
        assert_eq!(raw.to_hex(), "01ab00");
        assert_eq!(raw.len(), 3);
    }

    #[test]
    fn test_gateway_target_addr() {
        let target = GatewayTarget::new("192.168.1.20", 4001, "vanak");
        assert_eq!(target.addr(), "192.168.1.20:4001");
        assert_eq!(target.to_string(), "192.168.1.20:4001 (vanak)");
    }

    #[test]
    fn test_occupancy_as_str() {
        assert_eq!(Occupancy::Free.as_str(), "free");
        assert_eq!(Occupancy::Occupied.as_str(), "occupied");
        assert_eq!(Occupancy::Disconnected.as_str(), "disconnected");
        assert_eq!(Occupancy::Malformed.as_str(), "malformed");
    }
}
