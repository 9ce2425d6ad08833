//! Sensor directory
//!
//! Resolves a gateway to the floor it serves and lists the slots on that
//! floor. `StaticDirectory` answers the same queries from a TOML file:
//!
//! ```toml
//! [[gateways]]
//! building = "vanak"
//! ip = "192.168.1.20"
//! floor = 2
//! status = 1
//!
//! [[slots]]
//! id = "0A01"
//! building = "vanak"
//! floor = 2
//! ```

use crate::domain::types::SensorRecord;
use async_trait::async_trait;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Gateway status value marking an active board
pub const STATUS_ACTIVE: i32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SensorDirectory: Send + Sync {
    /// Floor served by the active gateway `(building, ip)`, if any
    async fn resolve_floor(&self, building: &str, ip: &str) -> Result<Option<i32>, DirectoryError>;
    /// Slots on the floor, ascending by id
    async fn list_sensors(&self, building: &str, floor: i32)
        -> Result<Vec<SensorRecord>, DirectoryError>;
    async fn count_sensors(&self, building: &str, floor: i32) -> Result<usize, DirectoryError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEntry {
    pub building: String,
    pub ip: String,
    pub floor: i32,
    #[serde(default = "default_status")]
    pub status: i32,
}

fn default_status() -> i32 {
    STATUS_ACTIVE
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotEntry {
    pub id: String,
    pub building: String,
    pub floor: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticDirectory {
    #[serde(default)]
    gateways: Vec<GatewayEntry>,
    #[serde(default)]
    slots: Vec<SlotEntry>,
}

impl StaticDirectory {
    pub fn new(gateways: Vec<GatewayEntry>, slots: Vec<SlotEntry>) -> Self {
        Self { gateways, slots }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DirectoryError::Unavailable(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| DirectoryError::Unavailable(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn slots_on<'a>(&'a self, building: &'a str, floor: i32) -> impl Iterator<Item = &'a SlotEntry> {
        self.slots.iter().filter(move |s| s.building == building && s.floor == floor)
    }
}

#[async_trait]
impl SensorDirectory for StaticDirectory {
    async fn resolve_floor(&self, building: &str, ip: &str) -> Result<Option<i32>, DirectoryError> {
        Ok(self
            .gateways
            .iter()
            .find(|g| g.building == building && g.status == STATUS_ACTIVE && g.ip == ip)
            .map(|g| g.floor))
    }

    async fn list_sensors(
        &self,
        building: &str,
        floor: i32,
    ) -> Result<Vec<SensorRecord>, DirectoryError> {
        let mut sensors: Vec<SensorRecord> = self
            .slots_on(building, floor)
            .map(|s| SensorRecord { id: s.id.clone(), floor: s.floor })
            .collect();
        sensors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(sensors)
    }

    async fn count_sensors(&self, building: &str, floor: i32) -> Result<usize, DirectoryError> {
        Ok(self.slots_on(building, floor).count())
    }
}
