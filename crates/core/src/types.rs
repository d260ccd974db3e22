//! Identity, position and status types shared by every mesh component.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Organisation prefixes accepted in node identifiers
pub const NODE_ID_PREFIXES: [&str; 5] = ["ARMY", "BSF", "ITBP", "MED", "CMD"];

/// Operating-area bounds (inclusive)
pub const LATITUDE_RANGE: (f64, f64) = (30.0, 40.0);
/// Longitude bounds (inclusive)
pub const LONGITUDE_RANGE: (f64, f64) = (70.0, 85.0);
/// Altitude bounds (inclusive)
pub const ALTITUDE_RANGE: (f64, f64) = (1000.0, 25000.0);

/// Validated node identifier, `<PREFIX>-<3..10 uppercase alphanumerics>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Parse and validate an identifier
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let valid = raw.split_once('-').is_some_and(|(prefix, suffix)| {
            NODE_ID_PREFIXES.contains(&prefix)
                && (3..=10).contains(&suffix.len())
                && suffix
                    .bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        });

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(ValidationError::InvalidNodeId(raw.to_string()))
        }
    }

    /// Borrow the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for NodeId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Geospatial position. Latitude/longitude in decimal degrees, altitude in
/// the same units the topology engine derates on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Altitude
    pub altitude: f64,
}

impl Position {
    /// Create a position without validating it
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    /// Check the position lies inside the operating area
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("latitude", self.latitude, LATITUDE_RANGE)?;
        check_range("longitude", self.longitude, LONGITUDE_RANGE)?;
        check_range("altitude", self.altitude, ALTITUDE_RANGE)
    }
}

fn check_range(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), ValidationError> {
    // NaN fails both comparisons, so test containment rather than exclusion
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ValidationError::CoordinateOutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// Operational status of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeStatus {
    /// Battery at or above 20%
    Active,
    /// Battery below 20%
    LowBattery,
    /// Operator took the node off the mesh
    Offline,
    /// Battery below 10%
    Emergency,
}

impl NodeStatus {
    /// Status implied by a battery level alone
    pub fn from_battery(battery_level: f64) -> Self {
        if battery_level < 10.0 {
            NodeStatus::Emergency
        } else if battery_level < 20.0 {
            NodeStatus::LowBattery
        } else {
            NodeStatus::Active
        }
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Active => "active",
            NodeStatus::LowBattery => "low-battery",
            NodeStatus::Offline => "offline",
            NodeStatus::Emergency => "emergency",
        }
    }
}

impl FromStr for NodeStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(NodeStatus::Active),
            "low-battery" => Ok(NodeStatus::LowBattery),
            "offline" => Ok(NodeStatus::Offline),
            "emergency" => Ok(NodeStatus::Emergency),
            other => Err(ValidationError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit a node belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitAffiliation {
    /// Indian Army
    #[serde(rename = "Indian Army")]
    IndianArmy,
    /// Border Security Force
    #[serde(rename = "BSF")]
    Bsf,
    /// Indo-Tibetan Border Police
    #[serde(rename = "ITBP")]
    Itbp,
    /// Medical team
    #[serde(rename = "Medical Team")]
    MedicalTeam,
    /// Command center
    #[serde(rename = "Command Center")]
    CommandCenter,
}

impl FromStr for UnitAffiliation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Indian Army" => Ok(UnitAffiliation::IndianArmy),
            "BSF" => Ok(UnitAffiliation::Bsf),
            "ITBP" => Ok(UnitAffiliation::Itbp),
            "Medical Team" => Ok(UnitAffiliation::MedicalTeam),
            "Command Center" => Ok(UnitAffiliation::CommandCenter),
            other => Err(ValidationError::InvalidUnit(other.to_string())),
        }
    }
}

/// Directed in-range pair from a single topology snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Origin node
    pub from: NodeId,
    /// Node reachable in one hop
    pub to: NodeId,
    /// Great-circle distance between the two
    pub distance: f64,
}

/// Get current timestamp in milliseconds
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
