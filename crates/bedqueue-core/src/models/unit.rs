//! Allocatable unit (bed) models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Availability of a unit, as written by the inventory process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UnitStatus {
    Open,
    Closed,
    /// Any other inventory state, kept as written
    Other(String),
}

impl UnitStatus {
    pub fn as_str(&self) -> &str {
        match self {
            UnitStatus::Open => "open",
            UnitStatus::Closed => "closed",
            UnitStatus::Other(s) => s,
        }
    }
}

impl From<String> for UnitStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "open" => UnitStatus::Open,
            "closed" => UnitStatus::Closed,
            _ => UnitStatus::Other(s),
        }
    }
}

impl From<UnitStatus> for String {
    fn from(status: UnitStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A bed in a care facility that can be claimed by an interest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitRecord {
    /// Inventory identifier - unique
    pub unit_id: String,
    /// Facility (home) name
    pub facility_name: String,
    pub suburb: String,
    /// Room type (e.g. "single", "shared")
    pub room_type: String,
    /// First day the bed can be taken
    pub available_from: NaiveDate,
    /// Advertised RAD, if published
    pub rad_amount: Option<f64>,
    /// Advertised DAP, if published
    pub dap_amount: Option<f64>,
    pub status: UnitStatus,
}

impl UnitRecord {
    /// Create an open unit with required fields.
    pub fn new(unit_id: String, facility_name: String, available_from: NaiveDate) -> Self {
        Self {
            unit_id,
            facility_name,
            suburb: String::new(),
            room_type: String::new(),
            available_from,
            rad_amount: None,
            dap_amount: None,
            status: UnitStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == UnitStatus::Open
    }
}
