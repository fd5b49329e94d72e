//! Interest (claim on a unit) models.

use serde::{Deserialize, Serialize};

use super::ClientIdentity;

/// Lifecycle status of an interest.
///
/// Only `Waiting` is written by the engine; the rest are set by the
/// placement process that works the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestStatus {
    /// Queued behind earlier claims
    Waiting,
    /// Facility has offered the bed
    Offered,
    /// Offer taken up
    Accepted,
    /// Patient pulled out
    Withdrawn,
    /// Offer refused
    Declined,
}

impl InterestStatus {
    /// Active interests block a second claim by the same identity.
    pub fn is_active(&self) -> bool {
        matches!(self, InterestStatus::Waiting | InterestStatus::Offered)
    }
}

/// A claim binding one patient to one unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterestRecord {
    /// Unique interest ID
    pub interest_id: String,
    /// Claiming identity
    pub client_uuid: ClientIdentity,
    /// Claimed unit
    pub unit_id: String,
    pub status: InterestStatus,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}
