//! Patient (onboarding subject) models.

use serde::{Deserialize, Serialize};

use super::ClientIdentity;

/// Onboarding progress checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    /// Created on first visit, onboarding not finished
    Draft,
    /// Every onboarding stage accepted
    Onboarded,
}

/// One onboarding subject, keyed by client identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientRecord {
    /// Client identity - unique key
    pub client_uuid: ClientIdentity,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Discharging hospital
    pub hospital: Option<String>,
    /// Aged-care approval code (e.g. "2-163295213558")
    pub approval_code: Option<String>,
    /// Preferred room type
    pub room_type: Option<String>,
    /// Refundable accommodation deposit, opaque figure
    pub rad_amount: Option<f64>,
    /// Daily accommodation payment, opaque figure
    pub dap_amount: Option<f64>,
    /// Means-tested care fee, opaque figure
    pub means_tested_fee: Option<f64>,
    /// Onboarding status
    pub status: PatientStatus,
    /// Bumped by every committed update
    pub revision: i64,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl PatientRecord {
    /// Create an empty draft record for an identity.
    pub fn draft(client_uuid: ClientIdentity) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            client_uuid,
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            hospital: None,
            approval_code: None,
            room_type: None,
            rad_amount: None,
            dap_amount: None,
            means_tested_fee: None,
            status: PatientStatus::Draft,
            revision: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Check if onboarding has been completed.
    pub fn is_onboarded(&self) -> bool {
        self.status == PatientStatus::Onboarded
    }
}

/// Partial update of a patient record.
///
/// `None` leaves the stored value untouched. Applied as a single write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub hospital: Option<String>,
    pub approval_code: Option<String>,
    pub room_type: Option<String>,
    pub rad_amount: Option<f64>,
    pub dap_amount: Option<f64>,
    pub means_tested_fee: Option<f64>,
    pub status: Option<PatientStatus>,
}

impl PatientUpdate {
    /// True when applying this update would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
