//! Stage layout of the onboarding record.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{FieldRule, FieldValue, FieldViolation, ValidationErrors};
use crate::models::{PatientRecord, PatientUpdate};

/// A stage-scoped field of the patient record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientField {
    FirstName,
    LastName,
    Email,
    Phone,
    Hospital,
    ApprovalCode,
    RoomType,
    RadAmount,
    DapAmount,
    MeansTestedFee,
}

impl PatientField {
    pub const ALL: [PatientField; 10] = [
        PatientField::FirstName,
        PatientField::LastName,
        PatientField::Email,
        PatientField::Phone,
        PatientField::Hospital,
        PatientField::ApprovalCode,
        PatientField::RoomType,
        PatientField::RadAmount,
        PatientField::DapAmount,
        PatientField::MeansTestedFee,
    ];

    /// Storage / wire key.
    pub fn key(self) -> &'static str {
        match self {
            PatientField::FirstName => "first_name",
            PatientField::LastName => "last_name",
            PatientField::Email => "email",
            PatientField::Phone => "phone",
            PatientField::Hospital => "hospital",
            PatientField::ApprovalCode => "approval_code",
            PatientField::RoomType => "room_type",
            PatientField::RadAmount => "rad_amount",
            PatientField::DapAmount => "dap_amount",
            PatientField::MeansTestedFee => "means_tested_fee",
        }
    }

    /// Human-readable name for error messages.
    pub fn label(self) -> &'static str {
        match self {
            PatientField::FirstName => "First name",
            PatientField::LastName => "Last name",
            PatientField::Email => "Email",
            PatientField::Phone => "Phone",
            PatientField::Hospital => "Hospital",
            PatientField::ApprovalCode => "Approval code",
            PatientField::RoomType => "Room type",
            PatientField::RadAmount => "RAD amount",
            PatientField::DapAmount => "DAP amount",
            PatientField::MeansTestedFee => "Means-tested fee",
        }
    }

    pub fn rule(self) -> FieldRule {
        match self {
            PatientField::FirstName
            | PatientField::LastName
            | PatientField::Hospital
            | PatientField::RoomType => FieldRule::Required,
            PatientField::Email => FieldRule::Email,
            PatientField::Phone => FieldRule::Phone,
            PatientField::ApprovalCode => FieldRule::ApprovalCode,
            PatientField::RadAmount | PatientField::DapAmount | PatientField::MeansTestedFee => {
                FieldRule::Amount
            }
        }
    }

    /// Current stored value rendered as input text.
    pub fn stored_value(self, record: &PatientRecord) -> Option<String> {
        match self {
            PatientField::FirstName => record.first_name.clone(),
            PatientField::LastName => record.last_name.clone(),
            PatientField::Email => record.email.clone(),
            PatientField::Phone => record.phone.clone(),
            PatientField::Hospital => record.hospital.clone(),
            PatientField::ApprovalCode => record.approval_code.clone(),
            PatientField::RoomType => record.room_type.clone(),
            PatientField::RadAmount => record.rad_amount.map(|v| v.to_string()),
            PatientField::DapAmount => record.dap_amount.map(|v| v.to_string()),
            PatientField::MeansTestedFee => record.means_tested_fee.map(|v| v.to_string()),
        }
    }

    /// Write a validated value into an update.
    pub(crate) fn apply(self, value: FieldValue, update: &mut PatientUpdate) {
        match value {
            FieldValue::Text(text) => match self {
                PatientField::FirstName => update.first_name = Some(text),
                PatientField::LastName => update.last_name = Some(text),
                PatientField::Email => update.email = Some(text),
                PatientField::Phone => update.phone = Some(text),
                PatientField::Hospital => update.hospital = Some(text),
                PatientField::ApprovalCode => update.approval_code = Some(text),
                PatientField::RoomType => update.room_type = Some(text),
                // Amount rules never yield text
                PatientField::RadAmount | PatientField::DapAmount | PatientField::MeansTestedFee => {}
            },
            FieldValue::Amount(amount) => match self {
                PatientField::RadAmount => update.rad_amount = Some(amount),
                PatientField::DapAmount => update.dap_amount = Some(amount),
                PatientField::MeansTestedFee => update.means_tested_fee = Some(amount),
                _ => {}
            },
        }
    }
}

impl fmt::Display for PatientField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for PatientField {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatientField::ALL
            .into_iter()
            .find(|field| field.key() == s)
            .ok_or_else(|| FlowError::UnknownField(s.to_string()))
    }
}

/// Named group of fields that is validated and persisted as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    pub name: String,
    pub fields: Vec<PatientField>,
}

impl StageDescriptor {
    pub fn new(name: impl Into<String>, fields: Vec<PatientField>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn contains(&self, field: PatientField) -> bool {
        self.fields.contains(&field)
    }
}

/// When buffered edits reach the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceMode {
    /// Whole stage written on transition
    #[default]
    Batch,
    /// Each valid edit written immediately
    Eager,
}

/// Invalid flow layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("Onboarding flow has no stages")]
    NoStages,

    #[error("Stage '{0}' has no fields")]
    EmptyStage(String),

    #[error("Field '{0}' appears in more than one stage")]
    DuplicateField(PatientField),

    #[error("Unknown patient field: {0}")]
    UnknownField(String),
}

/// Ordered stages a patient record is walked through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingFlow {
    stages: Vec<StageDescriptor>,
    persistence: PersistenceMode,
}

impl OnboardingFlow {
    /// Build a flow, rejecting empty layouts and fields listed twice.
    pub fn new(stages: Vec<StageDescriptor>, persistence: PersistenceMode) -> Result<Self, FlowError> {
        if stages.is_empty() {
            return Err(FlowError::NoStages);
        }

        let mut seen = HashSet::new();
        for stage in &stages {
            if stage.fields.is_empty() {
                return Err(FlowError::EmptyStage(stage.name.clone()));
            }
            for field in &stage.fields {
                if !seen.insert(*field) {
                    return Err(FlowError::DuplicateField(*field));
                }
            }
        }

        Ok(Self {
            stages,
            persistence,
        })
    }

    /// Eligibility, Identity, Constraints.
    pub fn standard() -> Self {
        Self {
            stages: vec![
                StageDescriptor::new(
                    "Eligibility",
                    vec![PatientField::Hospital, PatientField::ApprovalCode],
                ),
                StageDescriptor::new(
                    "Identity",
                    vec![
                        PatientField::FirstName,
                        PatientField::LastName,
                        PatientField::Phone,
                        PatientField::Email,
                    ],
                ),
                StageDescriptor::new(
                    "Constraints",
                    vec![
                        PatientField::RoomType,
                        PatientField::RadAmount,
                        PatientField::DapAmount,
                        PatientField::MeansTestedFee,
                    ],
                ),
            ],
            persistence: PersistenceMode::Batch,
        }
    }

    /// One "Patient Details" screen with contact and eligibility fields.
    pub fn single_screen() -> Self {
        Self {
            stages: vec![StageDescriptor::new(
                "Patient Details",
                vec![
                    PatientField::FirstName,
                    PatientField::LastName,
                    PatientField::Email,
                    PatientField::Phone,
                    PatientField::Hospital,
                    PatientField::ApprovalCode,
                ],
            )],
            persistence: PersistenceMode::Batch,
        }
    }

    pub fn with_persistence(mut self, persistence: PersistenceMode) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    pub fn stage(&self, index: usize) -> Option<&StageDescriptor> {
        self.stages.get(index)
    }

    pub fn persistence(&self) -> PersistenceMode {
        self.persistence
    }

    /// All fields across every stage, in stage order.
    pub fn fields(&self) -> impl Iterator<Item = PatientField> + '_ {
        self.stages.iter().flat_map(|stage| stage.fields.iter().copied())
    }

    /// Check the stored record against every field of the flow.
    pub fn validate_record(&self, record: &PatientRecord) -> Result<(), ValidationErrors> {
        let violations: Vec<FieldViolation> = self
            .fields()
            .filter_map(|field| {
                let raw = field.stored_value(record).unwrap_or_default();
                field
                    .rule()
                    .check(&raw)
                    .err()
                    .map(|reason| FieldViolation { field, reason })
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors::new(violations))
        }
    }
}

impl Default for OnboardingFlow {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClientIdentity;
    use crate::onboarding::ViolationReason;

    #[test]
    fn test_standard_flow_is_valid() {
        let standard = OnboardingFlow::standard();
        let rebuilt =
            OnboardingFlow::new(standard.stages().to_vec(), PersistenceMode::Batch).unwrap();
        assert_eq!(rebuilt, standard);
        assert_eq!(standard.stages().len(), 3);
        assert_eq!(standard.stage(0).unwrap().name, "Eligibility");
        assert_eq!(standard.fields().count(), 10);
    }

    #[test]
    fn test_flow_rejects_bad_layouts() {
        assert_eq!(
            OnboardingFlow::new(vec![], PersistenceMode::Batch),
            Err(FlowError::NoStages)
        );

        assert_eq!(
            OnboardingFlow::new(vec![StageDescriptor::new("Empty", vec![])], PersistenceMode::Batch),
            Err(FlowError::EmptyStage("Empty".into()))
        );

        let result = OnboardingFlow::new(
            vec![
                StageDescriptor::new("One", vec![PatientField::Email]),
                StageDescriptor::new("Two", vec![PatientField::Phone, PatientField::Email]),
            ],
            PersistenceMode::Eager,
        );
        assert_eq!(result, Err(FlowError::DuplicateField(PatientField::Email)));
    }

    #[test]
    fn test_field_keys_parse_back() {
        for field in PatientField::ALL {
            assert_eq!(field.key().parse::<PatientField>(), Ok(field));
        }
        assert!("shoe_size".parse::<PatientField>().is_err());
    }

    #[test]
    fn test_validate_record() {
        let flow = OnboardingFlow::single_screen();
        let mut record = PatientRecord::draft(ClientIdentity::generate());
        record.first_name = Some("Alan".into());
        record.last_name = Some("Tran".into());
        record.email = Some("alan@example.com".into());
        record.phone = Some("0298765432".into());
        record.hospital = Some("Concord".into());

        let errors = flow.validate_record(&record).unwrap_err();
        assert_eq!(errors.violations().len(), 1);
        assert_eq!(
            errors.reason_for(PatientField::ApprovalCode),
            Some(&ViolationReason::Missing)
        );

        record.approval_code = Some("3-000000000001".into());
        assert!(flow.validate_record(&record).is_ok());
    }

    #[test]
    fn test_amounts_render_for_revalidation() {
        let mut record = PatientRecord::draft(ClientIdentity::generate());
        record.rad_amount = Some(350000.0);
        let raw = PatientField::RadAmount.stored_value(&record).unwrap();
        assert_eq!(
            PatientField::RadAmount.rule().check(&raw),
            Ok(FieldValue::Amount(350000.0))
        );
    }
}
