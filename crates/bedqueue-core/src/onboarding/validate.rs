//! Format-level field validation.
//!
//! These rules check shape only. Amounts are accepted as opaque numbers;
//! no business checks are applied to them.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::PatientField;

/// Minimum phone length after trimming.
pub const MIN_PHONE_LEN: usize = 8;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+@\S+\.\S+").expect("email pattern compiles"));

// ASCII digits only: `\d` would admit other Unicode digits.
static APPROVAL_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9]-[0-9]{12}$").expect("approval pattern compiles"));

/// Which format rule a field is held to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Non-empty after trimming
    Required,
    Email,
    Phone,
    ApprovalCode,
    /// Any finite number
    Amount,
}

/// A field value that passed its rule, normalized for storage.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Amount(f64),
}

/// Why a single field was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViolationReason {
    #[error("is required")]
    Missing,
    #[error("must be an email address")]
    InvalidEmail,
    #[error("must be at least 8 characters")]
    PhoneTooShort,
    #[error("must be one digit from 1 to 9, a dash, then 12 digits")]
    InvalidApprovalCode,
    #[error("must be a number")]
    NotANumber,
    #[error("is not part of the current stage")]
    NotInCurrentStage,
}

impl FieldRule {
    /// Check a raw input value. The value is trimmed first.
    pub fn check(self, raw: &str) -> Result<FieldValue, ViolationReason> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(ViolationReason::Missing);
        }

        match self {
            FieldRule::Required => Ok(FieldValue::Text(value.to_string())),
            FieldRule::Email => {
                if EMAIL_RE.is_match(value) {
                    Ok(FieldValue::Text(value.to_string()))
                } else {
                    Err(ViolationReason::InvalidEmail)
                }
            }
            FieldRule::Phone => {
                if value.chars().count() >= MIN_PHONE_LEN {
                    Ok(FieldValue::Text(value.to_string()))
                } else {
                    Err(ViolationReason::PhoneTooShort)
                }
            }
            FieldRule::ApprovalCode => {
                if APPROVAL_CODE_RE.is_match(value) {
                    Ok(FieldValue::Text(value.to_string()))
                } else {
                    Err(ViolationReason::InvalidApprovalCode)
                }
            }
            FieldRule::Amount => match value.parse::<f64>() {
                Ok(amount) if amount.is_finite() => Ok(FieldValue::Amount(amount)),
                _ => Err(ViolationReason::NotANumber),
            },
        }
    }
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: PatientField,
    pub reason: ViolationReason,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field.label(), self.reason)
    }
}

/// Every field that failed in one validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldViolation>);

impl ValidationErrors {
    pub fn new(violations: Vec<FieldViolation>) -> Self {
        Self(violations)
    }

    pub fn single(field: PatientField, reason: ViolationReason) -> Self {
        Self(vec![FieldViolation { field, reason }])
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    /// Reason the given field failed, if it did.
    pub fn reason_for(&self, field: PatientField) -> Option<&ViolationReason> {
        self.0.iter().find(|v| v.field == field).map(|v| &v.reason)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
