//! Staged onboarding of a patient record.
//!
//! A session walks one identity through the stages of an [`OnboardingFlow`].
//! Edits are buffered on the session; leaving a stage validates every field
//! of that stage and writes them in one update. Leaving the last stage also
//! marks the record onboarded. The stored `status` is the only resumption
//! checkpoint: a draft always resumes at the first stage, an onboarded record
//! resumes at the catalog.

mod flow;
mod validate;

pub use flow::*;
pub use validate::*;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::{ClientIdentity, PatientRecord, PatientStatus, PatientUpdate};
use crate::store::RecordStore;

/// Where a session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    /// Index into the flow's stages
    Stage(usize),
    /// Onboarding done; the unit catalog is shown
    Catalog,
}

/// Per-identity onboarding state held by the caller between requests.
#[derive(Debug, Clone, PartialEq)]
pub struct OnboardingSession {
    client_uuid: ClientIdentity,
    position: Position,
    buffer: BTreeMap<PatientField, String>,
}

impl OnboardingSession {
    pub fn client_uuid(&self) -> &ClientIdentity {
        &self.client_uuid
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_complete(&self) -> bool {
        self.position == Position::Catalog
    }

    /// Buffered input for a field.
    pub fn value(&self, field: PatientField) -> Option<&str> {
        self.buffer.get(&field).map(String::as_str)
    }

    fn prefill(&mut self, fields: impl Iterator<Item = PatientField>, record: &PatientRecord) {
        for field in fields {
            if let Some(value) = field.stored_value(record) {
                self.buffer.insert(field, value);
            }
        }
    }
}

/// Drives sessions of one flow against a record store.
pub struct Onboarding<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    flow: &'a OnboardingFlow,
}

impl<'a, S: RecordStore + ?Sized> Onboarding<'a, S> {
    pub fn new(store: &'a S, flow: &'a OnboardingFlow) -> Self {
        Self { store, flow }
    }

    pub fn flow(&self) -> &OnboardingFlow {
        self.flow
    }

    /// Load the identity's record, creating a draft on first visit.
    pub fn resume(&self, client_uuid: &ClientIdentity) -> EngineResult<OnboardingSession> {
        let record = match self.store.get_patient(client_uuid)? {
            Some(record) => record,
            None => self.store.create_draft_patient(client_uuid)?,
        };

        let position = match record.status {
            PatientStatus::Onboarded => Position::Catalog,
            PatientStatus::Draft => Position::Stage(0),
        };

        let mut session = OnboardingSession {
            client_uuid: client_uuid.clone(),
            position,
            buffer: BTreeMap::new(),
        };
        session.prefill(self.flow.fields(), &record);

        tracing::debug!(client_uuid = %client_uuid, ?position, "Resumed onboarding");
        Ok(session)
    }

    /// Stage the session is on, if onboarding is not finished.
    pub fn current_stage(&self, session: &OnboardingSession) -> Option<&'a StageDescriptor> {
        match session.position {
            Position::Stage(index) => self.flow.stage(index),
            Position::Catalog => None,
        }
    }

    /// Record an edit to a field of the current stage.
    ///
    /// In batch mode the value is only buffered. In eager mode it is
    /// validated on its own and written straight away when valid.
    pub fn edit(
        &self,
        session: &mut OnboardingSession,
        field: PatientField,
        value: &str,
    ) -> EngineResult<()> {
        let in_stage = self
            .current_stage(session)
            .is_some_and(|stage| stage.contains(field));
        if !in_stage {
            return Err(ValidationErrors::single(field, ViolationReason::NotInCurrentStage).into());
        }

        session.buffer.insert(field, value.to_string());

        if self.flow.persistence() == PersistenceMode::Batch {
            tracing::debug!(client_uuid = %session.client_uuid, %field, "Buffered edit");
            return Ok(());
        }

        let checked = field
            .rule()
            .check(value)
            .map_err(|reason| ValidationErrors::single(field, reason))?;

        let mut update = PatientUpdate::default();
        field.apply(checked, &mut update);
        let record = self.store.update_patient(&session.client_uuid, &update)?;
        session.prefill(std::iter::once(field), &record);

        tracing::debug!(client_uuid = %session.client_uuid, %field, revision = record.revision, "Persisted edit");
        Ok(())
    }

    /// Validate the current stage and, if it passes, persist it and move on.
    ///
    /// On failure nothing is written and the session stays where it was.
    pub fn advance(&self, session: &mut OnboardingSession) -> EngineResult<Position> {
        let index = match session.position {
            Position::Catalog => return Ok(Position::Catalog),
            Position::Stage(index) => index,
        };
        let stage = self
            .flow
            .stage(index)
            .ok_or_else(|| EngineError::NotFound(format!("onboarding stage {}", index)))?;

        let mut update = match self.validate_stage(session, stage) {
            Ok(update) => update,
            Err(errors) => {
                tracing::warn!(
                    client_uuid = %session.client_uuid,
                    stage = %stage.name,
                    %errors,
                    "Stage transition rejected"
                );
                return Err(errors.into());
            }
        };

        let is_last = index + 1 == self.flow.stages().len();
        if is_last {
            update.status = Some(PatientStatus::Onboarded);
        }

        let record = self.store.update_patient(&session.client_uuid, &update)?;
        session.prefill(stage.fields.iter().copied(), &record);
        session.position = if record.is_onboarded() {
            Position::Catalog
        } else {
            Position::Stage(index + 1)
        };

        tracing::info!(
            client_uuid = %session.client_uuid,
            stage = %stage.name,
            position = ?session.position,
            revision = record.revision,
            "Stage accepted"
        );
        Ok(session.position)
    }

    fn validate_stage(
        &self,
        session: &OnboardingSession,
        stage: &StageDescriptor,
    ) -> Result<PatientUpdate, ValidationErrors> {
        let mut update = PatientUpdate::default();
        let mut violations = Vec::new();

        for &field in &stage.fields {
            let raw = session.value(field).unwrap_or_default();
            match field.rule().check(raw) {
                Ok(value) => field.apply(value, &mut update),
                Err(reason) => violations.push(FieldViolation { field, reason }),
            }
        }

        if violations.is_empty() {
            Ok(update)
        } else {
            Err(ValidationErrors::new(violations))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup() -> (Database, OnboardingFlow, ClientIdentity) {
        (
            Database::open_in_memory().unwrap(),
            OnboardingFlow::standard(),
            ClientIdentity::generate(),
        )
    }

    fn fill_eligibility(onboarding: &Onboarding<'_, Database>, session: &mut OnboardingSession) {
        onboarding
            .edit(session, PatientField::Hospital, "Westmead Hospital")
            .unwrap();
        onboarding
            .edit(session, PatientField::ApprovalCode, "2-163295213558")
            .unwrap();
    }

    fn fill_identity(onboarding: &Onboarding<'_, Database>, session: &mut OnboardingSession) {
        onboarding
            .edit(session, PatientField::FirstName, " Joan ")
            .unwrap();
        onboarding
            .edit(session, PatientField::LastName, "Wilson")
            .unwrap();
        onboarding
            .edit(session, PatientField::Phone, "0412 345 678")
            .unwrap();
        onboarding
            .edit(session, PatientField::Email, "joan@example.com")
            .unwrap();
    }

    fn fill_constraints(onboarding: &Onboarding<'_, Database>, session: &mut OnboardingSession) {
        onboarding
            .edit(session, PatientField::RoomType, "single")
            .unwrap();
        onboarding
            .edit(session, PatientField::RadAmount, "450000")
            .unwrap();
        onboarding
            .edit(session, PatientField::DapAmount, "71.5")
            .unwrap();
        onboarding
            .edit(session, PatientField::MeansTestedFee, "0")
            .unwrap();
    }

    #[test]
    fn test_resume_creates_draft() {
        let (db, flow, id) = setup();
        let onboarding = Onboarding::new(&db, &flow);

        let session = onboarding.resume(&id).unwrap();
        assert_eq!(session.position(), Position::Stage(0));
        assert_eq!(onboarding.current_stage(&session).unwrap().name, "Eligibility");

        let record = db.get_patient(&id).unwrap().unwrap();
        assert_eq!(record.status, PatientStatus::Draft);
    }

    #[test]
    fn test_invalid_approval_code_blocks_transition() {
        let (db, flow, id) = setup();
        let onboarding = Onboarding::new(&db, &flow);
        let mut session = onboarding.resume(&id).unwrap();

        onboarding
            .edit(&mut session, PatientField::Hospital, "Westmead Hospital")
            .unwrap();
        onboarding
            .edit(&mut session, PatientField::ApprovalCode, "0-123456789012")
            .unwrap();

        let err = onboarding.advance(&mut session).unwrap_err();
        match err {
            EngineError::Validation(errors) => {
                assert_eq!(errors.violations().len(), 1);
                assert_eq!(
                    errors.reason_for(PatientField::ApprovalCode),
                    Some(&ViolationReason::InvalidApprovalCode)
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(session.position(), Position::Stage(0));

        // Nothing of the stage was written, not even the valid hospital
        let record = db.get_patient(&id).unwrap().unwrap();
        assert!(record.hospital.is_none());
        assert!(record.approval_code.is_none());
        assert_eq!(record.revision, 0);

        onboarding
            .edit(&mut session, PatientField::ApprovalCode, "2-163295213558")
            .unwrap();
        assert_eq!(onboarding.advance(&mut session).unwrap(), Position::Stage(1));

        let record = db.get_patient(&id).unwrap().unwrap();
        assert_eq!(record.hospital, Some("Westmead Hospital".into()));
        assert_eq!(record.approval_code, Some("2-163295213558".into()));
        assert_eq!(record.status, PatientStatus::Draft);
    }

    #[test]
    fn test_full_flow_marks_onboarded() {
        let (db, flow, id) = setup();
        let onboarding = Onboarding::new(&db, &flow);
        let mut session = onboarding.resume(&id).unwrap();

        fill_eligibility(&onboarding, &mut session);
        assert_eq!(onboarding.advance(&mut session).unwrap(), Position::Stage(1));
        fill_identity(&onboarding, &mut session);
        assert_eq!(onboarding.advance(&mut session).unwrap(), Position::Stage(2));
        fill_constraints(&onboarding, &mut session);
        assert_eq!(onboarding.advance(&mut session).unwrap(), Position::Catalog);
        assert!(session.is_complete());

        let record = db.get_patient(&id).unwrap().unwrap();
        assert!(record.is_onboarded());
        assert_eq!(record.first_name, Some("Joan".into()));
        assert_eq!(record.rad_amount, Some(450000.0));
        assert_eq!(record.means_tested_fee, Some(0.0));
        assert_eq!(record.revision, 3);
        assert!(flow.validate_record(&record).is_ok());

        // Advancing past the end changes nothing
        assert_eq!(onboarding.advance(&mut session).unwrap(), Position::Catalog);
        assert_eq!(db.get_patient(&id).unwrap().unwrap().revision, 3);
    }

    #[test]
    fn test_missing_fields_reported_together() {
        let (db, flow, id) = setup();
        let onboarding = Onboarding::new(&db, &flow);
        let mut session = onboarding.resume(&id).unwrap();

        let err = onboarding.advance(&mut session).unwrap_err();
        let EngineError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.reason_for(PatientField::Hospital),
            Some(&ViolationReason::Missing)
        );
        assert_eq!(
            errors.reason_for(PatientField::ApprovalCode),
            Some(&ViolationReason::Missing)
        );
    }

    #[test]
    fn test_edit_outside_current_stage_rejected() {
        let (db, flow, id) = setup();
        let onboarding = Onboarding::new(&db, &flow);
        let mut session = onboarding.resume(&id).unwrap();

        let err = onboarding
            .edit(&mut session, PatientField::Email, "joan@example.com")
            .unwrap_err();
        let EngineError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.reason_for(PatientField::Email),
            Some(&ViolationReason::NotInCurrentStage)
        );
        assert!(session.value(PatientField::Email).is_none());
    }

    #[test]
    fn test_resume_draft_restarts_at_first_stage_with_values() {
        let (db, flow, id) = setup();
        let onboarding = Onboarding::new(&db, &flow);

        let mut session = onboarding.resume(&id).unwrap();
        fill_eligibility(&onboarding, &mut session);
        onboarding.advance(&mut session).unwrap();
        fill_identity(&onboarding, &mut session);
        // Leave before finishing the identity stage

        let resumed = onboarding.resume(&id).unwrap();
        assert_eq!(resumed.position(), Position::Stage(0));
        assert_eq!(resumed.value(PatientField::Hospital), Some("Westmead Hospital"));
        // Unsaved edits of the abandoned stage are gone
        assert!(resumed.value(PatientField::FirstName).is_none());
    }

    #[test]
    fn test_resume_onboarded_skips_to_catalog() {
        let (db, flow, id) = setup();
        db.create_draft_patient(&id).unwrap();
        db.update_patient(
            &id,
            &PatientUpdate {
                status: Some(PatientStatus::Onboarded),
                ..Default::default()
            },
        )
        .unwrap();

        let onboarding = Onboarding::new(&db, &flow);
        let session = onboarding.resume(&id).unwrap();
        assert_eq!(session.position(), Position::Catalog);
        assert!(onboarding.current_stage(&session).is_none());
    }

    #[test]
    fn test_eager_mode_persists_each_valid_edit() {
        let (db, _, id) = setup();
        let flow = OnboardingFlow::standard().with_persistence(PersistenceMode::Eager);
        let onboarding = Onboarding::new(&db, &flow);
        let mut session = onboarding.resume(&id).unwrap();

        onboarding
            .edit(&mut session, PatientField::Hospital, "  Liverpool Hospital ")
            .unwrap();
        let record = db.get_patient(&id).unwrap().unwrap();
        assert_eq!(record.hospital, Some("Liverpool Hospital".into()));
        assert_eq!(record.status, PatientStatus::Draft);

        // Invalid edit is reported and not written
        let result = onboarding.edit(&mut session, PatientField::ApprovalCode, "12");
        assert!(matches!(result, Err(EngineError::Validation(_))));
        assert!(db.get_patient(&id).unwrap().unwrap().approval_code.is_none());

        onboarding
            .edit(&mut session, PatientField::ApprovalCode, "5-000011112222")
            .unwrap();
        assert_eq!(onboarding.advance(&mut session).unwrap(), Position::Stage(1));
    }

    #[test]
    fn test_single_screen_flow() {
        let (db, _, id) = setup();
        let flow = OnboardingFlow::single_screen();
        let onboarding = Onboarding::new(&db, &flow);
        let mut session = onboarding.resume(&id).unwrap();

        for (field, value) in [
            (PatientField::FirstName, "Joan"),
            (PatientField::LastName, "Wilson"),
            (PatientField::Email, "joan@example.com"),
            (PatientField::Phone, "0412345678"),
            (PatientField::Hospital, "Westmead Hospital"),
            (PatientField::ApprovalCode, "2-163295213558"),
        ] {
            onboarding.edit(&mut session, field, value).unwrap();
        }

        assert_eq!(onboarding.advance(&mut session).unwrap(), Position::Catalog);
        assert!(db.get_patient(&id).unwrap().unwrap().is_onboarded());
    }
}
