//! Interest allocation: one active claim per identity.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::{ClientIdentity, InterestRecord};
use crate::onboarding::OnboardingFlow;
use crate::store::RecordStore;

/// Deployment policy for who may claim a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationPolicy {
    /// Require `status = onboarded`. When off, the stored record must still
    /// carry valid values for every field of the flow.
    pub require_onboarded: bool,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            require_onboarded: true,
        }
    }
}

/// Write path turning an (identity, unit) pair into an interest.
///
/// The at-most-one-active rule is enforced by the store; nothing here reads
/// the existing claim before inserting.
pub struct InterestAllocator<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    flow: &'a OnboardingFlow,
    policy: AllocationPolicy,
}

impl<'a, S: RecordStore + ?Sized> InterestAllocator<'a, S> {
    pub fn new(store: &'a S, flow: &'a OnboardingFlow, policy: AllocationPolicy) -> Self {
        Self {
            store,
            flow,
            policy,
        }
    }

    /// Claim a unit for an identity. Returns the new waiting interest.
    pub fn express_interest(
        &self,
        client_uuid: &ClientIdentity,
        unit_id: &str,
    ) -> EngineResult<InterestRecord> {
        let patient = self.store.get_patient(client_uuid)?.ok_or_else(|| {
            EngineError::NotOnboarded(format!("No patient record for {}", client_uuid))
        })?;

        if self.policy.require_onboarded {
            if !patient.is_onboarded() {
                return Err(EngineError::NotOnboarded(format!(
                    "{} has not finished onboarding",
                    client_uuid
                )));
            }
        } else {
            self.flow.validate_record(&patient)?;
        }

        match self.store.create_interest(client_uuid, unit_id) {
            Ok(interest) => {
                tracing::info!(
                    client_uuid = %client_uuid,
                    unit_id,
                    interest_id = %interest.interest_id,
                    "Interest created"
                );
                Ok(interest)
            }
            Err(e) => {
                let err = EngineError::from(e);
                if matches!(err, EngineError::AllocationConflict { .. }) {
                    tracing::warn!(client_uuid = %client_uuid, unit_id, "Allocation conflict");
                }
                Err(err)
            }
        }
    }

    /// The identity's waiting or offered interest, if any.
    pub fn active_interest(&self, client_uuid: &ClientIdentity) -> EngineResult<Option<InterestRecord>> {
        Ok(self.store.get_active_interest(client_uuid)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{InterestStatus, PatientStatus, PatientUpdate, UnitRecord};
    use chrono::NaiveDate;

    fn setup() -> (Database, ClientIdentity) {
        let db = Database::open_in_memory().unwrap();
        for (id, day) in [("bedA", 1), ("bedB", 2)] {
            db.upsert_unit(&UnitRecord::new(
                id.into(),
                "Grevillea Court".into(),
                NaiveDate::from_ymd_opt(2026, 11, day).unwrap(),
            ))
            .unwrap();
        }
        let id = ClientIdentity::generate();
        db.create_draft_patient(&id).unwrap();
        (db, id)
    }

    fn complete_record() -> PatientUpdate {
        PatientUpdate {
            first_name: Some("Ivy".into()),
            last_name: Some("Papadopoulos".into()),
            email: Some("ivy@example.com".into()),
            phone: Some("0400111222".into()),
            hospital: Some("Prince of Wales".into()),
            approval_code: Some("7-246813579024".into()),
            room_type: Some("shared".into()),
            rad_amount: Some(300000.0),
            dap_amount: Some(52.1),
            means_tested_fee: Some(12.0),
            status: None,
        }
    }

    fn onboard(db: &Database, id: &ClientIdentity) {
        let mut update = complete_record();
        update.status = Some(PatientStatus::Onboarded);
        db.update_patient(id, &update).unwrap();
    }

    #[test]
    fn test_express_interest() {
        let (db, id) = setup();
        onboard(&db, &id);
        let flow = OnboardingFlow::standard();
        let allocator = InterestAllocator::new(&db, &flow, AllocationPolicy::default());

        let interest = allocator.express_interest(&id, "bedA").unwrap();
        assert_eq!(interest.status, InterestStatus::Waiting);
        assert_eq!(interest.client_uuid, id);

        let active = allocator.active_interest(&id).unwrap().unwrap();
        assert_eq!(active.interest_id, interest.interest_id);

        // Unit row untouched
        assert!(db.get_unit("bedA").unwrap().unwrap().is_open());
    }

    #[test]
    fn test_second_interest_conflicts() {
        let (db, id) = setup();
        onboard(&db, &id);
        let flow = OnboardingFlow::standard();
        let allocator = InterestAllocator::new(&db, &flow, AllocationPolicy::default());

        allocator.express_interest(&id, "bedA").unwrap();
        let result = allocator.express_interest(&id, "bedB");
        assert!(matches!(result, Err(EngineError::AllocationConflict { .. })));
    }

    #[test]
    fn test_gated_draft_is_not_onboarded() {
        let (db, id) = setup();
        let flow = OnboardingFlow::standard();
        let allocator = InterestAllocator::new(&db, &flow, AllocationPolicy::default());

        // Complete fields are not enough while the status is draft
        db.update_patient(&id, &complete_record()).unwrap();
        let result = allocator.express_interest(&id, "bedA");
        assert!(matches!(result, Err(EngineError::NotOnboarded(_))));
        assert!(db.list_interests_for_patient(&id).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_identity_is_not_onboarded() {
        let (db, _) = setup();
        let flow = OnboardingFlow::standard();
        let policy = AllocationPolicy {
            require_onboarded: false,
        };
        let allocator = InterestAllocator::new(&db, &flow, policy);

        let result = allocator.express_interest(&ClientIdentity::generate(), "bedA");
        assert!(matches!(result, Err(EngineError::NotOnboarded(_))));
    }

    #[test]
    fn test_ungated_requires_valid_fields() {
        let (db, id) = setup();
        let flow = OnboardingFlow::standard();
        let policy = AllocationPolicy {
            require_onboarded: false,
        };
        let allocator = InterestAllocator::new(&db, &flow, policy);

        let result = allocator.express_interest(&id, "bedA");
        assert!(matches!(result, Err(EngineError::Validation(_))));

        db.update_patient(&id, &complete_record()).unwrap();
        let interest = allocator.express_interest(&id, "bedA").unwrap();
        assert_eq!(interest.status, InterestStatus::Waiting);
    }

    #[test]
    fn test_closed_unit_unavailable() {
        let (db, id) = setup();
        onboard(&db, &id);
        let flow = OnboardingFlow::standard();
        let allocator = InterestAllocator::new(&db, &flow, AllocationPolicy::default());

        let result = allocator.express_interest(&id, "bedZ");
        assert!(matches!(result, Err(EngineError::UnitUnavailable(_))));
        assert!(allocator.active_interest(&id).unwrap().is_none());
    }
}
