//! Record store contract used by the engine components.

use crate::db::{Database, DbResult};
use crate::models::{ClientIdentity, InterestRecord, PatientRecord, PatientUpdate, UnitRecord};

/// Durable storage for patients, beds and interests.
///
/// Implementations must back the two check-then-act operations with a
/// storage-level guarantee: `create_draft_patient` with a unique key on the
/// identity, and `create_interest` with an at-most-one-active-interest
/// constraint. A read followed by a write in application code is not enough.
pub trait RecordStore {
    fn get_patient(&self, client_uuid: &ClientIdentity) -> DbResult<Option<PatientRecord>>;

    /// Create an empty draft, or return the existing record unchanged.
    fn create_draft_patient(&self, client_uuid: &ClientIdentity) -> DbResult<PatientRecord>;

    /// Apply all fields of `update` atomically.
    fn update_patient(
        &self,
        client_uuid: &ClientIdentity,
        update: &PatientUpdate,
    ) -> DbResult<PatientRecord>;

    /// Open units, ascending by available-from date, ties by unit ID.
    fn list_open_units(&self) -> DbResult<Vec<UnitRecord>>;

    fn get_active_interest(&self, client_uuid: &ClientIdentity) -> DbResult<Option<InterestRecord>>;

    /// Insert a waiting interest unless the identity already holds an active one.
    fn create_interest(&self, client_uuid: &ClientIdentity, unit_id: &str)
        -> DbResult<InterestRecord>;
}

impl RecordStore for Database {
    fn get_patient(&self, client_uuid: &ClientIdentity) -> DbResult<Option<PatientRecord>> {
        Database::get_patient(self, client_uuid)
    }

    fn create_draft_patient(&self, client_uuid: &ClientIdentity) -> DbResult<PatientRecord> {
        Database::create_draft_patient(self, client_uuid)
    }

    fn update_patient(
        &self,
        client_uuid: &ClientIdentity,
        update: &PatientUpdate,
    ) -> DbResult<PatientRecord> {
        Database::update_patient(self, client_uuid, update)
    }

    fn list_open_units(&self) -> DbResult<Vec<UnitRecord>> {
        Database::list_open_units(self)
    }

    fn get_active_interest(&self, client_uuid: &ClientIdentity) -> DbResult<Option<InterestRecord>> {
        Database::get_active_interest(self, client_uuid)
    }

    fn create_interest(
        &self,
        client_uuid: &ClientIdentity,
        unit_id: &str,
    ) -> DbResult<InterestRecord> {
        Database::create_interest(self, client_uuid, unit_id)
    }
}
