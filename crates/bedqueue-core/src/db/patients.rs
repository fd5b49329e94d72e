//! Patient database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{ClientIdentity, PatientRecord, PatientStatus, PatientUpdate};

impl Database {
    /// Get a patient by client identity.
    pub fn get_patient(&self, client_uuid: &ClientIdentity) -> DbResult<Option<PatientRecord>> {
        self.conn
            .query_row(
                r#"
                SELECT client_uuid, first_name, last_name, email, phone, hospital,
                       approval_code, room_type, rad_amount, dap_amount, means_tested_fee,
                       status, revision, created_at, updated_at
                FROM patients
                WHERE client_uuid = ?
                "#,
                [client_uuid.as_str()],
                PatientRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Create an empty draft for an identity, or return the one that exists.
    ///
    /// Safe to race: the primary key on `client_uuid` lets exactly one insert
    /// win and every caller re-reads the surviving row.
    pub fn create_draft_patient(&self, client_uuid: &ClientIdentity) -> DbResult<PatientRecord> {
        let now = chrono::Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            r#"
            INSERT INTO patients (client_uuid, status, created_at, updated_at)
            VALUES (?1, 'draft', ?2, ?2)
            ON CONFLICT(client_uuid) DO NOTHING
            "#,
            params![client_uuid.as_str(), now],
        )?;

        if inserted > 0 {
            tracing::info!(client_uuid = %client_uuid, "Created draft patient");
        } else {
            tracing::debug!(client_uuid = %client_uuid, "Draft patient already exists");
        }

        self.get_patient(client_uuid)?
            .ok_or_else(|| DbError::NotFound(format!("patient {}", client_uuid)))
    }

    /// Apply a partial update in one statement and return the stored result.
    pub fn update_patient(
        &self,
        client_uuid: &ClientIdentity,
        update: &PatientUpdate,
    ) -> DbResult<PatientRecord> {
        let now = chrono::Utc::now().to_rfc3339();
        let row = self
            .conn
            .query_row(
                r#"
                UPDATE patients SET
                    first_name = COALESCE(?2, first_name),
                    last_name = COALESCE(?3, last_name),
                    email = COALESCE(?4, email),
                    phone = COALESCE(?5, phone),
                    hospital = COALESCE(?6, hospital),
                    approval_code = COALESCE(?7, approval_code),
                    room_type = COALESCE(?8, room_type),
                    rad_amount = COALESCE(?9, rad_amount),
                    dap_amount = COALESCE(?10, dap_amount),
                    means_tested_fee = COALESCE(?11, means_tested_fee),
                    status = COALESCE(?12, status),
                    revision = revision + 1,
                    updated_at = ?13
                WHERE client_uuid = ?1
                RETURNING client_uuid, first_name, last_name, email, phone, hospital,
                          approval_code, room_type, rad_amount, dap_amount, means_tested_fee,
                          status, revision, created_at, updated_at
                "#,
                params![
                    client_uuid.as_str(),
                    update.first_name,
                    update.last_name,
                    update.email,
                    update.phone,
                    update.hospital,
                    update.approval_code,
                    update.room_type,
                    update.rad_amount,
                    update.dap_amount,
                    update.means_tested_fee,
                    update.status.as_ref().map(status_to_string),
                    now,
                ],
                PatientRow::from_row,
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("patient {}", client_uuid)))?;

        row.try_into()
    }

    /// List patients by status, oldest first.
    pub fn list_patients_by_status(&self, status: &PatientStatus) -> DbResult<Vec<PatientRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT client_uuid, first_name, last_name, email, phone, hospital,
                   approval_code, room_type, rad_amount, dap_amount, means_tested_fee,
                   status, revision, created_at, updated_at
            FROM patients
            WHERE status = ?
            ORDER BY created_at, client_uuid
            "#,
        )?;

        let rows = stmt.query_map([status_to_string(status)], PatientRow::from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    client_uuid: String,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    hospital: Option<String>,
    approval_code: Option<String>,
    room_type: Option<String>,
    rad_amount: Option<f64>,
    dap_amount: Option<f64>,
    means_tested_fee: Option<f64>,
    status: String,
    revision: i64,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(PatientRow {
            client_uuid: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            hospital: row.get(5)?,
            approval_code: row.get(6)?,
            room_type: row.get(7)?,
            rad_amount: row.get(8)?,
            dap_amount: row.get(9)?,
            means_tested_fee: row.get(10)?,
            status: row.get(11)?,
            revision: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

impl TryFrom<PatientRow> for PatientRecord {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let client_uuid = ClientIdentity::from_stored(row.client_uuid)
            .ok_or_else(|| DbError::Constraint("Blank client_uuid in patients".into()))?;
        let status = string_to_status(&row.status)?;

        Ok(PatientRecord {
            client_uuid,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            hospital: row.hospital,
            approval_code: row.approval_code,
            room_type: row.room_type,
            rad_amount: row.rad_amount,
            dap_amount: row.dap_amount,
            means_tested_fee: row.means_tested_fee,
            status,
            revision: row.revision,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn status_to_string(status: &PatientStatus) -> &'static str {
    match status {
        PatientStatus::Draft => "draft",
        PatientStatus::Onboarded => "onboarded",
    }
}

fn string_to_status(s: &str) -> Result<PatientStatus, DbError> {
    match s {
        "draft" => Ok(PatientStatus::Draft),
        "onboarded" => Ok(PatientStatus::Onboarded),
        _ => Err(DbError::Constraint(format!("Unknown patient status: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_get_missing_patient() {
        let db = setup_db();
        let id = ClientIdentity::generate();
        assert!(db.get_patient(&id).unwrap().is_none());
    }

    #[test]
    fn test_create_draft() {
        let db = setup_db();
        let id = ClientIdentity::generate();

        let patient = db.create_draft_patient(&id).unwrap();
        assert_eq!(patient.client_uuid, id);
        assert_eq!(patient.status, PatientStatus::Draft);
        assert!(patient.first_name.is_none());
        assert_eq!(patient.revision, 0);
    }

    #[test]
    fn test_create_draft_is_idempotent() {
        let db = setup_db();
        let id = ClientIdentity::generate();

        let first = db.create_draft_patient(&id).unwrap();
        db.update_patient(
            &id,
            &PatientUpdate {
                hospital: Some("Royal North Shore".into()),
                ..Default::default()
            },
        )
        .unwrap();

        // Second visit must not reset the record
        let second = db.create_draft_patient(&id).unwrap();
        assert_eq!(second.client_uuid, first.client_uuid);
        assert_eq!(second.hospital, Some("Royal North Shore".into()));

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_update_is_partial() {
        let db = setup_db();
        let id = ClientIdentity::generate();
        db.create_draft_patient(&id).unwrap();

        db.update_patient(
            &id,
            &PatientUpdate {
                first_name: Some("Margaret".into()),
                last_name: Some("Nguyen".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let updated = db
            .update_patient(
                &id,
                &PatientUpdate {
                    rad_amount: Some(450000.0),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.first_name, Some("Margaret".into()));
        assert_eq!(updated.last_name, Some("Nguyen".into()));
        assert_eq!(updated.rad_amount, Some(450000.0));
        assert_eq!(updated.status, PatientStatus::Draft);
        assert_eq!(updated.revision, 2);
    }

    #[test]
    fn test_update_status() {
        let db = setup_db();
        let id = ClientIdentity::generate();
        db.create_draft_patient(&id).unwrap();

        let updated = db
            .update_patient(
                &id,
                &PatientUpdate {
                    status: Some(PatientStatus::Onboarded),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(updated.is_onboarded());

        let onboarded = db.list_patients_by_status(&PatientStatus::Onboarded).unwrap();
        assert_eq!(onboarded.len(), 1);
        assert!(db
            .list_patients_by_status(&PatientStatus::Draft)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_update_unknown_patient() {
        let db = setup_db();
        let result = db.update_patient(
            &ClientIdentity::generate(),
            &PatientUpdate {
                email: Some("a@b.co".into()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }
}
