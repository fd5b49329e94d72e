//! Interest database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{is_foreign_key_violation, is_unique_violation, Database, DbError, DbResult};
use crate::models::{ClientIdentity, InterestRecord, InterestStatus};

impl Database {
    /// Claim an open bed for an identity.
    ///
    /// The open-bed check and the insert are one statement, and the partial
    /// unique index `idx_interests_one_active` rejects a second active claim,
    /// so concurrent callers on other connections cannot both succeed.
    pub fn create_interest(
        &self,
        client_uuid: &ClientIdentity,
        unit_id: &str,
    ) -> DbResult<InterestRecord> {
        let interest_id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let result = self.conn.execute(
            r#"
            INSERT INTO interests (interest_id, client_uuid, unit_id, status, created_at, updated_at)
            SELECT ?1, ?2, unit_id, 'waiting', ?3, ?3
            FROM beds
            WHERE unit_id = ?4 AND status = 'open'
            "#,
            params![interest_id, client_uuid.as_str(), now, unit_id],
        );

        match result {
            Ok(0) => Err(DbError::UnitUnavailable(unit_id.to_string())),
            Ok(_) => Ok(InterestRecord {
                interest_id,
                client_uuid: client_uuid.clone(),
                unit_id: unit_id.to_string(),
                status: InterestStatus::Waiting,
                created_at: now.clone(),
                updated_at: now,
            }),
            Err(e) if is_unique_violation(&e) => {
                Err(DbError::AllocationConflict(client_uuid.to_string()))
            }
            Err(e) if is_foreign_key_violation(&e) => Err(DbError::Constraint(format!(
                "No patient record for {}",
                client_uuid
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Get the waiting or offered interest for an identity, if any.
    pub fn get_active_interest(
        &self,
        client_uuid: &ClientIdentity,
    ) -> DbResult<Option<InterestRecord>> {
        self.conn
            .query_row(
                r#"
                SELECT interest_id, client_uuid, unit_id, status, created_at, updated_at
                FROM interests
                WHERE client_uuid = ? AND status IN ('waiting', 'offered')
                "#,
                [client_uuid.as_str()],
                InterestRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get an interest by ID.
    pub fn get_interest(&self, interest_id: &str) -> DbResult<Option<InterestRecord>> {
        self.conn
            .query_row(
                r#"
                SELECT interest_id, client_uuid, unit_id, status, created_at, updated_at
                FROM interests
                WHERE interest_id = ?
                "#,
                [interest_id],
                InterestRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List every interest an identity has held, newest first.
    pub fn list_interests_for_patient(
        &self,
        client_uuid: &ClientIdentity,
    ) -> DbResult<Vec<InterestRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT interest_id, client_uuid, unit_id, status, created_at, updated_at
            FROM interests
            WHERE client_uuid = ?
            ORDER BY created_at DESC, interest_id
            "#,
        )?;

        let rows = stmt.query_map([client_uuid.as_str()], InterestRow::from_row)?;

        let mut interests = Vec::new();
        for row in rows {
            interests.push(row?.try_into()?);
        }
        Ok(interests)
    }

    /// Move an interest along its lifecycle (placement-process write path).
    ///
    /// Reactivating a claim while the identity holds another active one is
    /// an allocation conflict.
    pub fn set_interest_status(&self, interest_id: &str, status: &InterestStatus) -> DbResult<bool> {
        let result = self.conn.execute(
            "UPDATE interests SET status = ?, updated_at = datetime('now') WHERE interest_id = ?",
            [status_to_string(status), interest_id],
        );

        match result {
            Ok(rows_affected) => Ok(rows_affected > 0),
            Err(e) if is_unique_violation(&e) => {
                Err(DbError::AllocationConflict(format!("interest {}", interest_id)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Intermediate row struct for database mapping.
struct InterestRow {
    interest_id: String,
    client_uuid: String,
    unit_id: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl InterestRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(InterestRow {
            interest_id: row.get(0)?,
            client_uuid: row.get(1)?,
            unit_id: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl TryFrom<InterestRow> for InterestRecord {
    type Error = DbError;

    fn try_from(row: InterestRow) -> Result<Self, Self::Error> {
        let client_uuid = ClientIdentity::from_stored(row.client_uuid)
            .ok_or_else(|| DbError::Constraint("Blank client_uuid in interests".into()))?;
        let status = string_to_status(&row.status)?;

        Ok(InterestRecord {
            interest_id: row.interest_id,
            client_uuid,
            unit_id: row.unit_id,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn status_to_string(status: &InterestStatus) -> &'static str {
    match status {
        InterestStatus::Waiting => "waiting",
        InterestStatus::Offered => "offered",
        InterestStatus::Accepted => "accepted",
        InterestStatus::Withdrawn => "withdrawn",
        InterestStatus::Declined => "declined",
    }
}

fn string_to_status(s: &str) -> Result<InterestStatus, DbError> {
    match s {
        "waiting" => Ok(InterestStatus::Waiting),
        "offered" => Ok(InterestStatus::Offered),
        "accepted" => Ok(InterestStatus::Accepted),
        "withdrawn" => Ok(InterestStatus::Withdrawn),
        "declined" => Ok(InterestStatus::Declined),
        _ => Err(DbError::Constraint(format!("Unknown interest status: {}", s))),
    }
}
