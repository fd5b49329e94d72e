//! Bed (unit) database operations.
//!
//! Beds belong to the inventory process. The engine only reads them; the
//! upsert here is the inventory side's write path.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{UnitRecord, UnitStatus};

impl Database {
    /// Insert or update a bed.
    pub fn upsert_unit(&self, unit: &UnitRecord) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO beds (
                unit_id, facility_name, suburb, room_type, available_from,
                rad_amount, dap_amount, status, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))
            ON CONFLICT(unit_id) DO UPDATE SET
                facility_name = excluded.facility_name,
                suburb = excluded.suburb,
                room_type = excluded.room_type,
                available_from = excluded.available_from,
                rad_amount = excluded.rad_amount,
                dap_amount = excluded.dap_amount,
                status = excluded.status,
                updated_at = datetime('now')
            "#,
            params![
                unit.unit_id,
                unit.facility_name,
                unit.suburb,
                unit.room_type,
                unit.available_from,
                unit.rad_amount,
                unit.dap_amount,
                unit.status.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Get a bed by ID, whatever its status.
    pub fn get_unit(&self, unit_id: &str) -> DbResult<Option<UnitRecord>> {
        self.conn
            .query_row(
                r#"
                SELECT unit_id, facility_name, suburb, room_type, available_from,
                       rad_amount, dap_amount, status
                FROM beds
                WHERE unit_id = ?
                "#,
                [unit_id],
                unit_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List open beds, soonest available first, ties by unit ID.
    pub fn list_open_units(&self) -> DbResult<Vec<UnitRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT unit_id, facility_name, suburb, room_type, available_from,
                   rad_amount, dap_amount, status
            FROM beds
            WHERE status = 'open'
            ORDER BY available_from ASC, unit_id ASC
            "#,
        )?;

        let rows = stmt.query_map([], unit_from_row)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn unit_from_row(row: &Row<'_>) -> rusqlite::Result<UnitRecord> {
    let available_from: NaiveDate = row.get(4)?;
    let status: String = row.get(7)?;
    Ok(UnitRecord {
        unit_id: row.get(0)?,
        facility_name: row.get(1)?,
        suburb: row.get(2)?,
        room_type: row.get(3)?,
        available_from,
        rad_amount: row.get(5)?,
        dap_amount: row.get(6)?,
        status: UnitStatus::from(status),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, day).unwrap()
    }

    fn bed(id: &str, day: u32, status: UnitStatus) -> UnitRecord {
        let mut unit = UnitRecord::new(id.into(), "Wattle Grove".into(), date(day));
        unit.suburb = "Parramatta".into();
        unit.room_type = "single".into();
        unit.status = status;
        unit
    }

    #[test]
    fn test_upsert_and_get() {
        let db = Database::open_in_memory().unwrap();

        let mut unit = bed("BED-1", 3, UnitStatus::Open);
        unit.rad_amount = Some(550000.0);
        db.upsert_unit(&unit).unwrap();

        let retrieved = db.get_unit("BED-1").unwrap().unwrap();
        assert_eq!(retrieved, unit);

        // Inventory closes the bed
        unit.status = UnitStatus::Closed;
        db.upsert_unit(&unit).unwrap();
        let retrieved = db.get_unit("BED-1").unwrap().unwrap();
        assert_eq!(retrieved.status, UnitStatus::Closed);
    }

    #[test]
    fn test_list_open_units_filters_and_orders() {
        let db = Database::open_in_memory().unwrap();

        db.upsert_unit(&bed("BED-C", 5, UnitStatus::Open)).unwrap();
        db.upsert_unit(&bed("BED-A", 9, UnitStatus::Open)).unwrap();
        db.upsert_unit(&bed("BED-B", 5, UnitStatus::Open)).unwrap();
        db.upsert_unit(&bed("BED-D", 1, UnitStatus::Closed)).unwrap();
        db.upsert_unit(&bed("BED-E", 2, UnitStatus::Other("held".into())))
            .unwrap();

        let units = db.list_open_units().unwrap();
        let ids: Vec<_> = units.iter().map(|u| u.unit_id.as_str()).collect();

        // Date ascending, same-day ties by ID
        assert_eq!(ids, vec!["BED-B", "BED-C", "BED-A"]);
        assert!(units.iter().all(|u| u.is_open()));
    }

    #[test]
    fn test_unknown_status_preserved() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_unit(&bed("BED-H", 2, UnitStatus::Other("held".into())))
            .unwrap();

        let retrieved = db.get_unit("BED-H").unwrap().unwrap();
        assert_eq!(retrieved.status, UnitStatus::Other("held".into()));
    }
}
