//! SQLite schema definition.

/// Complete database schema for the record store.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients (one row per client identity)
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    client_uuid TEXT PRIMARY KEY,
    first_name TEXT,
    last_name TEXT,
    email TEXT,
    phone TEXT,
    hospital TEXT,
    approval_code TEXT,
    room_type TEXT,
    rad_amount REAL,
    dap_amount REAL,
    means_tested_fee REAL,
    status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'onboarded')),
    revision INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_status ON patients(status);

-- ============================================================================
-- Beds (owned by the inventory process, read-only to the engine)
-- ============================================================================

CREATE TABLE IF NOT EXISTS beds (
    unit_id TEXT PRIMARY KEY,
    facility_name TEXT NOT NULL,
    suburb TEXT NOT NULL DEFAULT '',
    room_type TEXT NOT NULL DEFAULT '',
    available_from TEXT NOT NULL,                -- YYYY-MM-DD
    rad_amount REAL,
    dap_amount REAL,
    status TEXT NOT NULL DEFAULT 'open',         -- open, closed, or any inventory state
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Catalog feed: open beds by availability
CREATE INDEX IF NOT EXISTS idx_beds_status_available ON beds(status, available_from, unit_id);

-- ============================================================================
-- Interests (claims of a patient on a bed)
-- ============================================================================

CREATE TABLE IF NOT EXISTS interests (
    interest_id TEXT PRIMARY KEY,
    client_uuid TEXT NOT NULL REFERENCES patients(client_uuid),
    unit_id TEXT NOT NULL REFERENCES beds(unit_id),
    status TEXT NOT NULL DEFAULT 'waiting'
        CHECK (status IN ('waiting', 'offered', 'accepted', 'withdrawn', 'declined')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- At most one active interest per identity
CREATE UNIQUE INDEX IF NOT EXISTS idx_interests_one_active
    ON interests(client_uuid) WHERE status IN ('waiting', 'offered');

CREATE INDEX IF NOT EXISTS idx_interests_client ON interests(client_uuid);
CREATE INDEX IF NOT EXISTS idx_interests_unit ON interests(unit_id);
"#;
