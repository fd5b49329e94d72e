//! Bed Queue Core Library
//!
//! Identity & allocation engine for patients waiting on a care bed.
//!
//! # Architecture
//!
//! ```text
//!  Local profile ──► Identity Resolver ──► client_uuid
//!                                              │
//!                                 ┌────────────▼────────────┐
//!                                 │   Onboarding sessions   │
//!                                 │ Eligibility → Identity  │
//!                                 │      → Constraints      │
//!                                 └────────────┬────────────┘
//!                                              │ status = onboarded
//!                     Unit Catalog ◄───────────┤
//!                    (open beds by date)       │
//!                                 ┌────────────▼────────────┐
//!                                 │   Interest Allocator    │
//!                                 │ ≤ 1 active per identity │
//!                                 └────────────┬────────────┘
//!                                              │
//!                                       SQLite record store
//!                               (patients · beds · interests)
//! ```
//!
//! # Core Principle
//!
//! **Uniqueness lives in the store.** One patient row per identity is a
//! primary key; one active interest per identity is a partial unique index.
//! Application-side checks are advisory only.
//!
//! # Modules
//!
//! - [`db`]: SQLite record store
//! - [`models`]: Domain types (ClientIdentity, PatientRecord, UnitRecord, InterestRecord)
//! - [`identity`]: Client identity resolution over a local profile store
//! - [`onboarding`]: Stage flow, validation and the onboarding state machine
//! - [`catalog`]: Open-unit feed
//! - [`allocator`]: Interest allocation
//! - [`config`]: TOML engine configuration

pub mod allocator;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod models;
pub mod onboarding;
pub mod store;

// Re-export commonly used types
pub use allocator::{AllocationPolicy, InterestAllocator};
pub use catalog::{UnitCatalog, UnitSnapshot};
pub use config::EngineConfig;
pub use db::Database;
pub use error::{EngineError, EngineResult};
pub use identity::{IdentityProvider, LocalIdentityResolver, SqliteProfileStore};
pub use models::{
    ClientIdentity, InterestRecord, InterestStatus, PatientRecord, PatientStatus, PatientUpdate,
    UnitRecord, UnitStatus,
};
pub use onboarding::{Onboarding, OnboardingFlow, OnboardingSession, PatientField, Position};
pub use store::RecordStore;

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum BedQueueError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Identity unavailable: {0}")]
    IdentityUnavailable(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Allocation conflict: {0}")]
    AllocationConflict(String),

    #[error("Not onboarded: {0}")]
    NotOnboarded(String),

    #[error("Unit unavailable: {0}")]
    UnitUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<EngineError> for BedQueueError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Validation(errors) => BedQueueError::Validation(errors.to_string()),
            EngineError::IdentityUnavailable(msg) => BedQueueError::IdentityUnavailable(msg),
            EngineError::StoreUnavailable(msg) => BedQueueError::StoreUnavailable(msg),
            EngineError::AllocationConflict { client_uuid } => {
                BedQueueError::AllocationConflict(client_uuid)
            }
            EngineError::NotOnboarded(msg) => BedQueueError::NotOnboarded(msg),
            EngineError::UnitUnavailable(unit_id) => BedQueueError::UnitUnavailable(unit_id),
            EngineError::NotFound(what) => BedQueueError::NotFound(what),
        }
    }
}

impl From<db::DbError> for BedQueueError {
    fn from(e: db::DbError) -> Self {
        EngineError::from(e).into()
    }
}

impl From<identity::ProfileError> for BedQueueError {
    fn from(e: identity::ProfileError) -> Self {
        BedQueueError::IdentityUnavailable(e.to_string())
    }
}

impl From<config::ConfigError> for BedQueueError {
    fn from(e: config::ConfigError) -> Self {
        BedQueueError::InvalidInput(e.to_string())
    }
}

impl From<onboarding::FlowError> for BedQueueError {
    fn from(e: onboarding::FlowError) -> Self {
        BedQueueError::InvalidInput(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for BedQueueError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        BedQueueError::StoreUnavailable(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open the record store and local profile with default settings.
#[uniffi::export]
pub fn open_engine(
    database_path: String,
    profile_path: String,
) -> Result<Arc<BedQueueCore>, BedQueueError> {
    let config = EngineConfig::default();
    let db = Database::open_with_timeout(&database_path, config.busy_timeout())?;
    let profile = SqliteProfileStore::open(&profile_path)?;
    BedQueueCore::build(db, profile, &config)
}

/// Open the engine described by a TOML config file.
#[uniffi::export]
pub fn open_engine_with_config(config_path: String) -> Result<Arc<BedQueueCore>, BedQueueError> {
    let config = EngineConfig::load(Path::new(&config_path))?;
    let database_path = config
        .database_path
        .clone()
        .ok_or_else(|| BedQueueError::InvalidInput("database_path is not set".into()))?;
    let profile_path = config
        .profile_path
        .clone()
        .ok_or_else(|| BedQueueError::InvalidInput("profile_path is not set".into()))?;

    let db = Database::open_with_timeout(&database_path, config.busy_timeout())?;
    let profile = SqliteProfileStore::open(&profile_path)?;
    BedQueueCore::build(db, profile, &config)
}

/// Create an in-memory engine (for testing).
#[uniffi::export]
pub fn open_engine_in_memory() -> Result<Arc<BedQueueCore>, BedQueueError> {
    let db = Database::open_in_memory()?;
    let profile = SqliteProfileStore::open_in_memory()?;
    BedQueueCore::build(db, profile, &EngineConfig::default())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe engine wrapper for FFI.
///
/// All store access goes through one mutex-guarded connection, so writes
/// from this process are applied in call order.
#[derive(uniffi::Object)]
pub struct BedQueueCore {
    db: Arc<Mutex<Database>>,
    identity: Mutex<LocalIdentityResolver<SqliteProfileStore>>,
    flow: OnboardingFlow,
    policy: AllocationPolicy,
    sessions: Mutex<HashMap<ClientIdentity, OnboardingSession>>,
}

impl BedQueueCore {
    fn build(
        db: Database,
        profile: SqliteProfileStore,
        config: &EngineConfig,
    ) -> Result<Arc<Self>, BedQueueError> {
        Ok(Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            identity: Mutex::new(LocalIdentityResolver::new(profile)),
            flow: config.flow()?,
            policy: config.allocation,
            sessions: Mutex::new(HashMap::new()),
        }))
    }

    /// Run `f` against the identity's session, resuming it if needed.
    fn with_session<F>(&self, client_uuid: &str, f: F) -> Result<FfiOnboardingView, BedQueueError>
    where
        F: FnOnce(&Onboarding<'_, Database>, &mut OnboardingSession) -> EngineResult<()>,
    {
        let identity = parse_identity(client_uuid)?;
        let db = self.db.lock()?;
        let onboarding = Onboarding::new(&*db, &self.flow);

        let mut sessions = self.sessions.lock()?;
        let session = match sessions.entry(identity) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let resumed = onboarding.resume(entry.key())?;
                entry.insert(resumed)
            }
        };

        f(&onboarding, session)?;
        Ok(FfiOnboardingView::new(&self.flow, session))
    }
}

#[uniffi::export]
impl BedQueueCore {
    // =========================================================================
    // Identity
    // =========================================================================

    /// Identity of this device profile, generated on first call.
    pub fn resolve_identity(&self) -> Result<String, BedQueueError> {
        let resolver = self.identity.lock()?;
        Ok(resolver.resolve()?.into_string())
    }

    // =========================================================================
    // Onboarding
    // =========================================================================

    /// Load (or create) the identity's record and start a fresh session.
    pub fn start_onboarding(&self, client_uuid: String) -> Result<FfiOnboardingView, BedQueueError> {
        let identity = parse_identity(&client_uuid)?;
        let db = self.db.lock()?;
        let session = Onboarding::new(&*db, &self.flow).resume(&identity)?;
        let view = FfiOnboardingView::new(&self.flow, &session);
        self.sessions.lock()?.insert(identity, session);
        Ok(view)
    }

    /// Edit a field of the current stage.
    pub fn edit_field(
        &self,
        client_uuid: String,
        field: String,
        value: String,
    ) -> Result<FfiOnboardingView, BedQueueError> {
        let field: PatientField = field.parse()?;
        self.with_session(&client_uuid, |onboarding, session| {
            onboarding.edit(session, field, &value)
        })
    }

    /// Validate and persist the current stage, then move to the next one.
    pub fn advance_stage(&self, client_uuid: String) -> Result<FfiOnboardingView, BedQueueError> {
        self.with_session(&client_uuid, |onboarding, session| {
            onboarding.advance(session).map(|_| ())
        })
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Open beds, soonest available first.
    pub fn list_open_units(&self) -> Result<Vec<FfiUnit>, BedQueueError> {
        let db = self.db.lock()?;
        let snapshot = UnitCatalog::new(&*db).open_units()?;
        Ok(snapshot.into_iter().map(|u| u.into()).collect())
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Claim a bed for the identity.
    pub fn express_interest(
        &self,
        client_uuid: String,
        unit_id: String,
    ) -> Result<FfiInterest, BedQueueError> {
        let identity = parse_identity(&client_uuid)?;
        let db = self.db.lock()?;
        let allocator = InterestAllocator::new(&*db, &self.flow, self.policy);
        let interest = allocator.express_interest(&identity, &unit_id)?;
        Ok(interest.into())
    }

    /// The identity's waiting or offered interest, if any.
    pub fn active_interest(&self, client_uuid: String) -> Result<Option<FfiInterest>, BedQueueError> {
        let identity = parse_identity(&client_uuid)?;
        let db = self.db.lock()?;
        let allocator = InterestAllocator::new(&*db, &self.flow, self.policy);
        Ok(allocator.active_interest(&identity)?.map(|i| i.into()))
    }
}

fn parse_identity(client_uuid: &str) -> Result<ClientIdentity, BedQueueError> {
    ClientIdentity::from_stored(client_uuid)
        .ok_or_else(|| BedQueueError::InvalidInput("client_uuid is blank".into()))
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe view of an onboarding session.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOnboardingView {
    pub client_uuid: String,
    pub complete: bool,
    pub stage_index: Option<u32>,
    pub stage_name: Option<String>,
    pub stage_count: u32,
    /// Fields of the current stage with their buffered values
    pub fields: Vec<FfiFieldValue>,
}

impl FfiOnboardingView {
    fn new(flow: &OnboardingFlow, session: &OnboardingSession) -> Self {
        let stage = match session.position() {
            Position::Stage(index) => flow.stage(index).map(|stage| (index, stage)),
            Position::Catalog => None,
        };

        Self {
            client_uuid: session.client_uuid().to_string(),
            complete: session.is_complete(),
            stage_index: stage.map(|(index, _)| index as u32),
            stage_name: stage.map(|(_, s)| s.name.clone()),
            stage_count: flow.stages().len() as u32,
            fields: stage
                .map(|(_, s)| {
                    s.fields
                        .iter()
                        .map(|&field| FfiFieldValue {
                            key: field.key().to_string(),
                            label: field.label().to_string(),
                            value: session.value(field).map(str::to_string),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// FFI-safe stage field.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFieldValue {
    pub key: String,
    pub label: String,
    pub value: Option<String>,
}

/// FFI-safe bed.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiUnit {
    pub unit_id: String,
    pub facility_name: String,
    pub suburb: String,
    pub room_type: String,
    /// ISO date (YYYY-MM-DD)
    pub available_from: String,
    pub rad_amount: Option<f64>,
    pub dap_amount: Option<f64>,
}

impl From<UnitRecord> for FfiUnit {
    fn from(unit: UnitRecord) -> Self {
        Self {
            unit_id: unit.unit_id,
            facility_name: unit.facility_name,
            suburb: unit.suburb,
            room_type: unit.room_type,
            available_from: unit.available_from.format("%Y-%m-%d").to_string(),
            rad_amount: unit.rad_amount,
            dap_amount: unit.dap_amount,
        }
    }
}

/// FFI-safe interest.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInterest {
    pub interest_id: String,
    pub client_uuid: String,
    pub unit_id: String,
    pub status: String,
    pub created_at: String,
}

impl From<InterestRecord> for FfiInterest {
    fn from(interest: InterestRecord) -> Self {
        Self {
            interest_id: interest.interest_id,
            client_uuid: interest.client_uuid.into_string(),
            unit_id: interest.unit_id,
            status: format!("{:?}", interest.status),
            created_at: interest.created_at,
        }
    }
}
