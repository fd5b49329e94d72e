//! Client identity resolution.
//!
//! The engine only depends on [`IdentityProvider`]. The shipped provider,
//! [`LocalIdentityResolver`], keeps the token in a local [`ProfileStore`] and
//! generates it on first use.

mod profile;

pub use profile::*;

use crate::error::{EngineError, EngineResult};
use crate::models::ClientIdentity;

/// Profile key holding the identity token.
pub const CLIENT_UUID_KEY: &str = "client_uuid";

/// Something that can name the current caller.
pub trait IdentityProvider {
    /// Return the caller's identity. The same profile always yields the
    /// same token.
    fn resolve(&self) -> EngineResult<ClientIdentity>;
}

/// Local, non-volatile key-value storage for one client profile.
pub trait ProfileStore {
    fn get(&self, key: &str) -> ProfileResult<Option<String>>;

    /// Store `value` unless the key is already set. Returns whichever value
    /// is stored afterwards.
    fn put_if_absent(&self, key: &str, value: &str) -> ProfileResult<String>;
}

/// Identity provider backed by a local profile store.
pub struct LocalIdentityResolver<P: ProfileStore> {
    profile: P,
}

impl<P: ProfileStore> LocalIdentityResolver<P> {
    pub fn new(profile: P) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &P {
        &self.profile
    }
}

impl<P: ProfileStore> IdentityProvider for LocalIdentityResolver<P> {
    fn resolve(&self) -> EngineResult<ClientIdentity> {
        let stored = self
            .profile
            .get(CLIENT_UUID_KEY)
            .map_err(|e| EngineError::IdentityUnavailable(e.to_string()))?;

        if let Some(value) = stored {
            let identity = ClientIdentity::from_stored(value).ok_or_else(|| {
                EngineError::IdentityUnavailable(format!("Stored {} is blank", CLIENT_UUID_KEY))
            })?;
            tracing::debug!(client_uuid = %identity, "Loaded client identity");
            return Ok(identity);
        }

        let candidate = ClientIdentity::generate();
        let stored = self
            .profile
            .put_if_absent(CLIENT_UUID_KEY, candidate.as_str())
            .map_err(|e| EngineError::IdentityUnavailable(e.to_string()))?;

        let identity = ClientIdentity::from_stored(stored).ok_or_else(|| {
            EngineError::IdentityUnavailable(format!("Stored {} is blank", CLIENT_UUID_KEY))
        })?;
        if identity == candidate {
            tracing::info!(client_uuid = %identity, "Generated new client identity");
        } else {
            tracing::debug!(client_uuid = %identity, "Adopted identity stored concurrently");
        }
        Ok(identity)
    }
}
