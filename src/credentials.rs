//! API key lookup — environment variable first, then the OS keychain.
//!
//! Absence means "not configured"; engines turn that into
//! `OcrError::MissingCredential` before any network call.

use crate::engine::EngineKind;
use crate::error::OcrError;
use std::collections::HashMap;

/// Keychain service name under which keys are stored.
pub const KEYCHAIN_SERVICE: &str = "textsnap";

/// Source of per-engine secrets.
pub trait CredentialStore: Send + Sync {
    fn secret(&self, engine: EngineKind) -> Option<String>;
}

/// Environment variables, falling back to the OS keychain.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCredentialStore;

impl SystemCredentialStore {
    pub fn new() -> Self {
        Self
    }

    /// Save a key to the OS keychain.
    pub fn save_secret(&self, engine: EngineKind, secret: &str) -> Result<(), OcrError> {
        let entry = keyring::Entry::new(KEYCHAIN_SERVICE, engine.id())?;
        entry.set_password(secret)?;
        log::info!("[SETTINGS] API key saved for engine: {}", engine.id());
        Ok(())
    }

    /// Remove a key from the OS keychain. Missing entries are not an error.
    pub fn delete_secret(&self, engine: EngineKind) -> Result<(), OcrError> {
        let entry = keyring::Entry::new(KEYCHAIN_SERVICE, engine.id())?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CredentialStore for SystemCredentialStore {
    fn secret(&self, engine: EngineKind) -> Option<String> {
        let env_key = engine.env_key()?;

        if let Ok(key) = std::env::var(env_key) {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }

        let entry = keyring::Entry::new(KEYCHAIN_SERVICE, engine.id()).ok()?;
        match entry.get_password() {
            Ok(key) if !key.trim().is_empty() => {
                log::info!("[SETTINGS] Loaded {} key from OS keychain", engine.id());
                Some(key)
            }
            _ => None,
        }
    }
}

/// Fixed in-memory secrets.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    secrets: HashMap<EngineKind, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, engine: EngineKind, secret: impl Into<String>) -> Self {
        self.secrets.insert(engine, secret.into());
        self
    }
}

impl CredentialStore for StaticCredentials {
    fn secret(&self, engine: EngineKind) -> Option<String> {
        self.secrets
            .get(&engine)
            .filter(|s| !s.trim().is_empty())
            .cloned()
    }
}

/// Fetch a required API key or fail with a configuration error.
pub(crate) fn require_secret(
    store: &dyn CredentialStore,
    engine: EngineKind,
) -> Result<String, OcrError> {
    store.secret(engine).ok_or_else(|| {
        log::warn!("[LLM] No API key for {} — not attempting request", engine);
        OcrError::MissingCredential(engine)
    })
}
