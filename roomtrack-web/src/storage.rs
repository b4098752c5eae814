//! `localStorage`-backed implementation of the core storage seam.
use roomtrack_core::StorageBackend;
use thiserror::Error;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use web_sys::Storage;

use crate::dom;

/// DOM exception names browsers use when a write exceeds the storage quota.
const QUOTA_ERROR_NAMES: &[&str] = &["QuotaExceededError", "NS_ERROR_DOM_QUOTA_REACHED"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WebStorageError {
    #[error("localStorage unavailable: {0}")]
    Unavailable(String),
    #[error("{name}: {message}")]
    Dom { name: String, message: String },
    #[error("storage error: {0}")]
    Other(String),
}

impl WebStorageError {
    /// Classify a value thrown by the `Storage` API.
    #[must_use]
    pub fn from_js(value: &JsValue) -> Self {
        value.dyn_ref::<web_sys::DomException>().map_or_else(
            || Self::Other(dom::js_error_message(value)),
            |err| Self::Dom {
                name: err.name(),
                message: err.message(),
            },
        )
    }
}

/// Whether a DOM exception name signals an exhausted quota.
#[must_use]
pub fn is_quota_error_name(name: &str) -> bool {
    QUOTA_ERROR_NAMES.contains(&name)
}

pub struct LocalStorageBackend {
    storage: Storage,
}

impl LocalStorageBackend {
    #[must_use]
    pub const fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Open the page's `localStorage`.
    ///
    /// # Errors
    /// Returns [`WebStorageError::Unavailable`] when storage is disabled or absent.
    pub fn open() -> Result<Self, WebStorageError> {
        dom::local_storage()
            .map(Self::new)
            .map_err(|err| WebStorageError::Unavailable(dom::js_error_message(&err)))
    }
}

impl std::fmt::Debug for LocalStorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStorageBackend").finish_non_exhaustive()
    }
}

impl StorageBackend for LocalStorageBackend {
    type Error = WebStorageError;

    fn get_item(&self, key: &str) -> Result<Option<String>, Self::Error> {
        self.storage
            .get_item(key)
            .map_err(|err| WebStorageError::from_js(&err))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.storage
            .set_item(key, value)
            .map_err(|err| WebStorageError::from_js(&err))
    }

    fn remove_item(&self, key: &str) -> Result<(), Self::Error> {
        self.storage
            .remove_item(key)
            .map_err(|err| WebStorageError::from_js(&err))
    }

    fn is_quota_exceeded(error: &Self::Error) -> bool {
        matches!(error, WebStorageError::Dom { name, .. } if is_quota_error_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_names_are_recognized() {
        assert!(is_quota_error_name("QuotaExceededError"));
        assert!(is_quota_error_name("NS_ERROR_DOM_QUOTA_REACHED"));
        assert!(!is_quota_error_name("SecurityError"));
    }

    #[test]
    fn only_dom_quota_errors_count_as_quota() {
        let quota = WebStorageError::Dom {
            name: "QuotaExceededError".into(),
            message: "full".into(),
        };
        let security = WebStorageError::Dom {
            name: "SecurityError".into(),
            message: "denied".into(),
        };
        assert!(LocalStorageBackend::is_quota_exceeded(&quota));
        assert!(!LocalStorageBackend::is_quota_exceeded(&security));
        assert!(!LocalStorageBackend::is_quota_exceeded(&WebStorageError::Other(
            "QuotaExceededError".into()
        )));
        assert_eq!(quota.to_string(), "QuotaExceededError: full");
    }
}
