//! Import and export of the envelope as a user-visible file.
use chrono::NaiveDate;
use serde_json::Value;
use std::fmt;

use crate::constants::{CURRENT_VERSION, EXPORT_FILE_PREFIX};
use crate::error::ValidationError;
use crate::model::{Envelope, RoomData, TrackerState};
use crate::store::checked_day;

/// Non-fatal notes about an accepted import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportWarning {
    /// File was written by a newer build; unknown fields were ignored.
    NewerVersion { found: u64, supported: u32 },
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewerVersion { found, supported } => write!(
                f,
                "file version {found} is newer than supported version {supported}; unrecognized fields were ignored"
            ),
        }
    }
}

/// A validated import, ready for [`crate::store::RoomStore::replace_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPayload {
    pub version: u64,
    pub room_data: RoomData,
    pub current_day: u32,
    pub warning: Option<ImportWarning>,
}

/// Validate an import file's text.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the text is not JSON, is not an object,
/// lacks `version`, `roomData` or `currentDay`, has a non-object `roomData`
/// or cells that do not decode, or has a `currentDay` below 1.
pub fn parse_import(text: &str) -> Result<ImportPayload, ValidationError> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| ValidationError::ImportJson(err.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(ValidationError::NotAnObject);
    };

    let version = fields
        .get("version")
        .ok_or(ValidationError::MissingField("version"))?
        .as_u64()
        .ok_or_else(|| ValidationError::MalformedField {
            field: "version",
            reason: "expected a non-negative integer".to_string(),
        })?;

    let current_day = match fields.get("currentDay") {
        None => return Err(ValidationError::MissingField("currentDay")),
        Some(day) => day
            .as_i64()
            .ok_or_else(|| ValidationError::MalformedField {
                field: "currentDay",
                reason: "expected an integer".to_string(),
            })
            .and_then(checked_day)?,
    };

    let room_data = match fields.remove("roomData") {
        None => return Err(ValidationError::MissingField("roomData")),
        Some(cells @ Value::Object(_)) => {
            serde_json::from_value::<RoomData>(cells).map_err(|err| {
                ValidationError::MalformedField {
                    field: "roomData",
                    reason: err.to_string(),
                }
            })?
        }
        Some(_) => {
            return Err(ValidationError::MalformedField {
                field: "roomData",
                reason: "expected an object".to_string(),
            });
        }
    };

    let warning = (version > u64::from(CURRENT_VERSION)).then(|| {
        log::warn!(
            "importing file with version {version}, newer than supported {CURRENT_VERSION}"
        );
        ImportWarning::NewerVersion {
            found: version,
            supported: CURRENT_VERSION,
        }
    });

    Ok(ImportPayload {
        version,
        room_data,
        current_day,
        warning,
    })
}

/// Pretty-printed envelope of `state`, empty cells omitted.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn export_json(state: &TrackerState) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&Envelope::wrap(state))
}

/// File name offered for an export made on `date`.
#[must_use]
pub fn export_file_name(date: NaiveDate) -> String {
    format!("{EXPORT_FILE_PREFIX}-{}.json", date.format("%Y-%m-%d"))
}
