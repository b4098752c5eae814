//! JavaScript-facing tracker handle.
//!
//! The presentation layer owns one [`RoomTracker`] and calls into it for every
//! read and mutation. Debounced saves are driven by a browser timer that is
//! re-armed whenever a mutation pushes the save deadline out.
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::NaiveDate;
use roomtrack_core::{
    LoadPhase, RoomCatalog, SortPreference, Tracker, TrackerError, ValidationError,
    export_file_name,
};
use serde::Serialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url};

use crate::dom;
use crate::storage::LocalStorageBackend;

/// JS `Error` whose `name` is the tracker error class, so callers can branch
/// on `err.name === "ValidationError"` and friends.
fn to_js_error(err: &TrackerError) -> JsValue {
    let error = js_sys::Error::new(&err.to_string());
    error.set_name(err.class());
    error.into()
}

fn to_js_value<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(Into::into)
}

fn today() -> NaiveDate {
    let now = js_sys::Date::new_0();
    i32::try_from(now.get_full_year())
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, now.get_month() + 1, now.get_date()))
        .unwrap_or_default()
}

#[wasm_bindgen]
pub struct RoomTracker {
    inner: Rc<RefCell<Tracker<LocalStorageBackend>>>,
    timer: Rc<Cell<Option<i32>>>,
}

#[wasm_bindgen]
impl RoomTracker {
    /// Bind to the page's `localStorage`. Call [`RoomTracker::load`] before
    /// anything else.
    ///
    /// # Errors
    /// Returns an error if `localStorage` is unavailable.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<Self, JsValue> {
        let backend = LocalStorageBackend::open().map_err(|err| {
            let error = js_sys::Error::new(&err.to_string());
            error.set_name("PersistenceError");
            JsValue::from(error)
        })?;
        Ok(Self {
            inner: Rc::new(RefCell::new(Tracker::new(backend))),
            timer: Rc::new(Cell::new(None)),
        })
    }

    /// Read and migrate stored data. Resolves to `true` when older data was
    /// upgraded.
    ///
    /// # Errors
    /// Throws `ParseError` for undecodable storage, or `PersistenceError` when
    /// the upgraded data could not be written back.
    pub fn load(&self) -> Result<bool, JsValue> {
        let result = self.inner.borrow_mut().load().map_err(|err| to_js_error(&err));
        self.sync_timer();
        result
    }

    /// # Errors
    /// Same as [`RoomTracker::load`].
    #[wasm_bindgen(js_name = retryLoad)]
    pub fn retry_load(&self) -> Result<bool, JsValue> {
        let result = self
            .inner
            .borrow_mut()
            .retry_load()
            .map_err(|err| to_js_error(&err));
        self.sync_timer();
        result
    }

    /// Delete all tracker data and start over.
    ///
    /// # Errors
    /// Throws `PersistenceError` if the fresh state cannot be written.
    #[wasm_bindgen(js_name = resetStorage)]
    pub fn reset_storage(&self) -> Result<(), JsValue> {
        let result = self
            .inner
            .borrow_mut()
            .reset_storage()
            .map_err(|err| to_js_error(&err));
        self.sync_timer();
        result
    }

    /// `"unloaded"`, `"ready"` or `"failed"`.
    #[must_use]
    pub fn phase(&self) -> String {
        match self.inner.borrow().phase() {
            LoadPhase::Unloaded => "unloaded",
            LoadPhase::Ready => "ready",
            LoadPhase::Failed(_) => "failed",
        }
        .to_string()
    }

    #[wasm_bindgen(js_name = loadError)]
    #[must_use]
    pub fn load_error(&self) -> Option<String> {
        match self.inner.borrow().phase() {
            LoadPhase::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    /// Snapshot of `{ roomData, currentDay }` as plain JS objects.
    ///
    /// # Errors
    /// Returns an error if the state cannot be converted.
    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_js_value(self.inner.borrow().state())
    }

    #[wasm_bindgen(js_name = currentDay)]
    #[must_use]
    pub fn current_day(&self) -> u32 {
        self.inner.borrow().state().current_day
    }

    /// # Errors
    /// Throws `ValidationError` for rejected input or `NotLoaded` before load.
    #[wasm_bindgen(js_name = upsertDay)]
    pub fn upsert_day(
        &self,
        cell_id: &str,
        day: u32,
        offered: Vec<String>,
        selected: Option<String>,
        letter: Option<String>,
    ) -> Result<bool, JsValue> {
        let changed = self
            .inner
            .borrow_mut()
            .upsert_day(
                cell_id,
                day,
                &offered,
                selected.as_deref(),
                letter.as_deref(),
                dom::now_ms(),
            )
            .map_err(|err| to_js_error(&err))?;
        self.sync_timer();
        Ok(changed)
    }

    /// # Errors
    /// Throws `NotLoaded` before load.
    #[wasm_bindgen(js_name = deleteDay)]
    pub fn delete_day(&self, cell_id: &str, day: u32) -> Result<bool, JsValue> {
        let changed = self
            .inner
            .borrow_mut()
            .delete_day(cell_id, day, dom::now_ms())
            .map_err(|err| to_js_error(&err))?;
        self.sync_timer();
        Ok(changed)
    }

    /// # Errors
    /// Throws `ValidationError` for a fixed cell or invalid letter.
    #[wasm_bindgen(js_name = setLetter)]
    pub fn set_letter(&self, cell_id: &str, letter: Option<String>) -> Result<bool, JsValue> {
        let changed = self
            .inner
            .borrow_mut()
            .set_letter(cell_id, letter.as_deref(), dom::now_ms())
            .map_err(|err| to_js_error(&err))?;
        self.sync_timer();
        Ok(changed)
    }

    /// # Errors
    /// Throws `ValidationError` when `day` is 0.
    #[wasm_bindgen(js_name = setCurrentDay)]
    pub fn set_current_day(&self, day: u32) -> Result<bool, JsValue> {
        let changed = self
            .inner
            .borrow_mut()
            .set_current_day(day, dom::now_ms())
            .map_err(|err| to_js_error(&err))?;
        self.sync_timer();
        Ok(changed)
    }

    /// Wipe recorded data and save immediately.
    ///
    /// # Errors
    /// Throws `PersistenceError` if the save fails; memory is cleared anyway.
    #[wasm_bindgen(js_name = clearAll)]
    pub fn clear_all(&self) -> Result<(), JsValue> {
        let result = self
            .inner
            .borrow_mut()
            .clear_all()
            .map_err(|err| to_js_error(&err));
        self.sync_timer();
        result
    }

    /// Replace all data with an exported file's text. Returns a warning
    /// message when the file came from a newer version.
    ///
    /// # Errors
    /// Throws `ValidationError` for a malformed file (nothing changes), or
    /// `PersistenceError` if the imported data could not be saved.
    #[wasm_bindgen(js_name = importJson)]
    pub fn import_json(&self, text: &str) -> Result<Option<String>, JsValue> {
        let result = self
            .inner
            .borrow_mut()
            .import_json(text)
            .map(|warning| warning.map(|warning| warning.to_string()))
            .map_err(|err| to_js_error(&err));
        self.sync_timer();
        result
    }

    /// # Errors
    /// Throws if the state cannot be serialized.
    #[wasm_bindgen(js_name = exportJson)]
    pub fn export_json(&self) -> Result<String, JsValue> {
        self.inner
            .borrow()
            .export_json()
            .map_err(|err| to_js_error(&err))
    }

    #[wasm_bindgen(js_name = exportFileName)]
    #[must_use]
    pub fn export_file_name(&self) -> String {
        export_file_name(today())
    }

    /// Offer the export to the user as a file download. Returns the file name.
    ///
    /// # Errors
    /// Returns an error if the DOM objects needed for the download cannot be created.
    #[wasm_bindgen(js_name = downloadExport)]
    pub fn download_export(&self) -> Result<String, JsValue> {
        let json = self.export_json()?;
        let file_name = self.export_file_name();
        let document = dom::document().ok_or_else(|| JsValue::from_str("document unavailable"))?;

        let options = BlobPropertyBag::new();
        options.set_type("application/json");
        let parts = js_sys::Array::of1(&JsValue::from_str(&json));
        let blob = Blob::new_with_str_sequence_and_options(&parts, &options)?;
        let url = Url::create_object_url_with_blob(&blob)?;

        let anchor = document
            .create_element("a")?
            .dyn_into::<HtmlAnchorElement>()
            .map_err(|_| JsValue::from_str("failed to create download link"))?;
        anchor.set_href(&url);
        anchor.set_download(&file_name);
        anchor.click();
        Url::revoke_object_url(&url)?;
        log::info!("exported tracker data as {file_name}");
        Ok(file_name)
    }

    /// Offer frequencies for a cell, or `null` when nothing was recorded.
    ///
    /// # Errors
    /// Returns an error if the result cannot be converted.
    pub fn frequencies(&self, cell_id: &str) -> Result<JsValue, JsValue> {
        to_js_value(&self.inner.borrow().frequencies(cell_id))
    }

    /// Pick frequencies for a cell, or `null` when nothing was recorded.
    ///
    /// # Errors
    /// Returns an error if the result cannot be converted.
    pub fn selections(&self, cell_id: &str) -> Result<JsValue, JsValue> {
        to_js_value(&self.inner.borrow().selections(cell_id))
    }

    /// # Errors
    /// Throws `ValidationError` for an unrecognized cell id.
    #[wasm_bindgen(js_name = roomNames)]
    pub fn room_names(&self, cell_id: &str) -> Result<Vec<String>, JsValue> {
        self.inner
            .borrow()
            .room_names(cell_id)
            .map(|names| names.into_iter().map(str::to_string).collect())
            .map_err(|err| to_js_error(&err))
    }

    /// Palette key for a room name, or `undefined` for unknown rooms.
    #[wasm_bindgen(js_name = roomColor)]
    #[must_use]
    pub fn room_color(&self, name: &str) -> Option<String> {
        RoomCatalog::default_catalog()
            .color_of(name)
            .map(|color| color.key().to_string())
    }

    #[wasm_bindgen(js_name = sortPreference)]
    #[must_use]
    pub fn sort_preference(&self) -> String {
        match self.inner.borrow().sort_preference() {
            SortPreference::Predefined => "predefined",
            SortPreference::Alphabetical => "alphabetical",
        }
        .to_string()
    }

    /// # Errors
    /// Throws `ValidationError` for an unknown preference name, or
    /// `PersistenceError` if it cannot be saved.
    #[wasm_bindgen(js_name = setSortPreference)]
    pub fn set_sort_preference(&self, sort: &str) -> Result<(), JsValue> {
        let Some(sort) = SortPreference::from_legacy(sort) else {
            let err = TrackerError::from(ValidationError::MalformedField {
                field: "sort",
                reason: format!("unknown sort preference `{sort}`"),
            });
            return Err(to_js_error(&err));
        };
        self.inner
            .borrow_mut()
            .set_sort_preference(sort)
            .map_err(|err| to_js_error(&err))
    }

    /// Write any pending or failed save now, e.g. from a `pagehide` handler.
    ///
    /// # Errors
    /// Throws `PersistenceError` if the write fails.
    pub fn flush(&self) -> Result<bool, JsValue> {
        let result = self
            .inner
            .borrow_mut()
            .flush()
            .map_err(|err| to_js_error(&TrackerError::from(err)));
        self.sync_timer();
        result
    }

    /// No save pending and the last write succeeded.
    #[wasm_bindgen(js_name = isSettled)]
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.inner.borrow().is_settled()
    }
}

impl RoomTracker {
    fn cancel_timer(&self) {
        if let Some(handle) = self.timer.take() {
            dom::clear_timeout(handle);
        }
    }

    /// Point the browser timer at the tracker's current save deadline, or
    /// stop it when nothing is pending.
    fn sync_timer(&self) {
        self.cancel_timer();
        let Some(deadline) = self.inner.borrow().save_deadline() else {
            return;
        };
        let delay = i32::try_from(deadline.saturating_sub(dom::now_ms())).unwrap_or(i32::MAX);
        let inner = Rc::clone(&self.inner);
        let timer = Rc::clone(&self.timer);
        let scheduled = dom::set_timeout(
            move || {
                timer.set(None);
                // Every request re-arms this timer, so firing means the window passed.
                if let Err(err) = inner.borrow_mut().flush() {
                    dom::console_error(&format!("debounced save failed: {err}"));
                }
            },
            delay,
        );
        match scheduled {
            Ok(handle) => self.timer.set(Some(handle)),
            Err(err) => log::warn!(
                "could not schedule save, it will happen on the next flush: {}",
                dom::js_error_message(&err)
            ),
        }
    }
}
