use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Storage, Window};

/// Retrieve the global `window` object, if running in a browser.
#[must_use]
pub fn window() -> Option<Window> {
    web_sys::window()
}

/// Retrieve the document object for DOM interactions.
#[must_use]
pub fn document() -> Option<Document> {
    window().and_then(|win| win.document())
}

/// Convert a JavaScript value into a readable string for error reporting.
#[must_use]
pub fn js_error_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|err| err.message().into())
        })
        .or_else(|| {
            value
                .dyn_ref::<web_sys::DomException>()
                .map(|err| err.message())
        })
        .unwrap_or_else(|| format!("{value:?}"))
}

/// Log an error message to the browser console.
pub fn console_error(message: &str) {
    web_sys::console::error_1(&JsValue::from(message));
}

/// Milliseconds since the Unix epoch according to the browser clock.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn now_ms() -> u64 {
    js_sys::Date::now().max(0.0) as u64
}

/// Access the browser `localStorage` handle.
///
/// # Errors
/// Returns an error if the browser window cannot be accessed or `localStorage` is unavailable.
pub fn local_storage() -> Result<Storage, JsValue> {
    window()
        .ok_or_else(|| JsValue::from_str("window unavailable"))?
        .local_storage()?
        .ok_or_else(|| JsValue::from_str("localStorage unavailable"))
}

/// Run `callback` once after `delay_ms`. Returns the timer handle.
///
/// # Errors
/// Returns an error if no window is available or the timer cannot be scheduled.
pub fn set_timeout(callback: impl FnOnce() + 'static, delay_ms: i32) -> Result<i32, JsValue> {
    let win = window().ok_or_else(|| JsValue::from_str("window unavailable"))?;
    let closure = Closure::once_into_js(callback);
    win.set_timeout_with_callback_and_timeout_and_arguments_0(closure.unchecked_ref(), delay_ms)
}

/// Cancel a timer returned by [`set_timeout`]; unknown handles are ignored.
pub fn clear_timeout(handle: i32) {
    if let Some(win) = window() {
        win.clear_timeout_with_handle(handle);
    }
}
