#![forbid(unsafe_code)]
//! Browser front door for the room tracker: a `localStorage` backend and the
//! [`RoomTracker`] handle exported to JavaScript.
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod bridge;
pub mod dom;
pub mod logging;
pub mod storage;

pub use bridge::RoomTracker;
pub use storage::{LocalStorageBackend, WebStorageError, is_quota_error_name};

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    logging::init(log::LevelFilter::Info);
}
