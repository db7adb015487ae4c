//! SQLite-vec extension loader.
//!
//! Keeps the crate's only `unsafe` block in one place.

use std::sync::Once;

use rusqlite::ffi::{sqlite3, sqlite3_api_routines, sqlite3_auto_extension};
use sqlite_vec::sqlite3_vec_init;

type SqliteExtensionFn =
    unsafe extern "C" fn(*mut sqlite3, *mut *mut i8, *const sqlite3_api_routines) -> i32;

static REGISTER: Once = Once::new();

/// Register sqlite-vec as an auto-loaded extension for every new connection.
///
/// Must run before the vector index opens its connection. Repeated calls
/// are no-ops.
#[allow(unsafe_code)]
pub fn init_sqlite_vec_extension() {
    REGISTER.call_once(|| {
        // SAFETY: sqlite3_auto_extension only records the entry point, and
        // sqlite3_vec_init has the signature SQLite expects of an extension.
        unsafe {
            sqlite3_auto_extension(Some(std::mem::transmute::<*const (), SqliteExtensionFn>(
                sqlite3_vec_init as *const (),
            )));
        }
    });
}
