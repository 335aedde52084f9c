//! Valvula: Safe Rust Bridge to the Native Steamworks Runtime
//!
//! Valvula exposes a small, safe surface over `steam_api64.dll`: the process
//! restart check, initialization, running-state detection, callback pumping,
//! and achievement get/set/clear. The actual logic lives in Valve's
//! closed-source library; this crate owns the dynamic-linking and
//! calling-convention boundary and nothing else.
//!
//! # Design Philosophy
//!
//! - **Zero unsafe in public API**: All FFI quarantined in internal modules
//! - **Typed outcomes**: every native failure mode is a distinct [`Error`]
//!   variant returned to the caller, never a process abort
//! - **No emulation**: on unsupported targets every operation reports
//!   [`Error::NotSupported`] instead of pretending a Steam client exists
//!
//! # Platform Support
//!
//! | Target | `STEAM_SUPPORTED` | Behavior |
//! |--------|-------------------|----------|
//! | Windows x86_64 | `true` | Drives `steam_api64.dll` from the OS search path |
//! | Everything else | `false` | Every operation returns `NotSupported` |
//!
//! # Quick Start
//!
//! ```no_run
//! use valvula::SteamBridge;
//!
//! let mut steam = SteamBridge::new();
//! if valvula::is_steam_supported() && steam.init()? {
//!     if steam.set_achievement("COMPLETE_LEVEL")? {
//!         println!("achievement unlocked");
//!     }
//!     // Give the native library a chance to flush and fire callbacks.
//!     steam.run_callbacks()?;
//! }
//! # Ok::<(), valvula::Error>(())
//! ```
//!
//! # Lifecycle
//!
//! [`SteamBridge::new`] never touches the native library. The first operation
//! that needs it loads `steam_api64.dll` and resolves every export eagerly; a
//! successful [`SteamBridge::init`] then performs the one-time context setup
//! (session handles, interface pointers, callback-dispatch block) and caches
//! the results for the life of the bridge. `init` is idempotent, and any
//! failure along the way leaves the bridge uninitialized so a later retry
//! re-runs the whole sequence.
//!
//! # Thread Safety
//!
//! The Steamworks library requires all calls to come from one consistent
//! thread, the one that ran `init`. [`SteamBridge`] is therefore `!Send`
//! and `!Sync`; funnel all Steam work through a single dedicated thread and
//! poll [`SteamBridge::run_callbacks`] from it (once per frame is typical).
//!
//! # Error Handling
//!
//! All operations that can fail return [`Result<T, Error>`]. The original
//! design this bridge descends from aborted on every native anomaly; here
//! the caller decides whether to retry, log, or bail.
//!
//! # Development Mode
//!
//! With a `steam_appid.txt` next to the executable, the native library runs
//! in testing mode: [`SteamBridge::restart_app_if_necessary`] reports
//! `false` and no relaunch through the Steam client happens. The bridge
//! neither creates nor reads that file.

// SAFETY: This crate denies unsafe code at the library level.
// All unsafe FFI code is quarantined in src/ffi/, which is not exported.
// We use deny (not forbid) so it can be overridden in the ffi module.
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)] // Allow Steamworks, DllMain, etc. without backticks

pub mod bridge;
pub mod error;

// FFI module is internal only - not exported
mod ffi;

// Re-export main types for convenience
pub use bridge::{AchievementQuery, SteamBridge};
pub use error::{Error, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// True only on the one target the 64-bit Steamworks library supports.
///
/// Check this before relying on any bridge operation; on other targets the
/// operations exist but uniformly fail with [`Error::NotSupported`].
pub const STEAM_SUPPORTED: bool = cfg!(all(target_os = "windows", target_arch = "x86_64"));

/// Check if the native Steamworks runtime can be driven on this target.
#[must_use]
pub const fn is_steam_supported() -> bool {
    STEAM_SUPPORTED
}
