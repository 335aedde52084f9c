//! FFI Quarantine Zone - All unsafe code isolated here.
//!
//! # Safety Architecture
//!
//! This module contains ALL unsafe code in the valvula crate. The public API
//! in `src/lib.rs` uses `#![deny(unsafe_code)]`, ensuring no unsafe code
//! can leak into the user-facing interface.
//!
//! # Module Structure
//!
//! ```text
//! ffi/
//! ├── mod.rs         # This file - module router + unsupported-platform stub
//! └── steam_api.rs   # steam_api64.dll loader, symbol table, context block
//! ```
//!
//! The real backend exists only for `windows` + `x86_64`, the one target the
//! 64-bit Steamworks library supports. Everywhere else `NativeRuntime` is a
//! stub whose every operation reports [`crate::Error::NotSupported`] without
//! touching anything, so the public surface stays identical across targets.

// Allow unsafe in this module only - quarantine zone
#![allow(unsafe_code)]

#[cfg(all(target_os = "windows", target_arch = "x86_64"))]
pub mod steam_api;

#[cfg(all(target_os = "windows", target_arch = "x86_64"))]
pub use steam_api::NativeRuntime;

#[cfg(not(all(target_os = "windows", target_arch = "x86_64")))]
mod stub {
    //! Stub runtime for platforms without Steamworks support.

    use crate::bridge::{RawCode, RawPtr, SteamRuntime};
    use crate::error::{Error, Result};
    use std::ffi::CStr;

    /// Uniformly-failing runtime; never performs native interaction.
    #[derive(Debug, Default)]
    pub struct NativeRuntime;

    impl NativeRuntime {
        pub fn new() -> Self {
            Self
        }
    }

    impl SteamRuntime for NativeRuntime {
        fn gate(&self) -> Result<()> {
            Err(Error::NotSupported)
        }

        fn ensure_loaded(&mut self) -> Result<()> {
            Err(Error::NotSupported)
        }

        fn restart_app_if_necessary(&mut self, _app_id: u32) -> Result<RawCode> {
            Err(Error::NotSupported)
        }

        fn init(&mut self) -> Result<RawCode> {
            Err(Error::NotSupported)
        }

        fn is_steam_running(&mut self) -> Result<RawCode> {
            Err(Error::NotSupported)
        }

        fn run_callbacks(&mut self) -> Result<()> {
            Err(Error::NotSupported)
        }

        fn h_steam_user(&mut self) -> Result<RawCode> {
            Err(Error::NotSupported)
        }

        fn h_steam_pipe(&mut self) -> Result<RawCode> {
            Err(Error::NotSupported)
        }

        fn client_interface(&mut self) -> Result<RawPtr> {
            Err(Error::NotSupported)
        }

        fn user_stats_interface(
            &mut self,
            _client: RawPtr,
            _user: i32,
            _pipe: i32,
        ) -> Result<RawPtr> {
            Err(Error::NotSupported)
        }

        fn context_init(&mut self) -> Result<RawPtr> {
            Err(Error::NotSupported)
        }

        fn patch_context(
            &mut self,
            _context: RawPtr,
            _client: RawPtr,
            _user_stats: RawPtr,
        ) -> Result<()> {
            Err(Error::NotSupported)
        }

        fn get_achievement(
            &mut self,
            _user_stats: RawPtr,
            _name: &CStr,
        ) -> Result<(RawCode, bool)> {
            Err(Error::NotSupported)
        }

        fn set_achievement(&mut self, _user_stats: RawPtr, _name: &CStr) -> Result<RawCode> {
            Err(Error::NotSupported)
        }

        fn clear_achievement(&mut self, _user_stats: RawPtr, _name: &CStr) -> Result<RawCode> {
            Err(Error::NotSupported)
        }
    }
}

#[cfg(not(all(target_os = "windows", target_arch = "x86_64")))]
pub use stub::NativeRuntime;
