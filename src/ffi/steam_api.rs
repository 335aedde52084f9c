//! `steam_api64.dll` loader, symbol table, and callback context plumbing.
//!
//! # Safety
//!
//! This module uses `unsafe` for dynamic loading and raw calls into the
//! closed-source Steamworks library. Every unsafe block carries a SAFETY
//! comment. Nothing here is sound off the single thread that drives the
//! bridge; `SteamBridge` enforces that with `!Send + !Sync`.
//!
//! # ABI notes
//!
//! The flat (`SteamAPI_*`) exports use the C calling convention. Several of
//! them return a C `bool`, but the full return register is read here on
//! purpose: `SteamAPI_RestartAppIfNecessary` has been observed leaving a
//! specific garbage value in the high bits, and the bridge's return-code
//! policy wants to see it rather than have the cast hide it.

#![allow(unsafe_code)]

use crate::bridge::{RawCode, RawPtr, SteamRuntime};
use crate::error::{Error, Result};
use libloading::Library;
use std::cell::UnsafeCell;
use std::ffi::CStr;
use std::mem;
use std::os::raw::c_char;
use tracing::debug;

/// Resolved from the default OS library search path, like the SDK expects.
const STEAM_API_DLL: &str = "steam_api64.dll";

// Interface version strings, with the trailing NUL the native side reads.
// These pin an ABI: bumping them is a contract change against the installed
// Steam client, not a refactor.
const STEAM_CLIENT_INTERFACE_VERSION: &[u8] = b"SteamClient017\0";
const STEAM_USER_STATS_INTERFACE_VERSION: &[u8] = b"STEAMUSERSTATS_INTERFACE_VERSION011\0";

/// The true size of the native callback-counter-and-context block is not
/// published; 512 bytes is well past any observed layout, plus two leading
/// slots (dispatch entry point, then native bookkeeping).
const CONTEXT_RESERVED_BYTES: usize = 512;
const CONTEXT_SLOTS: usize = 2 + CONTEXT_RESERVED_BYTES / mem::size_of::<usize>();

/// Pinned block handed to `SteamInternal_ContextInit`.
///
/// Slot 0 holds the dispatch entry point; the native library writes into the
/// rest and retains the address for the process lifetime, so this lives in a
/// static that is never moved or freed.
#[repr(C)]
struct ContextBlock(UnsafeCell<[usize; CONTEXT_SLOTS]>);

// SAFETY: the block is only written from the single thread that drives the
// bridge (slot 0, once, before the native side ever sees the address); the
// native library reads it from that same thread during RunCallbacks.
unsafe impl Sync for ContextBlock {}

static CONTEXT_BLOCK: ContextBlock = ContextBlock(UnsafeCell::new([0; CONTEXT_SLOTS]));

/// Entry point installed in slot 0 of the context block.
///
/// The native library invokes this from inside its own call stack while
/// initializing per-callback context. It must stay inert: calling back into
/// Rust logic or allocating from here is not sound across this boundary.
extern "C" fn context_dispatch_stub(_context: usize) {}

/// Leading fields of the `CSteamAPIContext` the native library returns.
///
/// The full layout is versioned with the Steamworks SDK and mostly
/// irrelevant here; only `steam_client` and `steam_user_stats` are ever
/// written. The other fields exist so those two offsets are correct for the
/// SDK 1.46-era layout the pinned interface versions correspond to.
#[repr(C)]
#[allow(dead_code)]
struct SteamApiContext {
    steam_client: RawPtr,
    steam_user: RawPtr,
    steam_friends: RawPtr,
    steam_utils: RawPtr,
    steam_matchmaking: RawPtr,
    steam_game_search: RawPtr,
    steam_user_stats: RawPtr,
    steam_apps: RawPtr,
    steam_matchmaking_servers: RawPtr,
    steam_networking: RawPtr,
    steam_remote_storage: RawPtr,
    steam_screenshots: RawPtr,
    steam_http: RawPtr,
    controller: RawPtr,
    steam_ugc: RawPtr,
    steam_app_list: RawPtr,
    steam_music: RawPtr,
    steam_music_remote: RawPtr,
    steam_html_surface: RawPtr,
    steam_inventory: RawPtr,
    steam_video: RawPtr,
    steam_tv: RawPtr,
    steam_parental_settings: RawPtr,
    steam_input: RawPtr,
}

/// Every export the bridge needs, resolved eagerly at load time.
///
/// A missing export therefore fails the load step with the symbol's name
/// instead of surfacing later as a wild call through a null address.
struct Symbols {
    restart_app_if_necessary: unsafe extern "C" fn(u32) -> usize,
    init: unsafe extern "C" fn() -> usize,
    is_steam_running: unsafe extern "C" fn() -> usize,
    run_callbacks: unsafe extern "C" fn(),
    get_h_steam_user: unsafe extern "C" fn() -> usize,
    get_h_steam_pipe: unsafe extern "C" fn() -> usize,
    create_interface: unsafe extern "C" fn(*const c_char) -> usize,
    get_i_steam_user_stats: unsafe extern "C" fn(usize, i32, i32, *const c_char) -> usize,
    context_init: unsafe extern "C" fn(*const usize) -> usize,
    user_stats_get_achievement: unsafe extern "C" fn(usize, *const c_char, *mut bool) -> usize,
    user_stats_set_achievement: unsafe extern "C" fn(usize, *const c_char) -> usize,
    user_stats_clear_achievement: unsafe extern "C" fn(usize, *const c_char) -> usize,
}

impl Symbols {
    fn resolve(library: &Library) -> Result<Self> {
        // SAFETY (applies to each lookup): the requested symbols are
        // C-linkage exports of steam_api64.dll with the declared signatures;
        // the copied-out fn pointers stay valid because `LoadedApi` keeps the
        // library mapped for the life of the process.
        unsafe {
            Ok(Self {
                restart_app_if_necessary: resolve(library, "SteamAPI_RestartAppIfNecessary")?,
                init: resolve(library, "SteamAPI_Init")?,
                is_steam_running: resolve(library, "SteamAPI_IsSteamRunning")?,
                run_callbacks: resolve(library, "SteamAPI_RunCallbacks")?,
                get_h_steam_user: resolve(library, "SteamAPI_GetHSteamUser")?,
                get_h_steam_pipe: resolve(library, "SteamAPI_GetHSteamPipe")?,
                create_interface: resolve(library, "SteamInternal_CreateInterface")?,
                get_i_steam_user_stats: resolve(
                    library,
                    "SteamAPI_ISteamClient_GetISteamUserStats",
                )?,
                context_init: resolve(library, "SteamInternal_ContextInit")?,
                user_stats_get_achievement: resolve(
                    library,
                    "SteamAPI_ISteamUserStats_GetAchievement",
                )?,
                user_stats_set_achievement: resolve(
                    library,
                    "SteamAPI_ISteamUserStats_SetAchievement",
                )?,
                user_stats_clear_achievement: resolve(
                    library,
                    "SteamAPI_ISteamUserStats_ClearAchievement",
                )?,
            })
        }
    }
}

/// Look up one export and copy out its address as a typed fn pointer.
///
/// # Safety
///
/// `T` must be the fn-pointer type matching the export's real signature, and
/// the returned pointer must not outlive the `Library`.
unsafe fn resolve<T: Copy>(library: &Library, name: &'static str) -> Result<T> {
    let symbol = library
        .get::<T>(name.as_bytes())
        .map_err(|e| Error::dynamic_link(name, e))?;
    Ok(*symbol)
}

/// The loaded library plus its resolved symbol table.
struct LoadedApi {
    symbols: Symbols,
    // Keeps the DLL mapped; the fn pointers above are only valid while this
    // handle is alive, and it is never dropped once created.
    _library: Library,
}

impl LoadedApi {
    fn load() -> Result<Self> {
        // SAFETY: loading steam_api64.dll runs its DllMain; the library is a
        // plain C SDK whose initialization has no preconditions beyond being
        // on a thread that can call LoadLibrary.
        let library = unsafe { Library::new(STEAM_API_DLL) }
            .map_err(|e| Error::dynamic_link("LoadLibrary", e))?;
        let symbols = Symbols::resolve(&library)?;
        debug!(library = STEAM_API_DLL, "Steamworks library loaded, all exports resolved");
        Ok(Self {
            symbols,
            _library: library,
        })
    }
}

/// [`SteamRuntime`] over the real `steam_api64.dll`.
///
/// Loading is deferred to the first `ensure_loaded` and never repeated; the
/// library stays mapped for the process lifetime.
pub struct NativeRuntime {
    api: Option<LoadedApi>,
}

impl NativeRuntime {
    pub fn new() -> Self {
        Self { api: None }
    }

    fn api(&self) -> Result<&LoadedApi> {
        self.api
            .as_ref()
            .ok_or_else(|| Error::dynamic_call("SteamApi", "library not loaded"))
    }
}

impl Default for NativeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Widen a raw register value for the bridge's return-code policy.
#[allow(clippy::cast_possible_wrap)]
const fn as_code(ret: usize) -> RawCode {
    ret as RawCode
}

impl SteamRuntime for NativeRuntime {
    fn gate(&self) -> Result<()> {
        Ok(())
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        if self.api.is_none() {
            self.api = Some(LoadedApi::load()?);
        }
        Ok(())
    }

    fn restart_app_if_necessary(&mut self, app_id: u32) -> Result<RawCode> {
        let api = self.api()?;
        // SAFETY: resolved export, one u32 argument by value.
        let ret = unsafe { (api.symbols.restart_app_if_necessary)(app_id) };
        Ok(as_code(ret))
    }

    fn init(&mut self) -> Result<RawCode> {
        let api = self.api()?;
        // SAFETY: resolved export, no arguments.
        let ret = unsafe { (api.symbols.init)() };
        Ok(as_code(ret))
    }

    fn is_steam_running(&mut self) -> Result<RawCode> {
        let api = self.api()?;
        // SAFETY: resolved export, no arguments.
        let ret = unsafe { (api.symbols.is_steam_running)() };
        Ok(as_code(ret))
    }

    fn run_callbacks(&mut self) -> Result<()> {
        let api = self.api()?;
        // SAFETY: resolved export, no arguments, void return. May re-enter
        // `context_dispatch_stub` synchronously; the stub does nothing.
        unsafe { (api.symbols.run_callbacks)() };
        Ok(())
    }

    fn h_steam_user(&mut self) -> Result<RawCode> {
        let api = self.api()?;
        // SAFETY: resolved export, no arguments.
        let ret = unsafe { (api.symbols.get_h_steam_user)() };
        Ok(as_code(ret))
    }

    fn h_steam_pipe(&mut self) -> Result<RawCode> {
        let api = self.api()?;
        // SAFETY: resolved export, no arguments.
        let ret = unsafe { (api.symbols.get_h_steam_pipe)() };
        Ok(as_code(ret))
    }

    fn client_interface(&mut self) -> Result<RawPtr> {
        let api = self.api()?;
        // SAFETY: the version string is a static NUL-terminated literal.
        let ret =
            unsafe { (api.symbols.create_interface)(STEAM_CLIENT_INTERFACE_VERSION.as_ptr().cast()) };
        Ok(ret)
    }

    fn user_stats_interface(&mut self, client: RawPtr, user: i32, pipe: i32) -> Result<RawPtr> {
        let api = self.api()?;
        // SAFETY: `client` is the non-null interface address the native
        // library just returned; the version string is NUL-terminated.
        let ret = unsafe {
            (api.symbols.get_i_steam_user_stats)(
                client,
                user,
                pipe,
                STEAM_USER_STATS_INTERFACE_VERSION.as_ptr().cast(),
            )
        };
        Ok(ret)
    }

    fn context_init(&mut self) -> Result<RawPtr> {
        let api = self.api()?;
        let entry: extern "C" fn(usize) = context_dispatch_stub;
        // SAFETY: the static block outlives the process; slot 0 receives the
        // dispatch entry point before the native side ever sees the address.
        let block = unsafe {
            let slots = CONTEXT_BLOCK.0.get();
            (*slots)[0] = entry as usize;
            slots.cast::<usize>()
        };
        // SAFETY: SteamInternal_ContextInit takes the address of a
        // callback-counter-and-context block it may retain and dereference
        // on later RunCallbacks calls; the block is pinned in a static.
        let ret = unsafe { (api.symbols.context_init)(block) };
        Ok(ret)
    }

    fn patch_context(
        &mut self,
        context: RawPtr,
        client: RawPtr,
        user_stats: RawPtr,
    ) -> Result<()> {
        let ctx = context as *mut SteamApiContext;
        // SAFETY: `context` is the non-zero address SteamInternal_ContextInit
        // just returned; its leading fields follow the layout above, and the
        // native library expects the host to fill these two in.
        unsafe {
            (*ctx).steam_client = client;
            (*ctx).steam_user_stats = user_stats;
        }
        Ok(())
    }

    fn get_achievement(&mut self, user_stats: RawPtr, name: &CStr) -> Result<(RawCode, bool)> {
        let api = self.api()?;
        let mut achieved = false;
        // SAFETY: `user_stats` is the interface address cached at init;
        // `name` is NUL-terminated; the native side writes exactly one byte
        // through the out-pointer.
        let ret = unsafe {
            (api.symbols.user_stats_get_achievement)(user_stats, name.as_ptr(), &mut achieved)
        };
        Ok((as_code(ret), achieved))
    }

    fn set_achievement(&mut self, user_stats: RawPtr, name: &CStr) -> Result<RawCode> {
        let api = self.api()?;
        // SAFETY: as for get_achievement, minus the out-parameter.
        let ret = unsafe { (api.symbols.user_stats_set_achievement)(user_stats, name.as_ptr()) };
        Ok(as_code(ret))
    }

    fn clear_achievement(&mut self, user_stats: RawPtr, name: &CStr) -> Result<RawCode> {
        let api = self.api()?;
        // SAFETY: as for set_achievement.
        let ret = unsafe { (api.symbols.user_stats_clear_achievement)(user_stats, name.as_ptr()) };
        Ok(as_code(ret))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_versions_are_nul_terminated_once() {
        for version in [
            STEAM_CLIENT_INTERFACE_VERSION,
            STEAM_USER_STATS_INTERFACE_VERSION,
        ] {
            assert_eq!(version.iter().filter(|b| **b == 0).count(), 1);
            assert_eq!(version.last(), Some(&0));
        }
    }

    #[test]
    fn test_context_block_is_oversized() {
        // Two leading slots plus at least 512 reserved bytes.
        assert_eq!(CONTEXT_SLOTS, 2 + 512 / mem::size_of::<usize>());
        assert!(mem::size_of::<[usize; CONTEXT_SLOTS]>() >= 512);
    }

    #[test]
    fn test_context_struct_layout() {
        // 24 pointer-sized fields; user-stats is the seventh.
        assert_eq!(
            mem::size_of::<SteamApiContext>(),
            24 * mem::size_of::<RawPtr>()
        );
        let probe = SteamApiContext {
            steam_client: 0,
            steam_user: 0,
            steam_friends: 0,
            steam_utils: 0,
            steam_matchmaking: 0,
            steam_game_search: 0,
            steam_user_stats: 0,
            steam_apps: 0,
            steam_matchmaking_servers: 0,
            steam_networking: 0,
            steam_remote_storage: 0,
            steam_screenshots: 0,
            steam_http: 0,
            controller: 0,
            steam_ugc: 0,
            steam_app_list: 0,
            steam_music: 0,
            steam_music_remote: 0,
            steam_html_surface: 0,
            steam_inventory: 0,
            steam_video: 0,
            steam_tv: 0,
            steam_parental_settings: 0,
            steam_input: 0,
        };
        let base = std::ptr::addr_of!(probe).cast::<u8>() as usize;
        let client = std::ptr::addr_of!(probe.steam_client) as usize;
        let stats = std::ptr::addr_of!(probe.steam_user_stats) as usize;
        assert_eq!(client - base, 0);
        assert_eq!(stats - base, 6 * mem::size_of::<RawPtr>());
    }

    #[test]
    fn test_dispatch_stub_is_inert() {
        // Must be callable with any value and do nothing.
        context_dispatch_stub(0);
        context_dispatch_stub(usize::MAX);
    }

    #[test]
    fn test_as_code_widens_register_values() {
        assert_eq!(as_code(0), 0);
        assert_eq!(as_code(1), 1);
        assert_eq!(as_code(1_163_264), 1_163_264);
    }

    #[test]
    fn test_runtime_not_loaded_is_dispatch_error() {
        let mut runtime = NativeRuntime::new();
        let err = runtime.init().unwrap_err();
        assert!(matches!(err, Error::DynamicCall { .. }));
    }
}
