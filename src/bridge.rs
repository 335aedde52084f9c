//! The Steamworks bridge: lifecycle, marshalling, and return-code policy.
//!
//! [`SteamBridge`] owns everything the Go-era globals used to hold: the
//! loaded-library handle, the session identifiers, the cached interface
//! pointers, and the initialization flag. The raw native surface sits behind
//! the crate-internal [`SteamRuntime`] trait, so the bridge logic can be
//! exercised against a scripted runtime without a Steam client installed.
//!
//! # Return-code policy
//!
//! Every bridged export reports through a raw register value. The bridge
//! accepts exactly the documented set per operation ({0, 1}, plus one
//! anomalous `RestartAppIfNecessary` value observed in the wild) and turns
//! anything else into [`Error::BadReturnCode`] rather than guessing.
//!
//! # Thread contract
//!
//! The native library requires all calls to come from the thread that ran
//! [`SteamBridge::init`]. `SteamBridge` is `!Send` and `!Sync` to make that
//! discipline a compile-time property; create it on the thread that will
//! drive it and poll [`SteamBridge::run_callbacks`] from there.

use crate::error::{Error, Result};
use crate::ffi::NativeRuntime;
use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use tracing::{debug, instrument, warn};

/// Raw native return value, widened so out-of-contract codes survive intact.
pub(crate) type RawCode = i64;

/// Opaque native interface address.
pub(crate) type RawPtr = usize;

/// `SteamAPI_RestartAppIfNecessary` has been seen returning this value where
/// the contract says "false". Carried over as a documented quirk of the
/// native library, not something this bridge can fix.
const RESTART_ANOMALOUS_CODE: RawCode = 1_163_264;

/// Crate-internal seam over the raw native surface.
///
/// One implementation drives `steam_api64.dll` (see `ffi::steam_api`); a stub
/// reports `NotSupported` everywhere else; tests script their own. Methods
/// return raw codes/addresses untouched: interpretation is the bridge's job.
/// An `Err` from any method is a dispatch failure, never a native verdict.
pub(crate) trait SteamRuntime {
    /// Capability gate: `Ok` only where the native library can be driven.
    fn gate(&self) -> Result<()>;

    /// Load the shared library and resolve every export. Idempotent.
    fn ensure_loaded(&mut self) -> Result<()>;

    fn restart_app_if_necessary(&mut self, app_id: u32) -> Result<RawCode>;
    fn init(&mut self) -> Result<RawCode>;
    fn is_steam_running(&mut self) -> Result<RawCode>;
    fn run_callbacks(&mut self) -> Result<()>;

    /// `SteamAPI_GetHSteamUser`.
    fn h_steam_user(&mut self) -> Result<RawCode>;
    /// `SteamAPI_GetHSteamPipe`.
    fn h_steam_pipe(&mut self) -> Result<RawCode>;
    /// `SteamInternal_CreateInterface` with the pinned client version string.
    fn client_interface(&mut self) -> Result<RawPtr>;
    /// `SteamAPI_ISteamClient_GetISteamUserStats`.
    fn user_stats_interface(&mut self, client: RawPtr, user: i32, pipe: i32) -> Result<RawPtr>;
    /// Install the dispatch stub in the context block and run
    /// `SteamInternal_ContextInit`; returns the native context address.
    fn context_init(&mut self) -> Result<RawPtr>;
    /// Write the cached interface pointers into the native context struct.
    fn patch_context(&mut self, context: RawPtr, client: RawPtr, user_stats: RawPtr)
        -> Result<()>;

    fn get_achievement(&mut self, user_stats: RawPtr, name: &CStr) -> Result<(RawCode, bool)>;
    fn set_achievement(&mut self, user_stats: RawPtr, name: &CStr) -> Result<RawCode>;
    fn clear_achievement(&mut self, user_stats: RawPtr, name: &CStr) -> Result<RawCode>;
}

/// Everything the native library hands back during a successful `init`.
///
/// Cached for the life of the bridge; every achievement call reuses the
/// user-stats interface pointer captured here.
#[derive(Debug, Clone, Copy)]
struct Session {
    user: i32,
    pipe: i32,
    user_stats: RawPtr,
}

/// Outcome of a `get_achievement` call.
///
/// The native lookup reports two separate facts: whether the lookup itself
/// worked (unknown names make it fail), and whether the achievement is
/// unlocked. Both are surfaced instead of collapsing them into one bool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AchievementQuery {
    /// The native lookup succeeded (raw code 1).
    pub succeeded: bool,
    /// Value the native side wrote through the out-parameter.
    pub achieved: bool,
}

impl AchievementQuery {
    /// True only when the lookup worked and the achievement is unlocked.
    #[must_use]
    pub const fn is_unlocked(&self) -> bool {
        self.succeeded && self.achieved
    }
}

/// Safe handle over the native Steamworks runtime.
///
/// Construction never touches the native library; the first operation that
/// needs it triggers loading, and [`SteamBridge::init`] performs the one-time
/// context setup. See the crate docs for the full lifecycle.
pub struct SteamBridge {
    runtime: Box<dyn SteamRuntime>,
    session: Option<Session>,
    // The native library demands a single consistent calling thread.
    _not_send_sync: PhantomData<*const ()>,
}

impl SteamBridge {
    /// Create a bridge over the real native runtime for this platform.
    ///
    /// On unsupported targets the bridge still constructs; every operation
    /// then returns [`Error::NotSupported`]. Gate on
    /// [`crate::STEAM_SUPPORTED`] before relying on any of them.
    #[must_use]
    pub fn new() -> Self {
        Self::with_runtime(Box::new(NativeRuntime::new()))
    }

    pub(crate) fn with_runtime(runtime: Box<dyn SteamRuntime>) -> Self {
        Self {
            runtime,
            session: None,
            _not_send_sync: PhantomData,
        }
    }

    /// Ask Steam whether the process must relaunch through the client.
    ///
    /// Returns `true` when the caller should exit and let Steam restart the
    /// app with the given id. A `steam_appid.txt` next to the executable
    /// makes the native side report `false` (development mode).
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`], [`Error::DynamicLink`] if loading fails,
    /// [`Error::DynamicCall`] on dispatch failure, or
    /// [`Error::BadReturnCode`] for an out-of-contract native value.
    #[instrument(level = "debug", skip(self))]
    pub fn restart_app_if_necessary(&mut self, app_id: u32) -> Result<bool> {
        self.runtime.gate()?;
        self.runtime.ensure_loaded()?;
        let code = self.runtime.restart_app_if_necessary(app_id)?;
        interpret_restart(code)
    }

    /// Initialize the Steamworks session. Idempotent.
    ///
    /// Returns `Ok(true)` once the session is established and `Ok(false)`
    /// when the native library declines (Steam not running, no logged-in
    /// user). On failure nothing is cached and a later retry re-runs the
    /// whole sequence.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`], [`Error::DynamicLink`],
    /// [`Error::DynamicCall`], or [`Error::BadReturnCode`] from any step of
    /// the context setup.
    #[instrument(level = "debug", skip(self))]
    pub fn init(&mut self) -> Result<bool> {
        self.runtime.gate()?;
        if self.session.is_some() {
            return Ok(true);
        }
        self.runtime.ensure_loaded()?;
        let code = self.runtime.init()?;
        if code == 0 {
            debug!("SteamAPI_Init declined; Steam client is likely not running");
            return Ok(false);
        }
        if code != 1 {
            return Err(Error::bad_return_code("Init", code));
        }
        let session = self.establish_session()?;
        debug!(
            user = session.user,
            pipe = session.pipe,
            "Steamworks session established"
        );
        self.session = Some(session);
        Ok(true)
    }

    /// The one-time context setup that follows a successful `SteamAPI_Init`.
    ///
    /// Order matters: session handles, client interface, user-stats
    /// interface, then the callback-dispatch context. Each step's result is
    /// validated before the next runs.
    fn establish_session(&mut self) -> Result<Session> {
        let user = interpret_handle("GetHSteamUser", self.runtime.h_steam_user()?)?;
        let pipe = interpret_handle("GetHSteamPipe", self.runtime.h_steam_pipe()?)?;
        let client = interpret_pointer("CreateInterface", self.runtime.client_interface()?)?;
        let user_stats = interpret_pointer(
            "GetISteamUserStats",
            self.runtime.user_stats_interface(client, user, pipe)?,
        )?;
        let context = interpret_pointer("ContextInit", self.runtime.context_init()?)?;
        self.runtime.patch_context(context, client, user_stats)?;
        Ok(Session {
            user,
            pipe,
            user_stats,
        })
    }

    /// Whether the Steam client process is running.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`], [`Error::DynamicLink`],
    /// [`Error::DynamicCall`], or [`Error::BadReturnCode`].
    #[instrument(level = "debug", skip(self))]
    pub fn is_steam_running(&mut self) -> Result<bool> {
        self.runtime.gate()?;
        self.runtime.ensure_loaded()?;
        let code = self.runtime.is_steam_running()?;
        interpret_flag("IsSteamRunning", code)
    }

    /// Let the native library drain its internal event queue.
    ///
    /// Call this periodically (once per frame is typical) from the thread
    /// that drives the bridge. The native side may re-enter its installed
    /// dispatch stub during this call; the stub is inert by design.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`], [`Error::DynamicLink`], or
    /// [`Error::DynamicCall`]. The native return value is void.
    #[instrument(level = "trace", skip(self))]
    pub fn run_callbacks(&mut self) -> Result<()> {
        self.runtime.gate()?;
        self.runtime.ensure_loaded()?;
        self.runtime.run_callbacks()
    }

    /// Query an achievement's stored state.
    ///
    /// Requires a successful [`SteamBridge::init`] first.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`], [`Error::NotInitialized`],
    /// [`Error::InvalidName`] for names with interior NUL bytes,
    /// [`Error::DynamicCall`], or [`Error::BadReturnCode`].
    #[instrument(level = "debug", skip(self))]
    pub fn get_achievement(&mut self, name: &str) -> Result<AchievementQuery> {
        self.runtime.gate()?;
        let user_stats = self.user_stats()?;
        let name = marshal_name(name)?;
        let (code, achieved) = self.runtime.get_achievement(user_stats, &name)?;
        let succeeded = interpret_flag("GetAchievement", code)?;
        Ok(AchievementQuery {
            succeeded,
            achieved,
        })
    }

    /// Unlock an achievement. Returns whether the native side accepted it.
    ///
    /// The unlock is not pushed to Steam's servers until the native library
    /// gets a chance to flush, so keep polling [`SteamBridge::run_callbacks`].
    ///
    /// # Errors
    ///
    /// Same set as [`SteamBridge::get_achievement`].
    #[instrument(level = "debug", skip(self))]
    pub fn set_achievement(&mut self, name: &str) -> Result<bool> {
        self.runtime.gate()?;
        let user_stats = self.user_stats()?;
        let name = marshal_name(name)?;
        let code = self.runtime.set_achievement(user_stats, &name)?;
        interpret_flag("SetAchievement", code)
    }

    /// Relock an achievement. Returns whether the native side accepted it.
    ///
    /// # Errors
    ///
    /// Same set as [`SteamBridge::get_achievement`].
    #[instrument(level = "debug", skip(self))]
    pub fn clear_achievement(&mut self, name: &str) -> Result<bool> {
        self.runtime.gate()?;
        let user_stats = self.user_stats()?;
        let name = marshal_name(name)?;
        let code = self.runtime.clear_achievement(user_stats, &name)?;
        interpret_flag("ClearAchievement", code)
    }

    /// Whether a session has been established.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Session user handle, once initialized.
    #[must_use]
    pub fn user_handle(&self) -> Option<i32> {
        self.session.map(|s| s.user)
    }

    /// Session pipe handle, once initialized.
    #[must_use]
    pub fn pipe_handle(&self) -> Option<i32> {
        self.session.map(|s| s.pipe)
    }

    fn user_stats(&self) -> Result<RawPtr> {
        self.session
            .map(|s| s.user_stats)
            .ok_or(Error::NotInitialized)
    }
}

impl Default for SteamBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SteamBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SteamBridge")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

/// Map a {0, 1} native verdict to bool; anything else is out of contract.
fn interpret_flag(operation: &str, code: RawCode) -> Result<bool> {
    match code {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(Error::bad_return_code(operation, code)),
    }
}

/// `RestartAppIfNecessary` verdict, with the anomalous-code carve-out.
fn interpret_restart(code: RawCode) -> Result<bool> {
    match code {
        0 => Ok(false),
        1 => Ok(true),
        RESTART_ANOMALOUS_CODE => {
            warn!(code, "RestartAppIfNecessary returned its known anomalous code; treating as false");
            Ok(false)
        }
        _ => Err(Error::bad_return_code("RestartAppIfNecessary", code)),
    }
}

/// Session handles must be positive and fit the native 32-bit handle type.
fn interpret_handle(operation: &str, code: RawCode) -> Result<i32> {
    if code <= 0 {
        return Err(Error::bad_return_code(operation, code));
    }
    i32::try_from(code).map_err(|_| Error::bad_return_code(operation, code))
}

/// Interface/context addresses must be non-null.
fn interpret_pointer(operation: &str, ptr: RawPtr) -> Result<RawPtr> {
    if ptr == 0 {
        return Err(Error::bad_return_code(operation, 0));
    }
    Ok(ptr)
}

/// Marshal an achievement name into the NUL-terminated form the native side
/// expects. Interior NUL bytes are rejected, never truncated.
fn marshal_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|e| {
        Error::invalid_name(format!(
            "interior NUL byte at offset {}",
            e.nul_position()
        ))
    })
}
