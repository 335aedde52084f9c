//! Error types for Valvula.
//!
//! All errors implement `std::error::Error` and provide human-readable
//! messages. Every failure mode of the native bridge is a distinct variant,
//! so callers can decide policy (retry, log, abort) instead of the process
//! aborting inside the bridge.

use std::fmt;
use thiserror::Error;

/// Primary error type for Valvula operations.
///
/// Each variant provides sufficient context for debugging while remaining
/// actionable for programmatic error handling. The `DynamicLink` /
/// `DynamicCall` split matters: the former is a failure to load the
/// Steamworks library or resolve one of its exports, the latter is a failure
/// of the foreign-call dispatch itself, as opposed to anything the native
/// function reported through its return value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Steam is not supported on this platform/architecture.
    ///
    /// This is a normal condition on non-Windows or non-x86_64 targets.
    /// Callers should gate on [`crate::STEAM_SUPPORTED`] rather than probing
    /// for this error.
    #[error("Steamworks is not supported on this platform")]
    NotSupported,

    /// An achievement operation was invoked before `init` succeeded.
    ///
    /// This is a programming error in the caller, not a runtime condition
    /// of the Steam client.
    #[error("Steamworks is not initialized: init must succeed first")]
    NotInitialized,

    /// The shared library or one of its required exports failed to load.
    #[error("dynamic link failed at {step}: {message}")]
    DynamicLink {
        /// The load step or export name that failed.
        step: String,
        /// Underlying OS error text.
        message: String,
    },

    /// The foreign-call dispatch itself failed.
    ///
    /// Distinct from [`Error::BadReturnCode`]: the native function was never
    /// (or not correctly) entered.
    #[error("dynamic call failed in {operation}: {message}")]
    DynamicCall {
        /// The bridged operation being dispatched.
        operation: String,
        /// Underlying dispatch error text.
        message: String,
    },

    /// The native function returned a value outside its documented set.
    #[error("{operation}: bad return code {code}")]
    BadReturnCode {
        /// The bridged operation that observed the code.
        operation: String,
        /// The raw return value, for diagnostics.
        code: i64,
    },

    /// An achievement name could not be marshalled.
    ///
    /// Names are passed to the native library as NUL-terminated C strings,
    /// so an interior NUL byte is rejected before any native interaction
    /// rather than silently truncating the name.
    #[error("invalid achievement name: {reason}")]
    InvalidName {
        /// Description of what was invalid.
        reason: String,
    },
}

/// Result type alias for Valvula operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new `DynamicLink` error.
    #[must_use]
    pub fn dynamic_link(step: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::DynamicLink {
            step: step.into(),
            message: message.to_string(),
        }
    }

    /// Create a new `DynamicCall` error.
    #[must_use]
    pub fn dynamic_call(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::DynamicCall {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Create a new `BadReturnCode` error.
    #[must_use]
    pub fn bad_return_code(operation: impl Into<String>, code: i64) -> Self {
        Self::BadReturnCode {
            operation: operation.into(),
            code,
        }
    }

    /// Create a new `InvalidName` error.
    #[must_use]
    pub fn invalid_name(reason: impl Into<String>) -> Self {
        Self::InvalidName {
            reason: reason.into(),
        }
    }

    /// Check if this error means the platform is unsupported.
    #[must_use]
    pub const fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported)
    }

    /// Check if this error means `init` has not succeeded yet.
    #[must_use]
    pub const fn is_not_initialized(&self) -> bool {
        matches!(self, Self::NotInitialized)
    }

    /// Check if this error came from the dynamic linker or symbol table.
    #[must_use]
    pub const fn is_dynamic_link(&self) -> bool {
        matches!(self, Self::DynamicLink { .. })
    }

    /// Check if this error is an out-of-contract native return value.
    #[must_use]
    pub const fn is_bad_return_code(&self) -> bool {
        matches!(self, Self::BadReturnCode { .. })
    }

    /// Get the raw native return code if this is a `BadReturnCode` error.
    #[must_use]
    pub const fn return_code(&self) -> Option<i64> {
        match self {
            Self::BadReturnCode { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Get the failing operation or load-step name, if the variant has one.
    #[must_use]
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::DynamicLink { step, .. } => Some(step),
            Self::DynamicCall { operation, .. } | Self::BadReturnCode { operation, .. } => {
                Some(operation)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }

    #[test]
    fn test_error_messages_are_readable() {
        let err = Error::NotSupported;
        let msg = err.to_string();
        assert!(msg.contains("not supported"));

        let err = Error::NotInitialized;
        assert!(err.to_string().contains("init"));
    }

    #[test]
    fn test_dynamic_link_includes_step() {
        let err = Error::dynamic_link("SteamAPI_Init", "symbol not found");
        let msg = err.to_string();
        assert!(msg.contains("SteamAPI_Init"));
        assert!(msg.contains("symbol not found"));
    }

    #[test]
    fn test_bad_return_code_includes_code() {
        let err = Error::bad_return_code("IsSteamRunning", 999);
        let msg = err.to_string();
        assert!(msg.contains("IsSteamRunning"));
        assert!(msg.contains("999"));
    }

    #[test]
    fn test_bad_return_code_negative() {
        let err = Error::bad_return_code("RestartAppIfNecessary", -1);
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn test_display_impl_not_generic() {
        let errors = vec![
            Error::NotSupported,
            Error::NotInitialized,
            Error::dynamic_link("LoadLibrary", "not found"),
            Error::dynamic_call("RunCallbacks", "bad dispatch"),
            Error::bad_return_code("Init", 2),
            Error::invalid_name("interior NUL"),
        ];
        for err in errors {
            let msg = err.to_string();
            assert!(msg.len() > 10, "Message too short: {msg}");
            assert!(!msg.eq_ignore_ascii_case("error"), "Generic message: {msg}");
        }
    }

    #[test]
    fn test_error_predicates() {
        assert!(Error::NotSupported.is_not_supported());
        assert!(!Error::NotInitialized.is_not_supported());

        assert!(Error::NotInitialized.is_not_initialized());
        assert!(!Error::NotSupported.is_not_initialized());

        assert!(Error::dynamic_link("step", "msg").is_dynamic_link());
        assert!(!Error::dynamic_call("op", "msg").is_dynamic_link());

        assert!(Error::bad_return_code("op", 7).is_bad_return_code());
        assert!(!Error::NotSupported.is_bad_return_code());
    }

    #[test]
    fn test_return_code_extraction() {
        assert_eq!(Error::bad_return_code("op", 42).return_code(), Some(42));
        assert_eq!(Error::NotSupported.return_code(), None);
        assert_eq!(Error::dynamic_call("op", "msg").return_code(), None);
    }

    #[test]
    fn test_operation_extraction() {
        assert_eq!(
            Error::dynamic_link("SteamAPI_RunCallbacks", "x").operation(),
            Some("SteamAPI_RunCallbacks")
        );
        assert_eq!(
            Error::dynamic_call("GetAchievement", "x").operation(),
            Some("GetAchievement")
        );
        assert_eq!(Error::bad_return_code("Init", 3).operation(), Some("Init"));
        assert_eq!(Error::NotSupported.operation(), None);
        assert_eq!(Error::invalid_name("x").operation(), None);
    }

    #[test]
    fn test_error_equality() {
        let e1 = Error::bad_return_code("Init", 2);
        let e2 = Error::bad_return_code("Init", 2);
        let e3 = Error::bad_return_code("Init", 3);
        assert_eq!(e1, e2);
        assert_ne!(e1, e3);
    }

    #[test]
    fn test_error_clone() {
        let e1 = Error::dynamic_link("LoadLibrary", "os error 126");
        let e2 = e1.clone();
        assert_eq!(e1, e2);
    }

    #[test]
    fn test_error_debug() {
        let err = Error::bad_return_code("IsSteamRunning", 2);
        let debug = format!("{err:?}");
        assert!(debug.contains("BadReturnCode"));
        assert!(debug.contains("IsSteamRunning"));
    }
}
