//! Property-based tests for Valvula.
//!
//! Uses proptest to generate random inputs and verify invariants of the
//! public surface hold for all of them.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use proptest::prelude::*;
use valvula::{Error, SteamBridge};

// Strategy for operation names as they appear in errors
fn operation_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("RestartAppIfNecessary".to_owned()),
        Just("Init".to_owned()),
        Just("IsSteamRunning".to_owned()),
        Just("RunCallbacks".to_owned()),
        Just("GetAchievement".to_owned()),
        Just("SetAchievement".to_owned()),
        Just("ClearAchievement".to_owned()),
        "[A-Za-z_]{1,24}",
    ]
}

proptest! {
    #[test]
    fn prop_bad_return_code_roundtrips_code(
        operation in operation_strategy(),
        code in proptest::num::i64::ANY,
    ) {
        let err = Error::bad_return_code(operation.clone(), code);
        prop_assert_eq!(err.return_code(), Some(code));
        prop_assert_eq!(err.operation(), Some(operation.as_str()));
        prop_assert!(err.to_string().contains(&code.to_string()));
    }

    #[test]
    fn prop_dynamic_errors_name_their_step(
        step in "[A-Za-z_]{1,32}",
        message in "[ -~]{1,48}",
    ) {
        let link = Error::dynamic_link(step.clone(), message.clone());
        prop_assert!(link.is_dynamic_link());
        prop_assert!(link.to_string().contains(&step));

        let call = Error::dynamic_call(step.clone(), message);
        prop_assert!(!call.is_dynamic_link());
        prop_assert_eq!(call.operation(), Some(step.as_str()));
    }

    #[test]
    fn prop_error_display_never_empty(code in proptest::num::i64::ANY) {
        let errors = [
            Error::NotSupported,
            Error::NotInitialized,
            Error::bad_return_code("Init", code),
            Error::invalid_name("interior NUL"),
        ];
        for err in errors {
            prop_assert!(err.to_string().len() > 10);
        }
    }

    #[test]
    fn prop_predicates_are_mutually_exclusive(code in proptest::num::i64::ANY) {
        let err = Error::bad_return_code("Init", code);
        prop_assert!(err.is_bad_return_code());
        prop_assert!(!err.is_not_supported());
        prop_assert!(!err.is_not_initialized());
        prop_assert!(!err.is_dynamic_link());
    }

    // On unsupported targets the whole public surface collapses to
    // NotSupported for any input; make sure no achievement name can change
    // that (including ones that would fail marshalling after init).
    #[cfg(not(all(target_os = "windows", target_arch = "x86_64")))]
    #[test]
    fn prop_unsupported_ignores_achievement_names(name in ".{0,64}") {
        let mut bridge = SteamBridge::new();
        prop_assert_eq!(bridge.get_achievement(&name), Err(Error::NotSupported));
        prop_assert_eq!(bridge.set_achievement(&name), Err(Error::NotSupported));
        prop_assert_eq!(bridge.clear_achievement(&name), Err(Error::NotSupported));
    }

    #[cfg(not(all(target_os = "windows", target_arch = "x86_64")))]
    #[test]
    fn prop_unsupported_ignores_app_ids(app_id in proptest::num::u32::ANY) {
        let mut bridge = SteamBridge::new();
        prop_assert_eq!(
            bridge.restart_app_if_necessary(app_id),
            Err(Error::NotSupported)
        );
    }
}

#[test]
fn test_bridge_never_initialized_without_init() {
    let bridge = SteamBridge::new();
    assert!(!bridge.is_initialized());
    assert_eq!(bridge.user_handle(), None);
    assert_eq!(bridge.pipe_handle(), None);
}
