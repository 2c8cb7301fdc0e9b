mod common;

use std::{
    panic::{self, AssertUnwindSafe},
    thread,
};

use log::Level;
use xtrap::{
    diagnostics::codes::{ErrorConstant, BAD_ALLOC, BAD_MATCH, BAD_VALUE, BAD_WINDOW},
    Error, RecordingDisplay, SyncMode, TrapConfig, TrapStack, XError,
};

use common::{capture_logs, logged, stack, stack_with};

#[test]
fn depth_returns_to_zero_after_nested_failures() {
    let display = RecordingDisplay::new();
    let stack = stack(&display);

    stack.enter();
    stack.enter();
    stack.enter();
    display.fail(BAD_WINDOW);
    assert_eq!(stack.depth(), 3);

    assert!(stack.exit(false).is_err());
    assert!(stack.exit(false).is_ok());
    assert!(stack.exit(true).is_ok());

    assert_eq!(stack.depth(), 0);
    assert_eq!(display.open_traps(), 0);
    assert!(stack.assert_idle());
}

#[test]
fn only_outermost_synced_exits_flush() {
    let display = RecordingDisplay::new();
    let stack = stack(&display);

    for need_sync in [true, false, true] {
        stack.enter();
        stack.enter();
        stack.exit(true).unwrap();
        stack.enter();
        stack.exit(true).unwrap();
        stack.exit(need_sync).unwrap();
    }

    assert_eq!(display.flushes(), 2);
    assert_eq!((display.pushes(), display.pops()), (9, 9));
}

#[test]
fn call_unsynced_reports_bad_alloc() {
    let display = RecordingDisplay::new();
    let stack = stack(&display);

    let err = stack
        .call_unsynced(|| {
            display.request("CreatePixmap 16384x16384");
            display.fail(BAD_ALLOC);
            Ok::<_, XError>(())
        })
        .unwrap_err();

    assert_eq!(err.name(), "BadAlloc");
    assert_eq!(err.code(), 11);
    assert_eq!(err.to_string(), "XError: BadAlloc");
    assert_eq!(display.flushes(), 0);
}

#[test]
fn names_follow_the_binding_constants() {
    const TABLE: &[ErrorConstant] = &[(0, "Success"), (9, "BadAlloc")];
    let display = RecordingDisplay::new().with_constants(TABLE);
    let stack = stack(&display);

    let err = stack
        .call_unsynced(|| {
            display.fail(9);
            Ok::<_, XError>(())
        })
        .unwrap_err();

    assert_eq!(err.name(), "BadAlloc");
}

#[test]
fn unknown_codes_use_the_binding_text_or_the_number() {
    let display = RecordingDisplay::new().with_error_text(160, "GLXBadContext");
    let stack = stack(&display);

    assert_eq!(stack.error_name(160), "GLXBadContext");
    assert_eq!(stack.error_name(161), "161");
    assert_eq!(stack.error_name(BAD_VALUE), "BadValue");
}

#[test]
fn nested_unsynced_calls_share_one_flush() {
    let display = RecordingDisplay::new();
    let stack = stack(&display);

    let result = stack.call_synced(|| {
        let inner = stack.call_unsynced(|| {
            stack.call_unsynced(|| {
                display.request("ConfigureWindow 0x400001");
                display.fail_in_transit(BAD_WINDOW);
                Ok::<_, XError>(())
            })?;
            assert_eq!(display.flushes(), 0, "depth 2 exit must not flush");
            Ok::<_, XError>(())
        });
        assert_eq!(display.flushes(), 0, "depth 1 exit must not flush");
        inner
    });

    assert_eq!(display.flushes(), 1);
    assert_eq!(result.unwrap_err().name(), "BadWindow");
    assert_eq!(display.in_transit(), 0);
    assert_eq!(stack.depth(), 0);
}

#[test]
fn innermost_error_is_reported_once() {
    let display = RecordingDisplay::new();
    let stack = stack(&display);

    let result = stack.call_synced(|| {
        stack.call_unsynced(|| {
            stack.call_unsynced(|| {
                display.fail(BAD_MATCH);
                Ok::<_, XError>(())
            })
        })
    });

    assert_eq!(result.unwrap_err().code(), BAD_MATCH);
    assert_eq!(display.flushes(), 1);
    assert_eq!((display.pushes(), display.pops()), (3, 3));
}

#[test]
fn unsynced_nesting_never_flushes() {
    let display = RecordingDisplay::new();
    let stack = stack(&display);

    let result = stack.call_unsynced(|| stack.call_unsynced(|| stack.call_unsynced(|| Ok::<_, XError>(7))));

    assert_eq!(result, Ok(7));
    assert_eq!(display.flushes(), 0);
}

#[test]
fn program_errors_win_over_x_errors() {
    let display = RecordingDisplay::new();
    let stack = stack(&display);

    let err = stack
        .call_synced(|| {
            display.fail(BAD_WINDOW);
            Err::<(), _>(Error::LibraryUnavailable("test".into()))
        })
        .unwrap_err();

    assert!(matches!(err, Error::LibraryUnavailable(_)));
    assert_eq!(display.pops(), 1);
    assert_eq!(stack.depth(), 0);
    assert!(logged(Level::Debug)
        .iter()
        .any(|m| m.contains("XError: BadWindow") && m.contains("leaving X11 region early")));
}

#[test]
fn panics_still_release_the_trap_once() {
    let display = RecordingDisplay::new();
    let stack = stack(&display);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        stack.call_unsynced(|| -> Result<(), XError> {
            display.fail(BAD_WINDOW);
            panic!("window vanished");
        })
    }));

    assert!(outcome.is_err());
    assert_eq!(stack.depth(), 0);
    assert_eq!((display.pushes(), display.pops()), (1, 1));
    assert_eq!(display.open_traps(), 0);
}

#[test]
fn swallow_reports_success() {
    let display = RecordingDisplay::new();
    let stack = stack(&display);

    assert_eq!(stack.swallow_synced(|| Ok::<_, XError>(())), Ok(true));
    assert_eq!(display.flushes(), 1);
    assert!(logged(Level::Error).is_empty());
}

#[test]
fn swallow_turns_x_errors_into_false() {
    let display = RecordingDisplay::new();
    let stack = stack(&display);

    let swallowed = stack.swallow_unsynced(|| {
        display.fail(BAD_WINDOW);
        Ok::<_, Error>(())
    });
    assert!(matches!(swallowed, Ok(false)));

    // an X error returned by nested work counts as well
    let swallowed = stack.swallow_unsynced(|| {
        stack.call_unsynced(|| {
            display.fail(BAD_VALUE);
            Ok::<_, Error>(())
        })
    });
    assert!(matches!(swallowed, Ok(false)));
    assert!(logged(Level::Error).is_empty());
}

#[test]
fn swallow_lets_program_errors_through() {
    let display = RecordingDisplay::new();
    let stack = stack(&display);

    let result = stack.swallow_unsynced(|| {
        display.fail(BAD_WINDOW);
        Err::<(), _>(Error::NoDisplay(":99".into()))
    });

    assert!(matches!(result, Err(Error::NoDisplay(_))));
    assert_eq!(display.open_traps(), 0);
}

#[test]
fn default_mode_follows_synchronize() {
    let display = RecordingDisplay::new();
    let relaxed = stack(&display);
    relaxed.call(|| Ok::<_, XError>(())).unwrap();
    relaxed.swallow(|| Ok::<_, XError>(())).unwrap();
    assert_eq!(display.flushes(), 0);

    let config = TrapConfig {
        synchronize: true,
        ..TrapConfig::default()
    };
    let synchronized = stack_with(&display, config);
    synchronized.call(|| Ok::<_, XError>(())).unwrap();
    synchronized.swallow(|| Ok::<_, XError>(())).unwrap();
    assert_eq!(display.flushes(), 2);
}

#[test]
fn call_with_honours_the_mode() {
    let display = RecordingDisplay::new();
    let stack = stack(&display);

    stack.call_with(SyncMode::Synced, || Ok::<_, XError>(())).unwrap();
    stack.call_with(SyncMode::Unsynced, || Ok::<_, XError>(())).unwrap();
    assert_eq!(display.flushes(), 1);
}

#[test]
fn assert_idle_logs_open_traps() {
    let display = RecordingDisplay::new();
    let stack = stack(&display);

    stack.enter();
    stack.enter();
    assert!(!stack.assert_idle());

    let errors = logged(Level::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("depth 2"));

    stack.exit(true).unwrap();
    stack.exit(true).unwrap();
}

#[test]
fn unmatched_exit_is_logged_and_ignored() {
    let display = RecordingDisplay::new();
    let stack = stack(&display);

    assert_eq!(stack.exit(true), Ok(()));
    assert_eq!(stack.depth(), 0);
    assert_eq!(display.pops(), 0);
    assert!(logged(Level::Error)[0].contains("without a matching enter"));
}

#[test]
fn verify_managed_wants_an_open_trap() {
    let display = RecordingDisplay::new();
    let stack = stack(&display);

    assert!(!stack.verify_managed(Some("setting _NET_WM_STATE")));
    let errors = logged(Level::Error);
    assert_eq!(errors[0], "Error: unmanaged X11 context");
    assert_eq!(errors[1], " setting _NET_WM_STATE");

    capture_logs();
    let managed = stack.call_unsynced(|| Ok::<_, XError>(stack.verify_managed(None)));
    assert_eq!(managed, Ok(true));
    assert!(logged(Level::Error).is_empty());
}

#[test]
fn foreign_threads_are_reported() {
    let stack = TrapStack::with_config(RecordingDisplay::new(), TrapConfig::default());

    let errors = thread::spawn(move || {
        capture_logs();
        stack.enter();
        stack.exit(false).unwrap();
        logged(Level::Error)
    })
    .join()
    .unwrap();

    assert!(errors[0].starts_with("Error: invalid access from thread"));
}

#[test]
fn thread_check_can_be_disabled() {
    let config = TrapConfig {
        verify_thread: false,
        ..TrapConfig::default()
    };
    let stack = TrapStack::with_config(RecordingDisplay::new(), config);

    let errors = thread::spawn(move || {
        capture_logs();
        stack.call_unsynced(|| Ok::<_, XError>(())).unwrap();
        logged(Level::Error)
    })
    .join()
    .unwrap();

    assert!(errors.is_empty());
}

#[test]
fn log_sync_traces_every_level() {
    let display = RecordingDisplay::new();
    let config = TrapConfig {
        log_sync: true,
        log_nested: true,
        ..TrapConfig::default()
    };
    let stack = stack_with(&display, config);

    stack
        .call_unsynced(|| stack.call_unsynced(|| Ok::<_, XError>(())))
        .unwrap();

    let debug = logged(Level::Debug);
    assert!(debug.contains(&"X11 trap enter at level 0".to_string()));
    assert!(debug.contains(&"X11 trap enter at level 1".to_string()));
    assert!(debug.contains(&"Nested X11 trap at level 1:".to_string()));
    assert!(debug.contains(&"X11 trap exit at level 0, need_sync=false".to_string()));
}
