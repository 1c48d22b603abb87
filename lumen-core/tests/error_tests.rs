//! Integration tests for error handling

use lumen_core::error::{LumenError, ResultExt};

#[test]
fn test_error_context_chaining() {
    let base_error = LumenError::pipeline("no element \"pipewiresrc\"");
    let with_context = base_error.with_context("Rendering node 42 (1920x1080)");

    let msg = format!("{}", with_context);
    assert!(msg.contains("Rendering node 42"));
    assert!(msg.contains("pipewiresrc"));
}

#[test]
fn test_error_context_preserves_hint() {
    let base_error = LumenError::display("Connection refused");
    let hint_before = base_error.user_hint();

    let with_context = base_error.with_context("Creating presentation window");
    let hint_after = with_context.user_hint();

    assert_eq!(hint_before, hint_after);
}

#[test]
fn test_result_ext_context() {
    let result: Result<(), LumenError> = Err(LumenError::portal("Connection failed"));
    let with_context = result.context("OpenPipeWireRemote");

    let err = with_context.unwrap_err();
    assert!(format!("{}", err).contains("OpenPipeWireRemote"));
}

#[test]
fn test_user_hints() {
    let err = LumenError::portal("test");
    assert!(err.user_hint().unwrap().contains("xdg-desktop-portal"));

    let err = LumenError::pipeline("test");
    assert!(err.user_hint().unwrap().contains("PipeWire"));

    let err = LumenError::display("test");
    assert!(err.user_hint().unwrap().contains("DISPLAY"));

    let err = LumenError::tray("test");
    assert!(err.user_hint().unwrap().contains("StatusNotifierItem"));

    assert!(LumenError::NoActiveSession.user_hint().is_none());
}

#[test]
fn test_cancelled_selection_hint() {
    let err = LumenError::PortalStatus {
        stage: "SelectSources",
        status: 1,
    };
    assert!(err.user_hint().unwrap().contains("cancelled"));

    let err = LumenError::PortalStatus {
        stage: "Start",
        status: 2,
    };
    assert!(!err.user_hint().unwrap().contains("cancelled"));
}

#[test]
fn test_user_recoverable() {
    assert!(LumenError::portal("test").is_user_recoverable());
    assert!(LumenError::pipeline("test").is_user_recoverable());
    assert!(LumenError::NoActiveSession.is_user_recoverable());
    assert!(LumenError::PortalStatus {
        stage: "Start",
        status: 1
    }
    .is_user_recoverable());

    // Need the environment fixed first
    assert!(!LumenError::display("test").is_user_recoverable());
    assert!(!LumenError::tray("test").is_user_recoverable());
    assert!(!LumenError::malformed("test").is_user_recoverable());
}

#[test]
fn test_error_display_format() {
    let err = LumenError::portal("Connection refused");
    assert_eq!(format!("{}", err), "Portal error: Connection refused");

    let err = LumenError::pipeline("Internal data stream error");
    assert_eq!(format!("{}", err), "Pipeline error: Internal data stream error");

    let err = LumenError::NoActiveSession;
    assert_eq!(format!("{}", err), "No active capture session");
}

#[test]
fn test_nested_context() {
    let err = LumenError::pipeline("Stream failed")
        .with_context("Rendering stream")
        .with_context("Session u3");

    let msg = format!("{}", err);
    assert!(msg.starts_with("Session u3"));
    assert!(err.is_user_recoverable());
    assert!(err.user_hint().is_some());
}

#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "No such device");
    let lumen_err: LumenError = io_err.into();

    let msg = format!("{}", lumen_err);
    assert!(msg.contains("I/O error"));
    assert!(msg.contains("No such device"));
}
