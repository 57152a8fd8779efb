//! Tests for error types

use simbatch::Error;

#[test]
fn test_configuration_error() {
    let error = Error::Configuration("sweep axis 'Q' has no candidate values".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Configuration error"));
    assert!(error_str.contains("no candidate values"));
}

#[test]
fn test_engine_unavailable_error() {
    let error = Error::EngineUnavailable("core library not found".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Engine unavailable"));
    assert!(error_str.contains("No jobs were submitted"));
}

#[test]
fn test_dispatch_error() {
    let error = Error::Dispatch {
        index: 3,
        reason: "no worker available".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("assignment 3"));
    assert!(error_str.contains("no worker available"));
}

#[test]
fn test_protocol_parse_error() {
    let error = Error::ProtocolParse("telemetry pair without separator: 'junk'".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Protocol parse error"));
    assert!(error_str.contains("junk"));
}

#[test]
fn test_protocol_error() {
    let error = Error::Protocol("duplicate finish for job #7".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Protocol error"));
    assert!(error_str.contains("#7"));
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: Error = io_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("IO error"));
}

#[test]
fn test_serialize_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: Error = json_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("Serialization error"));
}

#[test]
fn test_error_debug() {
    let error = Error::Protocol("x".to_string());
    assert!(format!("{error:?}").contains("Protocol"));
}
