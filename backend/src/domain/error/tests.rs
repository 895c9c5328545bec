//! Tests for domain error construction and serialisation.

use super::*;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case::invalid(Error::invalid_request("bad"), ErrorCode::InvalidRequest)]
#[case::forbidden(Error::forbidden("nope"), ErrorCode::Forbidden)]
#[case::not_found(Error::not_found("missing"), ErrorCode::NotFound)]
#[case::conflict(Error::conflict("taken"), ErrorCode::Conflict)]
#[case::unavailable(Error::service_unavailable("down"), ErrorCode::ServiceUnavailable)]
#[case::internal(Error::internal("boom"), ErrorCode::InternalError)]
fn constructors_set_expected_code(#[case] error: Error, #[case] expected: ErrorCode) {
    assert_eq!(error.code(), expected);
}

#[rstest]
fn try_new_rejects_empty_messages() {
    let result = Error::try_new(ErrorCode::InvalidRequest, "   ");
    assert!(matches!(result, Err(ErrorValidationError::EmptyMessage)));
}

#[rstest]
fn new_replaces_blank_messages() {
    let error = Error::new(ErrorCode::InternalError, "");
    assert_eq!(error.message(), FALLBACK_MESSAGE);
}

#[rstest]
fn serialises_code_in_snake_case() {
    let error = Error::service_unavailable("provider down").with_details(json!({"status": 502}));
    let value = serde_json::to_value(&error).expect("serialise error");

    assert_eq!(
        value,
        json!({
            "code": "service_unavailable",
            "message": "provider down",
            "details": {"status": 502}
        })
    );
}

#[rstest]
fn deserialisation_rejects_blank_message() {
    let payload = json!({"code": "not_found", "message": " "});
    let result = serde_json::from_value::<Error>(payload);
    assert!(result.is_err());
}

#[rstest]
#[case(ErrorCode::ServiceUnavailable, true)]
#[case(ErrorCode::Conflict, false)]
#[case(ErrorCode::InternalError, false)]
fn only_unavailability_is_transient(#[case] code: ErrorCode, #[case] expected: bool) {
    assert_eq!(code.is_transient(), expected);
}

#[rstest]
fn display_prefixes_the_code() {
    let error = Error::not_found("shipment not found or access denied");
    assert_eq!(
        error.to_string(),
        "not_found: shipment not found or access denied"
    );
}

#[rstest]
fn code_names_match_the_wire_format() {
    for code in [
        ErrorCode::InvalidRequest,
        ErrorCode::Forbidden,
        ErrorCode::NotFound,
        ErrorCode::Conflict,
        ErrorCode::ServiceUnavailable,
        ErrorCode::InternalError,
    ] {
        assert_eq!(serde_json::to_value(code).expect("code"), json!(code.as_str()));
    }
}
