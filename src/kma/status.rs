//! Result-code taxonomy for the village forecast service
//!
//! The service reports a two-digit `resultCode` on every response. Codes
//! split into three disjoint sets: fatal (misconfiguration, retrying
//! cannot help), retryable (transient server-side trouble) and the
//! no-data code, which is an expected steady-state condition between
//! publications rather than a fault. Unrecognized codes fail open as
//! retryable.

/// Successful response
pub const SUCCESS_CODE: &str = "00";
/// No forecast published for the queried slot yet
pub const NO_DATA_CODE: &str = "03";
/// Request limit exceeded; gets an extra cooldown before the next attempt
pub const RATE_LIMIT_CODE: &str = "22";

/// Non-retryable codes: configuration or credential problems independent
/// of which slot is queried
pub const FATAL_CODES: [(&str, &str); 8] = [
    ("10", "invalid request parameter"),
    ("11", "missing required parameter"),
    ("12", "service deprecated or removed"),
    ("20", "service access denied"),
    ("30", "unregistered service key"),
    ("31", "expired service key"),
    ("32", "caller IP not registered"),
    ("33", "unsigned call"),
];

/// Transient codes: worth retrying against an earlier publication slot
pub const RETRYABLE_CODES: [(&str, &str); 7] = [
    ("01", "application error"),
    ("02", "database error"),
    ("04", "HTTP error"),
    ("05", "service connection failure"),
    ("21", "service key temporarily unavailable"),
    ("22", "request limit exceeded"),
    ("99", "unclassified error"),
];

/// Outcome class of one upstream response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    NoData,
    Fatal,
    Retryable,
    Unknown,
}

/// Classify a `resultCode` into its outcome class
#[must_use]
pub fn classify(code: &str) -> StatusKind {
    if code == SUCCESS_CODE {
        return StatusKind::Success;
    }
    if code == NO_DATA_CODE {
        return StatusKind::NoData;
    }
    if FATAL_CODES.iter().any(|(c, _)| *c == code) {
        return StatusKind::Fatal;
    }
    if RETRYABLE_CODES.iter().any(|(c, _)| *c == code) {
        return StatusKind::Retryable;
    }
    StatusKind::Unknown
}

/// Human-readable meaning of a `resultCode`
#[must_use]
pub fn describe(code: &str) -> &'static str {
    if code == SUCCESS_CODE {
        return "success";
    }
    if code == NO_DATA_CODE {
        return "no data published for this slot";
    }
    if let Some(&(_, desc)) = FATAL_CODES.iter().find(|(c, _)| *c == code) {
        return desc;
    }
    if let Some(&(_, desc)) = RETRYABLE_CODES.iter().find(|(c, _)| *c == code) {
        return desc;
    }
    "unknown error"
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("00", StatusKind::Success)]
    #[case("03", StatusKind::NoData)]
    #[case("10", StatusKind::Fatal)]
    #[case("30", StatusKind::Fatal)]
    #[case("33", StatusKind::Fatal)]
    #[case("01", StatusKind::Retryable)]
    #[case("22", StatusKind::Retryable)]
    #[case("99", StatusKind::Retryable)]
    #[case("77", StatusKind::Unknown)]
    #[case("", StatusKind::Unknown)]
    fn test_classify(#[case] code: &str, #[case] expected: StatusKind) {
        assert_eq!(classify(code), expected);
    }

    #[test]
    fn test_code_sets_are_disjoint() {
        for (fatal, _) in FATAL_CODES {
            assert!(!RETRYABLE_CODES.iter().any(|(c, _)| *c == fatal));
            assert_ne!(fatal, SUCCESS_CODE);
            assert_ne!(fatal, NO_DATA_CODE);
        }
        for (retryable, _) in RETRYABLE_CODES {
            assert_ne!(retryable, SUCCESS_CODE);
            assert_ne!(retryable, NO_DATA_CODE);
        }
    }

    #[test]
    fn test_describe_known_and_unknown() {
        assert_eq!(describe("31"), "expired service key");
        assert_eq!(describe("22"), "request limit exceeded");
        assert_eq!(describe("42"), "unknown error");
    }
}
