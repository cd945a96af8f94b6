//! Backend error classification
//!
//! Some S3-compatible backends only return free-text reasons, so the kind is
//! decided by typed matching where the error is structured and by
//! case-insensitive substring matching otherwise. All the textual fragility
//! lives in [`RULES`].

use crate::error::{AppError, ErrorKind, StoreError};

struct Rule {
    needles: &'static [&'static str],
    kind: ErrorKind,
    message: Option<&'static str>,
}

/// Checked in order; the first rule with a matching needle wins.
const RULES: &[Rule] = &[
    Rule {
        needles: &["nosuchbucket", "no such bucket", "nosuchkey", "no such key"],
        kind: ErrorKind::NotFound,
        message: None,
    },
    Rule {
        needles: &["invalidbucketname", "invalid bucket name"],
        kind: ErrorKind::BadRequest,
        message: Some("Invalid bucket name"),
    },
    Rule {
        needles: &[
            "bucketalreadyownedbyyou",
            "bucketalreadyexists",
            "bucket already owned by you",
            "bucket already exists",
        ],
        kind: ErrorKind::Conflict,
        message: Some("Bucket already exists"),
    },
    Rule {
        needles: BUCKET_NOT_EMPTY,
        kind: ErrorKind::Conflict,
        message: Some("Bucket is not empty"),
    },
    Rule {
        needles: &["accessdenied", "access denied"],
        kind: ErrorKind::Forbidden,
        message: None,
    },
    Rule {
        needles: &["slowdown", "slow down"],
        kind: ErrorKind::TooManyRequests,
        message: None,
    },
    Rule {
        needles: &["timeout", "context deadline exceeded", "deadline exceeded"],
        kind: ErrorKind::GatewayTimeout,
        message: None,
    },
    Rule {
        needles: &[
            "internalerror",
            "internal error",
            "internalservererror",
            "internal server error",
        ],
        kind: ErrorKind::BadGateway,
        message: None,
    },
    Rule {
        needles: &["invalidargument", "invalid argument"],
        kind: ErrorKind::Internal,
        message: None,
    },
    Rule {
        needles: &["file too large", "filetoolarge", "entitytoolarge", "entity too large"],
        kind: ErrorKind::PayloadTooLarge,
        message: None,
    },
    Rule {
        needles: &["serviceunavailable", "service unavailable"],
        kind: ErrorKind::ServiceUnavailable,
        message: None,
    },
    Rule {
        needles: &["connection refused"],
        kind: ErrorKind::BadGateway,
        message: None,
    },
];

const BUCKET_NOT_EMPTY: &[&str] = &["bucketnotempty", "bucket not empty"];

const NO_SUCH_BUCKET: &[&str] = &["nosuchbucket", "no such bucket"];

fn find_rule(text: &str) -> Option<&'static Rule> {
    let text = text.trim().to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.needles.iter().any(|needle| text.contains(needle)))
}

fn contains_any(err: &StoreError, needles: &[&str]) -> bool {
    let text = err.to_string().to_lowercase();
    needles.iter().any(|needle| text.contains(needle))
}

/// Classify free-form backend error text. Unmatched text is `BadGateway`.
pub fn classify_text(text: &str) -> ErrorKind {
    find_rule(text).map_or(ErrorKind::BadGateway, |rule| rule.kind)
}

/// Kind and fixed message for a backend error; typed variants win over text
fn resolve(err: &StoreError) -> (ErrorKind, Option<&'static str>) {
    match err {
        StoreError::Timeout(_) => (ErrorKind::GatewayTimeout, None),
        StoreError::Connection(_) => (ErrorKind::BadGateway, Some("failed to connect to server")),
        _ => match find_rule(&err.to_string()) {
            Some(rule) => (rule.kind, rule.message),
            None => (ErrorKind::BadGateway, None),
        },
    }
}

/// Classify a backend error
pub fn classify(err: &StoreError) -> ErrorKind {
    resolve(err).0
}

/// Convert a backend error into an [`AppError`], keeping it as the cause
pub fn map_error(err: StoreError) -> AppError {
    let (kind, message) = resolve(&err);
    let message = message.unwrap_or_else(|| kind.default_message());
    AppError::new(kind, message).with_cause(err)
}

/// Whether the backend refused a bucket delete because objects remain
pub fn is_bucket_not_empty(err: &StoreError) -> bool {
    contains_any(err, BUCKET_NOT_EMPTY)
}

pub fn is_no_such_bucket(err: &StoreError) -> bool {
    contains_any(err, NO_SUCH_BUCKET)
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        map_error(err)
    }
}
