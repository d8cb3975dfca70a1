//! Provider error classification.
//!
//! All matching on provider status codes, status tokens and message text lives
//! here. The engine only ever sees an `ErrorKind`.

use serde::{Deserialize, Serialize};

use super::InvocationError;

/// Closed set of failure categories for one invocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credential expired or invalid.
    FatalCredential,
    /// Provider quota exhausted.
    FatalQuota,
    /// Credential lacks access to the capability.
    FatalPermission,
    /// Malformed or unauthenticated request.
    FatalConfiguration,
    /// This model is missing, deprecated or temporarily unavailable.
    RetryableUnavailable,
    /// Anything unrecognized. Assumed transient.
    RetryableUnknown,
}

impl ErrorKind {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::FatalCredential
                | Self::FatalQuota
                | Self::FatalPermission
                | Self::FatalConfiguration
        )
    }
}

const CREDENTIAL_SIGNALS: &[&str] = &[
    "api_key_invalid",
    "api key not valid",
    "api key expired",
    "api_key_expired",
    "invalid api key",
    "expired api key",
    "credential expired",
    "credentials have expired",
    "invalid credential",
];

const QUOTA_SIGNALS: &[&str] = &[
    "resource_exhausted",
    "quota exceeded",
    "exceeded your current quota",
    "quota_exceeded",
    "rate limit",
    "too many requests",
];

const PERMISSION_SIGNALS: &[&str] = &["permission_denied", "permission denied"];

const CONFIGURATION_SIGNALS: &[&str] = &[
    "invalid_argument",
    "unauthenticated",
    "invalid request",
    "failed_precondition",
];

const UNAVAILABLE_SIGNALS: &[&str] = &[
    "not_found",
    "not found",
    "is not supported",
    "deprecated",
    "unavailable",
    "overloaded",
];

/// Map a provider failure onto an `ErrorKind`.
///
/// Checks run most-specific first: a 400 carrying `API_KEY_INVALID` is a
/// credential problem, not a malformed request. Unrecognized failures fall
/// through to `RetryableUnknown`.
pub fn classify_invocation_error(err: &InvocationError) -> ErrorKind {
    let haystack = signal_text(err);
    let has = |signals: &[&str]| signals.iter().any(|s| haystack.contains(s));

    if has(CREDENTIAL_SIGNALS) {
        return ErrorKind::FatalCredential;
    }
    if err.status == Some(429) || has(QUOTA_SIGNALS) {
        return ErrorKind::FatalQuota;
    }
    if err.status == Some(403) || has(PERMISSION_SIGNALS) {
        return ErrorKind::FatalPermission;
    }
    if matches!(err.status, Some(400) | Some(401)) || has(CONFIGURATION_SIGNALS) {
        return ErrorKind::FatalConfiguration;
    }
    if matches!(err.status, Some(404) | Some(503)) || has(UNAVAILABLE_SIGNALS) {
        return ErrorKind::RetryableUnavailable;
    }
    ErrorKind::RetryableUnknown
}

/// Lower-cased concatenation of every textual signal on the error.
fn signal_text(err: &InvocationError) -> String {
    let mut text = err.message.to_lowercase();
    for token in [&err.provider_status, &err.reason].into_iter().flatten() {
        text.push(' ');
        text.push_str(&token.to_lowercase());
    }
    text
}
