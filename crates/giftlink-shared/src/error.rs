use thiserror::Error;

/// Reasons a launch-data string is rejected.
///
/// Every variant means the request cannot be attributed to the messaging
/// platform and must not be served.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Launch data verification is not configured")]
    NotConfigured,

    #[error("Authorization header is not valid text")]
    MalformedHeader,

    #[error("Launch data carries no hash")]
    MissingHash,

    #[error("Launch data signature mismatch")]
    SignatureMismatch,

    #[error("Launch data carries no user")]
    MissingUser,

    #[error("Malformed user object: {0}")]
    MalformedUser(String),

    #[error("Missing or malformed auth_date")]
    MalformedAuthDate,

    #[error("Launch data has expired")]
    Expired,
}
