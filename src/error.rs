use thiserror::Error;

/// SQLSTATE raised by Postgres when a role lacks a privilege.
const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Remote store failures, classified once at the adapter boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("permission denied by the remote store: {0}")]
    PermissionDenied(String),

    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("remote store error: {0}")]
    Unknown(String),
}

impl StoreError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(INSUFFICIENT_PRIVILEGE) => {
                Self::PermissionDenied(db.message().to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Unavailable(error.to_string()),
            _ => Self::Unknown(error.to_string()),
        }
    }
}

/// Statement an administrator can run to let the portal role use the
/// report collection again.
pub const PERMISSION_FIX_SNIPPET: &str = "\
GRANT USAGE ON SCHEMA dlc_portal TO dlc_portal_app;
GRANT SELECT, INSERT, DELETE ON dlc_portal.reports TO dlc_portal_app;";

pub fn permission_banner(error: &StoreError) -> String {
    format!(
        "!! {error}\n\
         !! The report collection rejected this request and will keep doing so until\n\
         !! an administrator updates the database grants:\n\n{PERMISSION_FIX_SNIPPET}\n"
    )
}
