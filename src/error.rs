use serde::Serialize;

/// Crate-wide error type. Every fallible store function returns `Result<T, AppError>`.
/// Serializes cleanly so the HTTP layer can forward structured error messages.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Uniform for unknown user, wrong password and blank fields.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user disabled")]
    UserDisabled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::Pool(_) => "pool",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation",
            AppError::Io(_) => "io",
            AppError::Serde(_) => "serde",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::UserDisabled => "user_disabled",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

/// Serialized as `{ error: "...", kind: "..." }` for the HTTP boundary.
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("error", &self.to_string())?;
        s.serialize_field("kind", self.kind())?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_kind_and_message() {
        let value = serde_json::to_value(AppError::NotFound("Project p1".into())).unwrap();
        assert_eq!(value["kind"], "not_found");
        assert_eq!(value["error"], "Not found: Project p1");
    }

    #[test]
    fn credential_errors_do_not_leak_detail() {
        assert_eq!(AppError::InvalidCredentials.to_string(), "invalid credentials");
        assert_eq!(AppError::UserDisabled.kind(), "user_disabled");
    }
}
