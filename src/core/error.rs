//! Error types for the mapping system
//!
//! This module defines all error types that can occur while building converters,
//! reading records, or talking to a record source backend.

/// Result type alias for mapping operations
pub type Result<T> = std::result::Result<T, MappingError>;

/// Error types for mapping operations
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    /// No identity, custom or built-in conversion exists for a member
    #[error("Error reading {target_type}: Can't read '{member}' of type {member_type} given {field_type}")]
    InvalidConversion {
        target_type: String,
        member: String,
        member_type: String,
        field_type: String,
    },

    /// None of the target's constructors could be satisfied
    #[error("Error reading {target_type}: No suitable constructor found for {constructed_type}")]
    NoSuitableConstructor {
        target_type: String,
        constructed_type: String,
    },

    /// A member marked as required has no matching source field
    #[error("Error reading {target_type}: Failed to set required member '{member}'")]
    RequiredMemberUnresolved { target_type: String, member: String },

    /// A selector or trampoline parameter has no matching source field
    #[error("Error reading {target_type}: Failed to map parameter \"{parameter}\"")]
    ParameterUnresolved {
        target_type: String,
        parameter: String,
    },

    /// The same field name appears twice in a record schema
    #[error("Duplicate field name: {0}")]
    DuplicateField(String),

    /// A field name is used both as a leaf and as a nested prefix
    #[error("Field '{0}' is used both as a value and as a nested prefix")]
    FieldConflict(String),

    /// A field read as non-nullable turned out to be null
    #[error("Unexpected null reading '{member}' (ordinal {ordinal})")]
    UnexpectedNull { member: String, ordinal: usize },

    /// A field value did not match the type it was read as
    #[error("Invalid cast reading '{member}': expected {expected}, got {actual}")]
    InvalidCast {
        member: String,
        expected: String,
        actual: String,
    },

    /// Connection error (generic)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Query timeout
    #[error("Query timeout after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    /// SQLite error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl MappingError {
    /// Create an invalid conversion error
    pub fn invalid_conversion(
        target_type: impl Into<String>,
        member: impl Into<String>,
        member_type: impl Into<String>,
        field_type: impl Into<String>,
    ) -> Self {
        MappingError::InvalidConversion {
            target_type: target_type.into(),
            member: member.into(),
            member_type: member_type.into(),
            field_type: field_type.into(),
        }
    }

    /// Create a no suitable constructor error
    pub fn no_suitable_constructor(
        target_type: impl Into<String>,
        constructed_type: impl Into<String>,
    ) -> Self {
        MappingError::NoSuitableConstructor {
            target_type: target_type.into(),
            constructed_type: constructed_type.into(),
        }
    }

    /// Create a required member error
    pub fn required_member(target_type: impl Into<String>, member: impl Into<String>) -> Self {
        MappingError::RequiredMemberUnresolved {
            target_type: target_type.into(),
            member: member.into(),
        }
    }

    /// Create an unresolved parameter error
    pub fn parameter_unresolved(
        target_type: impl Into<String>,
        parameter: impl Into<String>,
    ) -> Self {
        MappingError::ParameterUnresolved {
            target_type: target_type.into(),
            parameter: parameter.into(),
        }
    }

    /// Create an unexpected null error
    pub fn unexpected_null(member: impl Into<String>, ordinal: usize) -> Self {
        MappingError::UnexpectedNull {
            member: member.into(),
            ordinal,
        }
    }

    /// Create an invalid cast error
    pub fn invalid_cast(member: impl Into<String>, expected: &str, actual: &str) -> Self {
        MappingError::InvalidCast {
            member: member.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        MappingError::ConnectionError(msg.into())
    }

    /// Create a query timeout error
    pub fn query_timeout(timeout_ms: u64) -> Self {
        MappingError::QueryTimeout { timeout_ms }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        MappingError::Other(msg.into())
    }

    /// Whether this error was raised while building a converter rather than reading a row
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            MappingError::InvalidConversion { .. }
                | MappingError::NoSuitableConstructor { .. }
                | MappingError::RequiredMemberUnresolved { .. }
                | MappingError::ParameterUnresolved { .. }
                | MappingError::DuplicateField(_)
                | MappingError::FieldConflict(_)
        )
    }
}
