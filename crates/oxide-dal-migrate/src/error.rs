//! Error types for the runtime layer.

use std::fmt;

use oxide_dal_core::{CompileError, RegistryError};

/// A model that failed during `auto_migrate`.
#[derive(Debug)]
pub struct ModelFailure {
    /// Model name.
    pub model: String,
    /// What went wrong.
    pub error: MigrateError,
}

impl fmt::Display for ModelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.model, self.error)
    }
}

/// Errors that can occur while talking to a database.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A statement could not be compiled; nothing was sent to the database.
    #[error("Compilation error: {0}")]
    Compile(CompileError),

    /// Database error, returned as the driver reported it.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The context was canceled.
    #[error("Operation canceled")]
    Canceled,

    /// The context deadline passed.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// A catalog query returned something unusable.
    #[error("Introspection of '{table}' failed: {reason}")]
    Introspection {
        /// Table being inspected.
        table: String,
        /// What was wrong.
        reason: String,
    },

    /// A schema change for a model failed.
    #[error("Migration of model '{model}' failed at {object}: {source}")]
    Migration {
        /// Model name.
        model: String,
        /// The table, column, index or constraint being changed.
        object: String,
        /// Underlying error.
        source: Box<MigrateError>,
    },

    /// One or more models failed during `auto_migrate`.
    #[error(
        "AutoMigrate failed for {} model(s):\n{}",
        .0.len(),
        .0.iter().map(|f| format!("  - {f}")).collect::<Vec<_>>().join("\n")
    )]
    AutoMigrate(Vec<ModelFailure>),

    /// The dialect lacks an optional capability.
    #[error("Operation {operation} is not supported by the {dialect} dialect")]
    Unsupported {
        /// Dialect name.
        dialect: &'static str,
        /// Operation name.
        operation: &'static str,
    },

    /// A plugin with the same name is already registered.
    #[error("Plugin '{0}' is already registered")]
    DuplicatePlugin(String),

    /// No dialect matches a name or URL.
    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),

    /// The dialect registry rejected a dialect record.
    #[error("Dialect registry error: {0}")]
    Registry(RegistryError),

    /// A named model element does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A view was created without a defining query.
    #[error("View '{0}' requires a query")]
    ViewQueryRequired(String),

    /// IO error (reading schema files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MigrateError {
    /// True for cancellation and deadline errors, which abort a whole run.
    #[must_use]
    pub const fn is_interrupt(&self) -> bool {
        matches!(self, Self::Canceled | Self::DeadlineExceeded)
    }

    /// True for missing optional capabilities.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

impl From<CompileError> for MigrateError {
    fn from(error: CompileError) -> Self {
        match error {
            CompileError::Unsupported { dialect, operation } => {
                Self::Unsupported { dialect, operation }
            }
            other => Self::Compile(other),
        }
    }
}

impl From<RegistryError> for MigrateError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::Unknown(name) => Self::UnknownDialect(name),
            other => Self::Registry(other),
        }
    }
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
