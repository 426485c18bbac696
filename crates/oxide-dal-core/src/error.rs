//! Error types for SQL compilation and dialect handling.

/// Errors raised while quoting identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteError {
    /// The configured quote character cannot delimit identifiers.
    #[error("Invalid identifier quote character {0:?}")]
    InvalidQuoteChar(char),

    /// A quoted identifier could not be split back into its segments.
    #[error("Malformed quoted identifier '{input}' at byte {position}")]
    Malformed {
        /// The offending input.
        input: String,
        /// Byte offset where parsing failed.
        position: usize,
    },
}

/// Errors raised while compiling clauses into SQL.
///
/// Compilation is all-or-nothing: none of these errors come with partial SQL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// A clause or clause combination is malformed.
    #[error("Invalid clause {clause}: {reason}")]
    InvalidClause {
        /// Name of the offending clause.
        clause: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A value cannot be bound for the active dialect.
    #[error("Cannot bind value for dialect '{dialect}': {reason}")]
    Bind {
        /// Dialect name.
        dialect: &'static str,
        /// Why binding failed.
        reason: String,
    },

    /// Deferred scopes kept registering new scopes.
    #[error("Scopes still pending after {rounds} draining rounds")]
    ScopeOverflow {
        /// Number of rounds that ran before giving up.
        rounds: usize,
    },

    /// UPDATE or DELETE without a WHERE clause.
    #[error("{statement} without WHERE clause; enable global updates to allow it")]
    MissingWhereClause {
        /// Statement kind ("UPDATE" or "DELETE").
        statement: &'static str,
    },

    /// A raw fragment's placeholders do not match its arguments.
    #[error("Raw SQL expects {expected} arguments, got {got}")]
    ArgumentCount {
        /// Placeholders found in the fragment.
        expected: usize,
        /// Arguments supplied.
        got: usize,
    },

    /// The dialect has no way to express the requested operation.
    #[error("Operation '{operation}' is not supported by dialect '{dialect}'")]
    Unsupported {
        /// Dialect name.
        dialect: &'static str,
        /// Operation name.
        operation: &'static str,
    },
}

impl CompileError {
    pub(crate) fn invalid(clause: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidClause {
            clause,
            reason: reason.into(),
        }
    }
}

/// Errors raised by the dialect registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A dialect with this name is already registered.
    #[error("Dialect '{0}' is already registered")]
    Duplicate(String),

    /// No dialect is registered under this name.
    #[error("Unknown dialect '{0}'")]
    Unknown(String),

    /// The dialect record is misconfigured.
    #[error(transparent)]
    Quoting(#[from] QuoteError),
}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;
