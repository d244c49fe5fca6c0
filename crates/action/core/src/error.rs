//! Common error infrastructure for action-core.
//!
//! Domain errors are split by the phase that produces them:
//! - [`DefinitionError`]: the action definition itself is malformed
//! - [`TargetError`]: a caller tried to store an invalid resolved target
//! - [`FormatError`]: template substitution could not complete
//!
//! Every error implements [`ClassifiedError`] so the pipeline can decide
//! whether a failure is fatal or a normal "nothing to do" outcome.

/// Severity level of an error, used for categorization and recovery strategies.
///
/// - **Validation**: invalid input that should be rejected without retry
/// - **Internal**: unexpected inconsistency that indicates a bug
/// - **Fatal**: the definition can never produce an action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorSeverity {
    Validation,
    Internal,
    Fatal,
}

impl ErrorSeverity {
    /// Returns a human-readable description of this severity level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    /// Returns true if this error indicates a defect rather than a normal outcome.
    pub const fn is_defect(&self) -> bool {
        matches!(self, Self::Internal | Self::Fatal)
    }
}

/// Uniform classification interface shared by all pipeline errors.
pub trait ClassifiedError: std::fmt::Display + std::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a static string identifier for this error variant.
    ///
    /// Useful for log aggregation and for matching in tests.
    fn error_code(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

// ============================================================================
// Definition Errors
// ============================================================================

/// Errors in a static action definition. Never retried.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("action `{action}` declares neither a scope nor targets")]
    NoTargetSource { action: String },

    #[error("target `{target}` of action `{action}` references itself via contextFrom")]
    SelfReference { action: String, target: String },

    #[error("target `{target}` of action `{action}` references unknown target `{missing}`")]
    UnknownContextSource {
        action: String,
        target: String,
        missing: String,
    },

    #[error("action `{action}` has a contextFrom cycle through: {}", cycle.join(", "))]
    CyclicDependency { action: String, cycle: Vec<String> },

    #[error("action `{action}` binds placeholder `{placeholder}` more than once")]
    DuplicatePlaceholder { action: String, placeholder: String },

    #[error("target `{target}` of action `{action}` has a blank {field}")]
    BlankField {
        action: String,
        target: String,
        field: &'static str,
    },

    #[error("template of action `{action}` references undeclared placeholder `{placeholder}`")]
    UndeclaredPlaceholder { action: String, placeholder: String },

    #[error(transparent)]
    Template(#[from] FormatError),
}

impl ClassifiedError for DefinitionError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Fatal
    }

    fn error_code(&self) -> &'static str {
        use DefinitionError::*;
        match self {
            NoTargetSource { .. } => "DEFINITION_NO_TARGET_SOURCE",
            SelfReference { .. } => "DEFINITION_SELF_REFERENCE",
            UnknownContextSource { .. } => "DEFINITION_UNKNOWN_CONTEXT_SOURCE",
            CyclicDependency { .. } => "DEFINITION_CYCLIC_DEPENDENCY",
            DuplicatePlaceholder { .. } => "DEFINITION_DUPLICATE_PLACEHOLDER",
            BlankField { .. } => "DEFINITION_BLANK_FIELD",
            UndeclaredPlaceholder { .. } => "DEFINITION_UNDECLARED_PLACEHOLDER",
            Template(err) => err.error_code(),
        }
    }
}

// ============================================================================
// Target Errors
// ============================================================================

/// Rejected attempts to store a resolved target.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("placeholder name must be a non-blank string")]
    BlankPlaceholder,

    #[error("entity id for placeholder `{placeholder}` must be a non-blank string")]
    BlankEntityId { placeholder: String },
}

impl ClassifiedError for TargetError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            TargetError::BlankPlaceholder => "TARGET_BLANK_PLACEHOLDER",
            TargetError::BlankEntityId { .. } => "TARGET_BLANK_ENTITY_ID",
        }
    }
}

// ============================================================================
// Format Errors
// ============================================================================

/// Template substitution failures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("placeholder `{placeholder}` has no resolved target in this combination")]
    UnboundPlaceholder { placeholder: String },

    #[error("unterminated placeholder token starting at byte {offset}")]
    UnterminatedToken { offset: usize },

    #[error("empty placeholder token at byte {offset}")]
    EmptyToken { offset: usize },
}

impl ClassifiedError for FormatError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            FormatError::UnboundPlaceholder { .. } => ErrorSeverity::Internal,
            FormatError::UnterminatedToken { .. } | FormatError::EmptyToken { .. } => {
                ErrorSeverity::Fatal
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            FormatError::UnboundPlaceholder { .. } => "FORMAT_UNBOUND_PLACEHOLDER",
            FormatError::UnterminatedToken { .. } => "FORMAT_UNTERMINATED_TOKEN",
            FormatError::EmptyToken { .. } => "FORMAT_EMPTY_TOKEN",
        }
    }
}
