//! Error types for Wasil container operations.
//!
//! Callers can always tell "unknown service" ([`InjectorError::NotFound`])
//! from "known but broken" ([`InjectorError::ConstructionFailed`] and
//! [`InjectorError::Definition`]).

use std::fmt;

use wasil_support::rendering::render_chain;

/// Boxed error used as the source of construction failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all Wasil operations.
#[derive(Debug, thiserror::Error)]
pub enum InjectorError {
    /// A definition could not be built from a type's signature, or a
    /// configurator left a reference unbound.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// Nothing in this container or its delegates answers to the identifier.
    #[error("{}", .0)]
    NotFound(NotFoundError),

    /// Instantiation, property assignment or a factory failed.
    #[error("Failed to construct {identifier}: {source}")]
    ConstructionFailed {
        identifier: String,
        #[source]
        source: BoxError,
    },

    /// An object specification had the wrong shape.
    #[error("Invalid object configuration: {0}")]
    ConfigurationShape(String),

    /// An identifier was requested again while it was still being built.
    #[error("{}", .0)]
    CircularReference(CircularReferenceError),
}

impl InjectorError {
    pub(crate) fn construction(identifier: &str, source: impl Into<BoxError>) -> Self {
        InjectorError::ConstructionFailed {
            identifier: identifier.to_string(),
            source: source.into(),
        }
    }

    /// Returns `true` for [`InjectorError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, InjectorError::NotFound(_))
    }
}

/// Raised while turning a type signature or a configurator into a definition.
///
/// Cloneable because the container memoizes it: an identifier that failed
/// reflection keeps failing with the same error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    /// A constructor parameter is neither a service nor has a default.
    #[error(
        "Unable to parse definition for '{identifier}', missing default value for parameter: '{parameter}'"
    )]
    MissingDefault {
        identifier: String,
        parameter: String,
    },

    /// A reference was declared but never pointed anywhere.
    #[error(
        "Definition for '{identifier}' has unbound reference '{reference}': set a referent or a value"
    )]
    UnboundReference {
        identifier: String,
        reference: String,
    },
}

/// Error when no entry exists for an identifier.
#[derive(Debug)]
pub struct NotFoundError {
    /// The identifier that was requested
    pub requested: String,
    /// The definition that referenced it, when known
    pub required_by: Option<String>,
    /// Registered identifiers that look alike
    pub suggestions: Vec<String>,
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No entry was found for identifier: {}", self.requested)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        Ok(())
    }
}

/// Error when resolution re-enters an identifier that is still loading.
#[derive(Debug)]
pub struct CircularReferenceError {
    /// The loop, first and last element equal.
    /// Example: `["a", "b", "a"]`
    pub chain: Vec<String>,
}

impl fmt::Display for CircularReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular reference detected:\n  {}", render_chain(&self.chain))?;
        write!(
            f,
            "\n  Hint: inject one side through a guarded property or resolve it lazily from the container"
        )
    }
}

/// Convenient Result type for Wasil operations.
pub type Result<T> = std::result::Result<T, InjectorError>;
