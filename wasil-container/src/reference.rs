//! Binding slots for constructor arguments and properties.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::DefinitionError;
use crate::reflect::Instance;

/// What a [`Reference`] is bound to.
#[derive(Clone)]
pub enum Target {
    /// Resolve another identifier through the container.
    Referent(String),
    /// Use this value as-is.
    Value(Instance),
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Referent(id) => f.debug_tuple("Referent").field(id).finish(),
            Target::Value(_) => f.write_str("Value(..)"),
        }
    }
}

/// One binding slot of a definition.
///
/// # Examples
/// ```
/// use wasil_container::reference::Reference;
///
/// let mut reference = Reference::new("logger");
/// reference.reference_to("app.logger").guarded(true);
/// assert_eq!(reference.referent_name(), Some("app.logger"));
/// assert!(reference.is_guarded());
/// ```
#[derive(Clone, Debug)]
pub struct Reference {
    name: String,
    target: Option<Target>,
    guarded: bool,
}

impl Reference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
            guarded: false,
        }
    }

    /// Points this slot at another identifier, replacing any literal.
    pub fn reference_to(&mut self, identifier: impl Into<String>) -> &mut Self {
        self.target = Some(Target::Referent(identifier.into()));
        self
    }

    /// Binds this slot to a literal value, replacing any referent.
    pub fn with_value<T: Any + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.with_instance(Arc::new(value))
    }

    /// Binds this slot to an already type-erased value.
    pub fn with_instance(&mut self, value: Instance) -> &mut Self {
        self.target = Some(Target::Value(value));
        self
    }

    /// Marks the slot as allowed to write non-public properties.
    pub fn guarded(&mut self, guarded: bool) -> &mut Self {
        self.guarded = guarded;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn referent_name(&self) -> Option<&str> {
        match &self.target {
            Some(Target::Referent(id)) => Some(id),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&Instance> {
        match &self.target {
            Some(Target::Value(value)) => Some(value),
            _ => None,
        }
    }

    #[inline]
    pub fn is_guarded(&self) -> bool {
        self.guarded
    }

    pub(crate) fn check_bound(&self, identifier: &str) -> Result<(), DefinitionError> {
        match self.target {
            Some(_) => Ok(()),
            None => Err(DefinitionError::UnboundReference {
                identifier: identifier.to_string(),
                reference: self.name.clone(),
            }),
        }
    }
}
