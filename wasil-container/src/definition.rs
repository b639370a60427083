//! Recipes for building one identifier's instance.
//!
//! An [`ObjectDefinition`] is either reflected from a [`TypeInfo`] on first
//! lookup or registered explicitly through
//! [`Container::define`](crate::container::Container::define). Configurators
//! receive it as `&mut` and use the `have_*` accessors, which create the
//! constructor, argument or property slot on first use:
//!
//! ```rust
//! use wasil_container::definition::ObjectDefinition;
//!
//! let mut definition = ObjectDefinition::new("mailer");
//! definition
//!     .have_constructor()
//!     .have_argument("transport")
//!     .reference_to("mailer.transport");
//! definition
//!     .have_property("from")
//!     .with_value(String::from("noreply@example.com"));
//!
//! assert_eq!(definition.constructor().unwrap().arguments().len(), 1);
//! assert_eq!(definition.properties().len(), 1);
//! ```
//!
//! [`TypeInfo`]: crate::reflect::TypeInfo

use std::fmt;
use std::sync::Arc;

use crate::container::Container;
use crate::error::{DefinitionError, Result};
use crate::reference::Reference;
use crate::reflect::Instance;

/// Builds a whole instance in place of constructor and property injection.
///
/// Shared rather than boxed so definitions stay cheap to clone for
/// [`Container::extend`](crate::container::Container::extend).
pub type Factory = Arc<dyn Fn(&Container) -> Result<Instance> + Send + Sync>;

/// Ordered constructor argument bindings.
#[derive(Clone, Debug, Default)]
pub struct ConstructorDefinition {
    arguments: Vec<Reference>,
}

impl ConstructorDefinition {
    /// Returns the argument named `name`, appending it if new.
    pub fn have_argument(&mut self, name: &str) -> &mut Reference {
        let index = match self.arguments.iter().position(|r| r.name() == name) {
            Some(index) => index,
            None => {
                self.arguments.push(Reference::new(name));
                self.arguments.len() - 1
            }
        };
        &mut self.arguments[index]
    }

    pub fn argument(&self, name: &str) -> Option<&Reference> {
        self.arguments.iter().find(|r| r.name() == name)
    }

    pub fn arguments(&self) -> &[Reference] {
        &self.arguments
    }
}

/// How to build one named service.
#[derive(Clone)]
pub struct ObjectDefinition {
    identifier: String,
    class: String,
    constructor: Option<ConstructorDefinition>,
    properties: Vec<Reference>,
    factory: Option<Factory>,
}

impl ObjectDefinition {
    /// A definition that builds the type registered under `identifier`.
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            class: identifier.clone(),
            identifier,
            constructor: None,
            properties: Vec::new(),
            factory: None,
        }
    }

    /// A definition with no backing type; it needs a factory to be useful.
    pub fn blank(identifier: impl Into<String>) -> Self {
        Self {
            class: String::new(),
            ..Self::new(identifier)
        }
    }

    #[inline]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Identifier of the type descriptor used to build the object.
    ///
    /// Empty for definitions made by
    /// [`Container::with_definition`](crate::container::Container::with_definition).
    #[inline]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Builds this service from another type descriptor.
    pub fn set_class(&mut self, class: impl Into<String>) -> &mut Self {
        self.class = class.into();
        self
    }

    /// Declares that the type has a constructor and returns it.
    pub fn have_constructor(&mut self) -> &mut ConstructorDefinition {
        self.constructor.get_or_insert_with(ConstructorDefinition::default)
    }

    pub fn constructor(&self) -> Option<&ConstructorDefinition> {
        self.constructor.as_ref()
    }

    /// Returns the property named `name`, appending it if new.
    pub fn have_property(&mut self, name: &str) -> &mut Reference {
        let index = match self.properties.iter().position(|r| r.name() == name) {
            Some(index) => index,
            None => {
                self.properties.push(Reference::new(name));
                self.properties.len() - 1
            }
        };
        &mut self.properties[index]
    }

    pub fn properties(&self) -> &[Reference] {
        &self.properties
    }

    /// Attaches or replaces the factory.
    pub fn set_factory<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(&Container) -> Result<Instance> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn factory(&self) -> Option<&Factory> {
        self.factory.as_ref()
    }

    /// Identifiers this definition resolves through the container.
    pub fn referents(&self) -> impl Iterator<Item = &str> + '_ {
        self.constructor
            .iter()
            .flat_map(|c| c.arguments.iter())
            .chain(self.properties.iter())
            .filter_map(Reference::referent_name)
    }

    /// Rejects references left without a target.
    pub fn validate(&self) -> std::result::Result<(), DefinitionError> {
        self.constructor
            .iter()
            .flat_map(|c| c.arguments.iter())
            .chain(self.properties.iter())
            .try_for_each(|reference| reference.check_bound(&self.identifier))
    }
}

impl fmt::Debug for ObjectDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDefinition")
            .field("identifier", &self.identifier)
            .field("class", &self.class)
            .field("constructor", &self.constructor)
            .field("properties", &self.properties)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}
