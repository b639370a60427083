//! Polymorphic object specifications for [`Container::create`].
//!
//! Configuration files describe objects in several shapes: a bare
//! identifier, or a map with a `"class"` key plus options. [`ObjectSpec`]
//! is the typed form of all of them.

use std::fmt;

use serde_json::Value;
use tracing::trace;

use crate::container::{Container, Parameters};
use crate::error::{InjectorError, Result};
use crate::reflect::{Config, Instance};

/// Key that names the type in a map-shaped specification.
pub const CLASS_KEY: &str = "class";

/// Something [`Container::create`] can turn into an instance.
pub enum ObjectSpec {
    /// Build a fresh instance of this identifier.
    Identifier(String),
    /// Already built; returned unchanged.
    Instance(Instance),
    /// Called once to produce the instance.
    Factory(Box<dyn FnOnce() -> Result<Instance> + Send>),
    /// Build `class`, handing `config` to a configurable type.
    Configured { class: String, config: Config },
}

impl ObjectSpec {
    pub fn factory<F>(factory: F) -> Self
    where
        F: FnOnce() -> Result<Instance> + Send + 'static,
    {
        ObjectSpec::Factory(Box::new(factory))
    }
}

impl From<&str> for ObjectSpec {
    fn from(identifier: &str) -> Self {
        ObjectSpec::Identifier(identifier.to_string())
    }
}

impl From<String> for ObjectSpec {
    fn from(identifier: String) -> Self {
        ObjectSpec::Identifier(identifier)
    }
}

impl From<Instance> for ObjectSpec {
    fn from(instance: Instance) -> Self {
        ObjectSpec::Instance(instance)
    }
}

impl TryFrom<Value> for ObjectSpec {
    type Error = InjectorError;

    /// Accepts a string identifier or a map carrying a string `"class"`;
    /// the map's other entries become the config.
    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(identifier) => Ok(ObjectSpec::Identifier(identifier)),
            Value::Object(mut config) => match config.remove(CLASS_KEY) {
                Some(Value::String(class)) => Ok(ObjectSpec::Configured { class, config }),
                Some(other) => Err(InjectorError::ConfigurationShape(format!(
                    "the \"{CLASS_KEY}\" element must be a string, got {}",
                    kind(&other)
                ))),
                None => Err(InjectorError::ConfigurationShape(format!(
                    "object configuration must contain a \"{CLASS_KEY}\" element"
                ))),
            },
            other => Err(InjectorError::ConfigurationShape(format!(
                "unsupported configuration type: {}",
                kind(&other)
            ))),
        }
    }
}

impl fmt::Debug for ObjectSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectSpec::Identifier(id) => f.debug_tuple("Identifier").field(id).finish(),
            ObjectSpec::Instance(_) => f.write_str("Instance(..)"),
            ObjectSpec::Factory(_) => f.write_str("Factory(..)"),
            ObjectSpec::Configured { class, config } => f
                .debug_struct("Configured")
                .field("class", class)
                .field("config", config)
                .finish(),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Container {
    /// Builds an instance from any [`ObjectSpec`].
    ///
    /// Identifiers and configured specs always build fresh instances;
    /// nothing is cached.
    ///
    /// ```rust,ignore
    /// let mailer = container.create(ObjectSpec::Configured {
    ///     class: "mailer".into(),
    ///     config: serde_json::from_str(r#"{"retries": 3}"#)?,
    /// })?;
    /// ```
    pub fn create(&self, spec: impl Into<ObjectSpec>) -> Result<Instance> {
        self.create_with(spec, &Parameters::new())
    }

    /// [`create`](Self::create) with named constructor overrides.
    pub fn create_with(&self, spec: impl Into<ObjectSpec>, parameters: &Parameters) -> Result<Instance> {
        match spec.into() {
            ObjectSpec::Identifier(identifier) => {
                trace!(identifier = %identifier, "Creating from identifier");
                self.make_with(&identifier, parameters, Config::new())
            }
            ObjectSpec::Instance(instance) => Ok(instance),
            ObjectSpec::Factory(factory) => factory(),
            ObjectSpec::Configured { class, config } => {
                trace!(class = %class, "Creating from configuration");
                self.make_with(&class, parameters, config)
            }
        }
    }

    /// Parses a JSON specification and [`create`](Self::create)s it.
    pub fn create_from_value(&self, value: Value) -> Result<Instance> {
        self.create(ObjectSpec::try_from(value)?)
    }
}
