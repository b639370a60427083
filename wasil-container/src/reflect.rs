//! Type descriptors standing in for runtime reflection.
//!
//! The container never inspects a struct by itself. A type opts in by
//! describing its constructor and injectable properties in a [`TypeInfo`],
//! usually generated with `#[derive(Injectable)]`. An [`Introspector`] maps
//! identifiers to those descriptors; [`TypeCatalog`] is the stock one.
//!
//! ```text
//! identifier ──Introspector──> TypeInfo ──parse──> ObjectDefinition
//!                                 │
//!                                 └── construct(&Arguments) -> Box<dyn Service>
//! ```

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::container::ContainerRef;
use crate::error::BoxError;
use crate::reference::Target;

/// A resolved, type-erased service or literal value.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Per-object options handed to configurable types.
pub type Config = serde_json::Map<String, serde_json::Value>;

pub(crate) type ConstructFn =
    Arc<dyn Fn(&Arguments) -> Result<Box<dyn Service>, BoxError> + Send + Sync>;

pub(crate) type SetterFn =
    Arc<dyn Fn(&mut dyn Service, Instance) -> Result<(), BoxError> + Send + Sync>;

// ═══════════════════════════════════════════
// Service / Reflect
// ═══════════════════════════════════════════

/// Type-erasure helpers, implemented for every `Any + Send + Sync` type.
pub trait AsAny: Any + Send + Sync {
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_instance(self: Box<Self>) -> Instance;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_instance(self: Box<Self>) -> Instance {
        let boxed: Box<dyn Any + Send + Sync> = self;
        Arc::from(boxed)
    }
}

/// An object the container can build.
pub trait Service: AsAny {
    /// Container-aware hook, called once after property injection.
    ///
    /// The handle is weak so a cached singleton does not keep its own
    /// container alive.
    fn attach_container(&mut self, _container: ContainerRef) {}
}

/// A type that can describe itself to the container.
pub trait Reflect: Service + Sized {
    /// The identifier this type is registered under.
    fn identifier() -> &'static str {
        type_name::<Self>()
    }

    /// Describes the constructor and injectable properties.
    fn type_info() -> TypeInfo;
}

/// Identifier of a reflectable type.
#[inline]
pub fn identifier_of<T: Reflect>() -> &'static str {
    T::identifier()
}

// ═══════════════════════════════════════════
// Params and properties
// ═══════════════════════════════════════════

/// What the signature says about one constructor parameter.
#[derive(Clone)]
pub enum ParamKind {
    /// Declared as another service.
    Service(String),
    /// Not a service, but has a default value.
    Default(Instance),
    /// Neither; reflection fails on it.
    Untyped,
}

/// One constructor parameter.
#[derive(Clone)]
pub struct Param {
    name: String,
    kind: ParamKind,
}

impl Param {
    /// A parameter typed as the service registered under `identifier`.
    pub fn service(name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Service(identifier.into()),
        }
    }

    /// A parameter typed as the reflectable type `T`.
    pub fn of<T: Reflect>(name: impl Into<String>) -> Self {
        Self::service(name, T::identifier())
    }

    /// A non-service parameter with a default value.
    pub fn with_default<V: Any + Send + Sync>(name: impl Into<String>, value: V) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Default(Arc::new(value)),
        }
    }

    /// A non-service parameter without a default.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Untyped,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            ParamKind::Service(id) => format!("service {id}"),
            ParamKind::Default(_) => "default".to_string(),
            ParamKind::Untyped => "untyped".to_string(),
        };
        write!(f, "Param({}: {kind})", self.name)
    }
}

/// Who may write a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Any reference may write it.
    Public,
    /// Only guarded references may write it.
    Private,
}

/// A property the type exposes for injection.
#[derive(Clone)]
pub struct PropertySlot {
    name: String,
    visibility: Visibility,
    inject: Option<Target>,
    setter: SetterFn,
}

impl PropertySlot {
    /// Declares a slot and how to write it on a `T`.
    pub fn new<T, F>(name: impl Into<String>, visibility: Visibility, setter: F) -> Self
    where
        T: Service,
        F: Fn(&mut T, Instance) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        let slot = name.clone();
        Self {
            name,
            visibility,
            inject: None,
            setter: Arc::new(move |object: &mut dyn Service, value: Instance| {
                let target = object.as_any_mut().downcast_mut::<T>().ok_or_else(|| {
                    format!("property '{slot}' is declared on {}", type_name::<T>())
                })?;
                setter(target, value)
            }),
        }
    }

    /// Wires the slot to `identifier` whenever the type is reflected.
    pub fn inject_service(mut self, identifier: impl Into<String>) -> Self {
        self.inject = Some(Target::Referent(identifier.into()));
        self
    }

    /// Wires the slot to a literal whenever the type is reflected.
    pub fn inject_value<V: Any + Send + Sync>(mut self, value: V) -> Self {
        self.inject = Some(Target::Value(Arc::new(value)));
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub(crate) fn injected(&self) -> Option<&Target> {
        self.inject.as_ref()
    }

    pub(crate) fn write(&self, object: &mut dyn Service, value: Instance) -> Result<(), BoxError> {
        (self.setter)(object, value)
    }
}

impl fmt::Debug for PropertySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySlot")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("inject", &self.inject)
            .finish()
    }
}

// ═══════════════════════════════════════════
// TypeInfo
// ═══════════════════════════════════════════

/// Everything the container knows about a constructible type.
///
/// # Examples
/// ```
/// use wasil_container::reflect::{Param, Service, TypeInfo};
///
/// struct Greeter {
///     greeting: String,
/// }
/// impl Service for Greeter {}
///
/// let info = TypeInfo::new::<Greeter, _>("greeter", |args| {
///     Ok(Greeter { greeting: args.value(0)? })
/// })
/// .with_constructor([Param::with_default("greeting", String::from("hello"))]);
///
/// assert_eq!(info.identifier(), "greeter");
/// assert_eq!(info.params().map(|p| p.len()), Some(1));
/// ```
#[derive(Clone)]
pub struct TypeInfo {
    identifier: String,
    params: Option<Vec<Param>>,
    properties: Vec<PropertySlot>,
    configurable: bool,
    construct: ConstructFn,
}

impl TypeInfo {
    /// Describes a type built by `construct`, with no constructor
    /// parameters until [`with_constructor`](Self::with_constructor).
    pub fn new<T, F>(identifier: impl Into<String>, construct: F) -> Self
    where
        T: Service,
        F: Fn(&Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            identifier: identifier.into(),
            params: None,
            properties: Vec::new(),
            configurable: false,
            construct: Arc::new(move |args: &Arguments| {
                construct(args).map(|object| Box::new(object) as Box<dyn Service>)
            }),
        }
    }

    /// Like [`new`](Self::new), registered under `T`'s type name.
    pub fn of<T, F>(construct: F) -> Self
    where
        T: Service,
        F: Fn(&Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::new::<T, F>(type_name::<T>(), construct)
    }

    /// Declares a constructor with the given parameters, in order.
    pub fn with_constructor(mut self, params: impl IntoIterator<Item = Param>) -> Self {
        self.params = Some(params.into_iter().collect());
        self
    }

    pub fn property(mut self, slot: PropertySlot) -> Self {
        self.properties.push(slot);
        self
    }

    /// The last constructor argument receives the caller's [`Config`].
    pub fn configurable(mut self) -> Self {
        self.configurable = true;
        self
    }

    #[inline]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// `None` when the type declares no constructor.
    pub fn params(&self) -> Option<&[Param]> {
        self.params.as_deref()
    }

    pub fn properties(&self) -> &[PropertySlot] {
        &self.properties
    }

    pub fn property_slot(&self, name: &str) -> Option<&PropertySlot> {
        self.properties.iter().find(|slot| slot.name == name)
    }

    #[inline]
    pub fn is_configurable(&self) -> bool {
        self.configurable
    }

    pub(crate) fn construct(&self, args: &Arguments) -> Result<Box<dyn Service>, BoxError> {
        (self.construct)(args)
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("identifier", &self.identifier)
            .field("params", &self.params)
            .field("properties", &self.properties)
            .field("configurable", &self.configurable)
            .finish()
    }
}

// ═══════════════════════════════════════════
// Arguments
// ═══════════════════════════════════════════

/// Failure to read a constructor argument or property value.
#[derive(Debug, thiserror::Error)]
pub enum ArgumentError {
    #[error("missing constructor argument at position {0}")]
    Missing(usize),

    #[error("'{name}' does not hold a {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("'{name}' holds invalid options: {source}")]
    InvalidOptions {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Downcasts a shared instance to `Arc<T>`.
pub fn shared<T: Any + Send + Sync>(value: &Instance, name: &str) -> Result<Arc<T>, ArgumentError> {
    Arc::clone(value)
        .downcast::<T>()
        .map_err(|_| ArgumentError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
        })
}

/// Clones a `T` out of an instance.
pub fn cloned<T: Any + Clone>(value: &Instance, name: &str) -> Result<T, ArgumentError> {
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| ArgumentError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
        })
}

/// Resolved positional constructor arguments.
pub struct Arguments {
    entries: Vec<(String, Instance)>,
}

impl Arguments {
    pub fn new(entries: Vec<(String, Instance)>) -> Self {
        Self { entries }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The argument as a shared service.
    pub fn shared<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, ArgumentError> {
        let (name, value) = self.entry(index)?;
        shared(value, name)
    }

    /// A clone of the argument's value.
    pub fn value<T: Any + Clone>(&self, index: usize) -> Result<T, ArgumentError> {
        let (name, value) = self.entry(index)?;
        cloned(value, name)
    }

    /// Deserializes a [`Config`] argument into typed options.
    pub fn options<T: DeserializeOwned>(&self, index: usize) -> Result<T, ArgumentError> {
        let (name, value) = self.entry(index)?;
        let config = cloned::<Config>(value, name)?;
        serde_json::from_value(serde_json::Value::Object(config)).map_err(|source| {
            ArgumentError::InvalidOptions {
                name: name.to_string(),
                source,
            }
        })
    }

    fn entry(&self, index: usize) -> Result<(&str, &Instance), ArgumentError> {
        self.entries
            .get(index)
            .map(|(name, value)| (name.as_str(), value))
            .ok_or(ArgumentError::Missing(index))
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

// ═══════════════════════════════════════════
// Introspection
// ═══════════════════════════════════════════

/// Maps identifiers to type descriptors.
///
/// The container calls this at most once per identifier, even when several
/// threads look the same identifier up at once.
pub trait Introspector: Send + Sync {
    fn inspect(&self, identifier: &str) -> Option<Arc<TypeInfo>>;
}

/// Link-time registration emitted by `#[derive(Injectable)]`.
pub struct TypeRegistration {
    describe: fn() -> TypeInfo,
}

impl TypeRegistration {
    pub const fn new(describe: fn() -> TypeInfo) -> Self {
        Self { describe }
    }
}

inventory::collect!(TypeRegistration);

static DISCOVERED: Lazy<Arc<TypeCatalog>> = Lazy::new(|| Arc::new(TypeCatalog::discover()));

/// A set of known type descriptors.
#[derive(Debug, Default, Clone)]
pub struct TypeCatalog {
    types: HashMap<String, Arc<TypeInfo>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects every type registered with `#[derive(Injectable)]` in the
    /// final binary.
    pub fn discover() -> Self {
        let mut catalog = Self::new();
        for registration in inventory::iter::<TypeRegistration> {
            catalog.insert((registration.describe)());
        }
        debug!(types = catalog.len(), "Discovered injectable types");
        catalog
    }

    /// The process-wide discovered catalog, built on first use.
    pub fn discovered() -> Arc<TypeCatalog> {
        Arc::clone(&DISCOVERED)
    }

    pub fn register<T: Reflect>(&mut self) -> &mut Self {
        self.insert(T::type_info())
    }

    /// Adds a descriptor, replacing one with the same identifier.
    pub fn insert(&mut self, info: TypeInfo) -> &mut Self {
        self.types.insert(info.identifier.clone(), Arc::new(info));
        self
    }

    pub fn with<T: Reflect>(mut self) -> Self {
        self.register::<T>();
        self
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.types.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Introspector for TypeCatalog {
    fn inspect(&self, identifier: &str) -> Option<Arc<TypeInfo>> {
        self.types.get(identifier).cloned()
    }
}
