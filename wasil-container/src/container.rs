//! # The Container, heart of Wasil
//!
//! Resolves string identifiers into constructed instances, building
//! definitions by reflection on first use and caching what [`Container::get`]
//! returns.
//!
//! # Resolution
//! ```text
//! get(id) ──alias──> canonical id
//!            │
//!            ├── cached? ─────────────────────────────> instance
//!            ├── load_definition ── make ── create_object ── cache
//!            │                                 │
//!            │                                 └── get(dependency) (recursive)
//!            └── delegates[0..n].has(id)? ── delegate.get(id)  (not cached)
//! ```
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use wasil_container::prelude::*;
//!
//! #[derive(Default)]
//! struct Clock;
//! impl Service for Clock {}
//! impl Reflect for Clock {
//!     fn identifier() -> &'static str { "clock" }
//!     fn type_info() -> TypeInfo {
//!         TypeInfo::new::<Self, _>("clock", |_| Ok(Clock))
//!     }
//! }
//!
//! struct Scheduler {
//!     clock: Arc<Clock>,
//!     tick_ms: u64,
//! }
//! impl Service for Scheduler {}
//! impl Reflect for Scheduler {
//!     fn identifier() -> &'static str { "scheduler" }
//!     fn type_info() -> TypeInfo {
//!         TypeInfo::new::<Self, _>("scheduler", |args| {
//!             Ok(Scheduler { clock: args.shared(0)?, tick_ms: args.value(1)? })
//!         })
//!         .with_constructor([Param::of::<Clock>("clock"), Param::with_default("tick_ms", 250u64)])
//!     }
//! }
//!
//! let container = Container::builder()
//!     .catalog(TypeCatalog::new().with::<Clock>().with::<Scheduler>())
//!     .build();
//!
//! let scheduler = container.resolve::<Scheduler>().expect("scheduler");
//! let clock = container.resolve::<Clock>().expect("clock");
//! assert!(Arc::ptr_eq(&scheduler.clock, &clock));
//! assert_eq!(scheduler.tick_ms, 250);
//! ```

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, instrument, trace, warn};
use wasil_support::rendering::suggest_similar;

use crate::definition::ObjectDefinition;
use crate::error::{CircularReferenceError, DefinitionError, InjectorError, NotFoundError, Result};
use crate::graph::GraphValidator;
use crate::reference::{Reference, Target};
use crate::reflect::{
    Arguments, Config, Instance, Introspector, ParamKind, Reflect, Service, TypeCatalog,
    TypeInfo, Visibility,
};
use crate::registry::{DefinitionSlot, Registry};

/// Per-call constructor overrides, keyed by argument name.
pub type Parameters = HashMap<String, Instance>;

/// Name given to the config argument of a configurable type that declares
/// no constructor arguments.
const CONFIG_ARGUMENT: &str = "config";

/// How many "did you mean" candidates a not-found error carries.
const MAX_SUGGESTIONS: usize = 3;

// ═══════════════════════════════════════════
// ServiceLocator
// ═══════════════════════════════════════════

/// Anything that can answer `get`/`has` by identifier.
///
/// [`Container`] implements it; so can foreign registries used as
/// delegates.
pub trait ServiceLocator: Send + Sync {
    /// Returns the entry for `identifier`.
    fn get(&self, identifier: &str) -> Result<Instance>;

    /// `true` when `get(identifier)` would not fail with
    /// [`InjectorError::NotFound`].
    fn has(&self, identifier: &str) -> Result<bool>;
}

// ═══════════════════════════════════════════
// ContainerBuilder
// ═══════════════════════════════════════════

/// Builds a [`Container`].
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .catalog(TypeCatalog::new().with::<Database>())
///     .delegate(platform_container)
///     .build();
/// ```
pub struct ContainerBuilder {
    delegates: Vec<Arc<dyn ServiceLocator>>,
    introspector: Option<Arc<dyn Introspector>>,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            delegates: Vec::new(),
            introspector: None,
        }
    }

    /// Appends a fallback container. Delegates are consulted in the order
    /// they were added.
    pub fn delegate(self, delegate: Container) -> Self {
        self.delegate_locator(Arc::new(delegate))
    }

    /// Appends any [`ServiceLocator`] as a fallback.
    pub fn delegate_locator(mut self, delegate: Arc<dyn ServiceLocator>) -> Self {
        self.delegates.push(delegate);
        self
    }

    /// Replaces the default introspector (the discovered catalog).
    pub fn introspector(mut self, introspector: Arc<dyn Introspector>) -> Self {
        self.introspector = Some(introspector);
        self
    }

    /// Uses `catalog` instead of the discovered catalog.
    pub fn catalog(self, catalog: TypeCatalog) -> Self {
        self.introspector(Arc::new(catalog))
    }

    pub fn build(self) -> Container {
        let introspector = self
            .introspector
            .unwrap_or_else(|| TypeCatalog::discovered() as Arc<dyn Introspector>);

        debug!(delegates = self.delegates.len(), "Building container");
        Container {
            inner: Arc::new(Inner {
                registry: Registry::new(),
                loaded: DashMap::new(),
                registering: ReentrantMutex::new(()),
                loading: Mutex::new(HashMap::new()),
                delegates: self.delegates,
                introspector,
            }),
        }
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

struct Inner {
    registry: Registry,
    /// The singleton cache; each cell is built at most once.
    loaded: DashMap<String, Arc<OnceCell<Instance>>>,
    /// Held across read-modify-write registrations.
    registering: ReentrantMutex<()>,
    /// Identifiers under construction, per thread, in resolution order.
    loading: Mutex<HashMap<ThreadId, Vec<String>>>,
    delegates: Vec<Arc<dyn ServiceLocator>>,
    introspector: Arc<dyn Introspector>,
}

/// Inversion-of-control container.
///
/// A cheap handle: clones share definitions, aliases and the singleton
/// cache. Thread-safe: racing [`get`](Self::get) misses build the singleton
/// once, the other callers wait for it.
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

/// Weak handle given to container-aware services.
#[derive(Clone)]
pub struct ContainerRef {
    inner: Weak<Inner>,
}

impl ContainerRef {
    /// The container, if it is still alive.
    pub fn upgrade(&self) -> Option<Container> {
        self.inner.upgrade().map(|inner| Container { inner })
    }
}

impl fmt::Debug for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerRef")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Container {
    /// A container over the discovered catalog with the given delegates.
    pub fn new(delegates: Vec<Container>) -> Self {
        delegates
            .into_iter()
            .fold(Self::builder(), ContainerBuilder::delegate)
            .build()
    }

    /// Create a new builder.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub fn downgrade(&self) -> ContainerRef {
        ContainerRef {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ── Registration ──

    /// Registers a fresh definition for `identifier`, replacing any
    /// previous one, and lets `configure` fill it in.
    ///
    /// ```rust,ignore
    /// container.define("mailer", |definition| {
    ///     definition.have_constructor().have_argument("host").with_value("smtp.local");
    /// })?;
    /// ```
    pub fn define<F>(&self, identifier: &str, configure: F) -> Result<Arc<ObjectDefinition>>
    where
        F: FnOnce(&mut ObjectDefinition),
    {
        let _registering = self.inner.registering.lock();
        let mut definition = ObjectDefinition::new(identifier);
        configure(&mut definition);
        self.register(identifier, definition)
    }

    /// Registers a definition with no backing type, for factory-built
    /// services.
    pub fn with_definition<F>(&self, identifier: &str, configure: F) -> Result<Arc<ObjectDefinition>>
    where
        F: FnOnce(&mut ObjectDefinition),
    {
        let _registering = self.inner.registering.lock();
        let mut definition = ObjectDefinition::blank(identifier);
        configure(&mut definition);
        self.register(identifier, definition)
    }

    /// Registers `factory` as the whole construction of `identifier`.
    pub fn factory<F>(&self, identifier: &str, factory: F) -> Result<Arc<ObjectDefinition>>
    where
        F: Fn(&Container) -> Result<Instance> + Send + Sync + 'static,
    {
        self.with_definition(identifier, |definition| {
            definition.set_factory(factory);
        })
    }

    /// Applies `configure` to the current definition of `identifier`,
    /// reflecting it first if needed. `Ok(None)` when there is nothing to
    /// extend.
    ///
    /// Concurrent `define`/`extend` calls are applied one after another, so
    /// no edit is lost.
    pub fn extend<F>(&self, identifier: &str, configure: F) -> Result<Option<Arc<ObjectDefinition>>>
    where
        F: FnOnce(&mut ObjectDefinition),
    {
        let _registering = self.inner.registering.lock();
        let Some(current) = self.load_definition(identifier)? else {
            trace!(identifier, "Nothing to extend");
            return Ok(None);
        };

        let mut definition = ObjectDefinition::clone(&current);
        configure(&mut definition);
        self.register(identifier, definition).map(Some)
    }

    /// Makes every lookup of `alias` resolve `canonical` instead.
    pub fn alias(&self, canonical: &str, alias: &str) {
        self.inner.registry.register_alias(canonical, alias);
    }

    fn register(&self, identifier: &str, definition: ObjectDefinition) -> Result<Arc<ObjectDefinition>> {
        definition.validate()?;

        let definition = Arc::new(definition);
        self.inner
            .registry
            .store(identifier, DefinitionSlot::Defined(Arc::clone(&definition)));
        debug!(identifier, class = definition.class(), "Registered definition");
        Ok(definition)
    }

    // ── Definitions ──

    /// Returns the definition for `identifier`, reflecting it on first
    /// lookup. Results, including absence and reflection errors, are
    /// remembered for the container's lifetime.
    pub fn load_definition(&self, identifier: &str) -> Result<Option<Arc<ObjectDefinition>>> {
        if let Some(slot) = self.inner.registry.definition(identifier) {
            return slot_result(slot);
        }

        let slot = match self.type_info(identifier) {
            None => {
                trace!(identifier, "No constructible type");
                DefinitionSlot::Absent
            }
            Some(info) => match parse_definition(identifier, &info) {
                Ok(definition) => {
                    debug!(identifier, "Reflected definition");
                    DefinitionSlot::Defined(Arc::new(definition))
                }
                Err(err) => {
                    warn!(identifier, error = %err, "Reflection failed");
                    DefinitionSlot::Invalid(err)
                }
            },
        };

        slot_result(self.inner.registry.store_if_vacant(identifier, slot))
    }

    fn type_info(&self, class: &str) -> Option<Arc<TypeInfo>> {
        self.inner.registry.type_info_or_inspect(class, || {
            let info = self.inner.introspector.inspect(class);
            trace!(class, found = info.is_some(), "Introspected type");
            info
        })
    }

    // ── Resolution ──

    /// Finds an entry by identifier, building and caching it on first use.
    ///
    /// # Errors
    /// - [`InjectorError::NotFound`]: unknown here and in every delegate
    /// - [`InjectorError::Definition`]: the type failed to reflect
    /// - [`InjectorError::ConstructionFailed`]: building it failed
    /// - [`InjectorError::CircularReference`]: it depends on itself
    pub fn get(&self, identifier: &str) -> Result<Instance> {
        let identifier = self.canonical(identifier);
        trace!(identifier = %identifier, "Resolving");

        if let Some(instance) = self.cached(&identifier) {
            return Ok(instance);
        }

        if self.load_definition(&identifier)?.is_some() {
            let cell = self.singleton_cell(&identifier);
            // a re-entry on this thread would block on its own cell
            LoadingGuard::check(&self.inner.loading, &identifier)?;

            let instance = cell.get_or_try_init(|| {
                let instance = self.make(&identifier)?;
                debug!(identifier = %identifier, "Cached singleton");
                Ok::<_, InjectorError>(instance)
            })?;
            return Ok(Arc::clone(instance));
        }

        for delegate in &self.inner.delegates {
            if delegate.has(&identifier)? {
                trace!(identifier = %identifier, "Resolved by delegate");
                return delegate.get(&identifier);
            }
        }

        Err(self.not_found(&identifier))
    }

    /// [`get`](Self::get) followed by a downcast to `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, identifier: &str) -> Result<Arc<T>> {
        self.get(identifier)?.downcast::<T>().map_err(|_| {
            InjectorError::construction(
                identifier,
                format!("Type mismatch: expected {}", type_name::<T>()),
            )
        })
    }

    /// Resolves a reflectable type by its own identifier.
    ///
    /// ```rust,ignore
    /// let db: Arc<Database> = container.resolve()?;
    /// ```
    pub fn resolve<T: Reflect>(&self) -> Result<Arc<T>> {
        self.get_as::<T>(T::identifier())
    }

    /// `true` if a definition can be loaded here or a delegate has the
    /// identifier.
    ///
    /// Warms the definition memo; reflection errors surface here too.
    pub fn has(&self, identifier: &str) -> Result<bool> {
        let identifier = self.canonical(identifier);

        if self.load_definition(&identifier)?.is_some() {
            return Ok(true);
        }
        self.delegated_has(&identifier)
    }

    /// Builds a new instance, bypassing the singleton cache.
    ///
    /// Aliases are not applied; pass a canonical identifier or use
    /// [`get`](Self::get).
    pub fn make(&self, identifier: &str) -> Result<Instance> {
        self.make_with(identifier, &Parameters::new(), Config::new())
    }

    /// [`make`](Self::make) with named constructor overrides and, for
    /// configurable types, an options map for the last argument.
    #[instrument(skip(self, parameters, config), name = "container_make")]
    pub fn make_with(
        &self,
        identifier: &str,
        parameters: &Parameters,
        config: Config,
    ) -> Result<Instance> {
        let definition = self
            .load_definition(identifier)?
            .ok_or_else(|| self.not_found(identifier))?;

        let _loading = LoadingGuard::enter(&self.inner.loading, identifier)?;
        self.create_object(&definition, parameters, config)
    }

    /// Drops the cached singleton; the next [`get`](Self::get) rebuilds it.
    pub fn unset(&self, identifier: &str) {
        let identifier = self.canonical(identifier);
        let evicted = self.inner.loaded.remove(&identifier);
        if evicted.is_some_and(|(_, cell)| cell.get().is_some()) {
            debug!(identifier = %identifier, "Evicted singleton");
        }
    }

    /// `true` if `identifier` has a cached singleton in this container.
    pub fn is_loaded(&self, identifier: &str) -> bool {
        self.cached(&self.canonical(identifier)).is_some()
    }

    /// Walks the dependency graph below `roots` without building anything.
    ///
    /// # Errors
    /// - [`InjectorError::NotFound`]: a referent is unknown everywhere
    /// - [`InjectorError::CircularReference`]: the graph has a cycle
    /// - [`InjectorError::Definition`]: a type failed to reflect
    pub fn validate<I, S>(&self, roots: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        GraphValidator::new(self).validate(roots)
    }

    // ── Internals ──

    pub(crate) fn canonical(&self, identifier: &str) -> String {
        self.inner.registry.canonical(identifier)
    }

    pub(crate) fn delegated_has(&self, identifier: &str) -> Result<bool> {
        for delegate in &self.inner.delegates {
            if delegate.has(identifier)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn cached(&self, identifier: &str) -> Option<Instance> {
        self.inner
            .loaded
            .get(identifier)
            .and_then(|cell| cell.get().cloned())
    }

    fn singleton_cell(&self, identifier: &str) -> Arc<OnceCell<Instance>> {
        Arc::clone(self.inner.loaded.entry(identifier.to_string()).or_default().value())
    }

    fn create_object(
        &self,
        definition: &ObjectDefinition,
        parameters: &Parameters,
        config: Config,
    ) -> Result<Instance> {
        let identifier = definition.identifier();

        if let Some(factory) = definition.factory() {
            trace!(identifier, "Invoking factory");
            return factory(self).map_err(|err| InjectorError::construction(identifier, err));
        }

        let class = definition.class();
        if class.is_empty() {
            return Err(InjectorError::construction(
                identifier,
                "definition has neither a factory nor a class",
            ));
        }
        let info = self.type_info(class).ok_or_else(|| {
            InjectorError::construction(
                identifier,
                format!("no constructible type is registered as '{class}'"),
            )
        })?;

        let mut arguments = Vec::new();
        if let Some(constructor) = definition.constructor() {
            for reference in constructor.arguments() {
                let value = match parameters.get(reference.name()) {
                    Some(value) => Arc::clone(value),
                    None => self.resolve_reference(identifier, reference)?,
                };
                arguments.push((reference.name().to_string(), value));
            }
        }

        if info.is_configurable() {
            let config: Instance = Arc::new(config);
            match arguments.last_mut() {
                Some(last) => last.1 = config,
                None => arguments.push((CONFIG_ARGUMENT.to_string(), config)),
            }
        }

        let mut object = info
            .construct(&Arguments::new(arguments))
            .map_err(|err| InjectorError::construction(identifier, err))?;

        self.inject_properties(identifier, &info, object.as_mut(), definition.properties())?;
        object.attach_container(self.downgrade());

        debug!(identifier, class, "Constructed instance");
        Ok(object.into_instance())
    }

    fn inject_properties(
        &self,
        identifier: &str,
        info: &TypeInfo,
        object: &mut dyn Service,
        properties: &[Reference],
    ) -> Result<()> {
        for property in properties {
            let name = property.name();
            let slot = info.property_slot(name).ok_or_else(|| {
                InjectorError::construction(
                    identifier,
                    format!("{} has no injectable property '{name}'", info.identifier()),
                )
            })?;

            if slot.visibility() == Visibility::Private && !property.is_guarded() {
                return Err(InjectorError::construction(
                    identifier,
                    format!("property '{name}' is not public; inject it through a guarded reference"),
                ));
            }

            let value = self.resolve_reference(identifier, property)?;
            slot.write(object, value)
                .map_err(|err| InjectorError::construction(identifier, err))?;
            trace!(identifier, property = name, "Injected property");
        }

        Ok(())
    }

    fn resolve_reference(&self, identifier: &str, reference: &Reference) -> Result<Instance> {
        match reference.target() {
            Some(Target::Referent(referent)) => self.get(referent).map_err(|err| match err {
                InjectorError::NotFound(mut not_found) if not_found.required_by.is_none() => {
                    not_found.required_by = Some(identifier.to_string());
                    InjectorError::NotFound(not_found)
                }
                other => other,
            }),
            Some(Target::Value(value)) => Ok(Arc::clone(value)),
            None => Err(DefinitionError::UnboundReference {
                identifier: identifier.to_string(),
                reference: reference.name().to_string(),
            }
            .into()),
        }
    }

    pub(crate) fn not_found(&self, identifier: &str) -> InjectorError {
        let known = self.inner.registry.known_identifiers();
        InjectorError::NotFound(NotFoundError {
            requested: identifier.to_string(),
            required_by: None,
            suggestions: suggest_similar(identifier, &known, MAX_SUGGESTIONS),
        })
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ServiceLocator for Container {
    fn get(&self, identifier: &str) -> Result<Instance> {
        Container::get(self, identifier)
    }

    fn has(&self, identifier: &str) -> Result<bool> {
        Container::has(self, identifier)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("definitions", &self.inner.registry.len())
            .field(
                "loaded",
                &self.inner.loaded.iter().filter(|cell| cell.get().is_some()).count(),
            )
            .field("delegates", &self.inner.delegates.len())
            .finish()
    }
}

fn slot_result(slot: DefinitionSlot) -> Result<Option<Arc<ObjectDefinition>>> {
    match slot {
        DefinitionSlot::Defined(definition) => Ok(Some(definition)),
        DefinitionSlot::Absent => Ok(None),
        DefinitionSlot::Invalid(err) => Err(err.into()),
    }
}

/// Turns a type's signature into a definition.
fn parse_definition(
    identifier: &str,
    info: &TypeInfo,
) -> std::result::Result<ObjectDefinition, DefinitionError> {
    let mut definition = ObjectDefinition::new(identifier);

    if let Some(params) = info.params() {
        let constructor = definition.have_constructor();
        for param in params {
            let reference = constructor.have_argument(param.name());
            match param.kind() {
                ParamKind::Service(referent) => {
                    reference.reference_to(referent.as_str());
                }
                ParamKind::Default(value) => {
                    reference.with_instance(Arc::clone(value));
                }
                ParamKind::Untyped => {
                    return Err(DefinitionError::MissingDefault {
                        identifier: identifier.to_string(),
                        parameter: param.name().to_string(),
                    });
                }
            }
        }
    }

    for slot in info.properties() {
        let Some(target) = slot.injected() else {
            continue;
        };
        let reference = definition.have_property(slot.name());
        match target {
            Target::Referent(referent) => reference.reference_to(referent.as_str()),
            Target::Value(value) => reference.with_instance(Arc::clone(value)),
        };
        reference.guarded(slot.visibility() == Visibility::Private);
    }

    Ok(definition)
}

// ═══════════════════════════════════════════
// LoadingGuard
// ═══════════════════════════════════════════

/// Marks an identifier as under construction on this thread until dropped.
struct LoadingGuard<'a> {
    loading: &'a Mutex<HashMap<ThreadId, Vec<String>>>,
    thread: ThreadId,
}

impl<'a> LoadingGuard<'a> {
    fn enter(loading: &'a Mutex<HashMap<ThreadId, Vec<String>>>, identifier: &str) -> Result<Self> {
        let thread = thread::current().id();
        let mut paths = loading.lock();
        let path = paths.entry(thread).or_default();

        circular(path, identifier)?;
        path.push(identifier.to_string());
        Ok(Self { loading, thread })
    }

    /// Fails if `identifier` is already under construction on this thread.
    fn check(loading: &Mutex<HashMap<ThreadId, Vec<String>>>, identifier: &str) -> Result<()> {
        match loading.lock().get(&thread::current().id()) {
            Some(path) => circular(path, identifier),
            None => Ok(()),
        }
    }
}

fn circular(path: &[String], identifier: &str) -> Result<()> {
    let Some(start) = path.iter().position(|id| id == identifier) else {
        return Ok(());
    };

    let mut chain = path[start..].to_vec();
    chain.push(identifier.to_string());
    warn!(chain = ?chain, "Circular reference detected");
    Err(InjectorError::CircularReference(CircularReferenceError { chain }))
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut paths = self.loading.lock();
        if let Some(path) = paths.get_mut(&self.thread) {
            path.pop();
            if path.is_empty() {
                paths.remove(&self.thread);
            }
        }
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder, ContainerRef, Parameters, ServiceLocator};
    pub use crate::definition::ObjectDefinition;
    pub use crate::error::{InjectorError, Result};
    pub use crate::reflect::{
        Arguments, Config, Instance, Param, PropertySlot, Reflect, Service, TypeCatalog,
        TypeInfo, Visibility,
    };
    pub use crate::spec::ObjectSpec;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{Param, PropertySlot, cloned, shared};
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // === Types for tests ===

    #[derive(Default)]
    struct Logger {
        lines: Mutex<Vec<String>>,
    }

    impl Logger {
        fn log(&self, line: &str) {
            self.lines.lock().push(line.to_string());
        }
    }

    impl Service for Logger {}
    impl Reflect for Logger {
        fn identifier() -> &'static str {
            "Logger"
        }
        fn type_info() -> TypeInfo {
            TypeInfo::new::<Self, _>(Self::identifier(), |_| Ok(Logger::default()))
        }
    }

    struct Widget {
        logger: Arc<Logger>,
        name: String,
    }

    impl Service for Widget {}
    impl Reflect for Widget {
        fn identifier() -> &'static str {
            "Widget"
        }
        fn type_info() -> TypeInfo {
            TypeInfo::new::<Self, _>(Self::identifier(), |args| {
                Ok(Widget {
                    logger: args.shared(0)?,
                    name: args.value(1)?,
                })
            })
            .with_constructor([
                Param::of::<Logger>("logger"),
                Param::with_default("name", String::from("default")),
            ])
        }
    }

    struct Gadget {
        logger: Option<Arc<Logger>>,
        pub label: String,
    }

    impl Gadget {
        fn logger(&self) -> Option<&Arc<Logger>> {
            self.logger.as_ref()
        }
    }

    impl Service for Gadget {}
    impl Reflect for Gadget {
        fn identifier() -> &'static str {
            "Gadget"
        }
        fn type_info() -> TypeInfo {
            TypeInfo::new::<Self, _>(Self::identifier(), |_| {
                Ok(Gadget {
                    logger: None,
                    label: String::new(),
                })
            })
            .property(PropertySlot::new(
                "logger",
                Visibility::Private,
                |gadget: &mut Gadget, value| {
                    gadget.logger = Some(shared(&value, "logger")?);
                    Ok(())
                },
            ))
            .property(PropertySlot::new(
                "label",
                Visibility::Public,
                |gadget: &mut Gadget, value| {
                    gadget.label = cloned(&value, "label")?;
                    Ok(())
                },
            ))
        }
    }

    struct Broken;

    impl Service for Broken {}
    impl Reflect for Broken {
        fn identifier() -> &'static str {
            "Broken"
        }
        fn type_info() -> TypeInfo {
            TypeInfo::new::<Self, _>(Self::identifier(), |_| Ok(Broken))
                .with_constructor([Param::required("size")])
        }
    }

    struct Chicken;
    struct Egg;

    impl Service for Chicken {}
    impl Reflect for Chicken {
        fn identifier() -> &'static str {
            "Chicken"
        }
        fn type_info() -> TypeInfo {
            TypeInfo::new::<Self, _>(Self::identifier(), |_| Ok(Chicken))
                .with_constructor([Param::service("egg", "Egg")])
        }
    }

    impl Service for Egg {}
    impl Reflect for Egg {
        fn identifier() -> &'static str {
            "Egg"
        }
        fn type_info() -> TypeInfo {
            TypeInfo::new::<Self, _>(Self::identifier(), |_| Ok(Egg))
                .with_constructor([Param::service("chicken", "Chicken")])
        }
    }

    #[derive(Debug, Default, serde::Deserialize)]
    struct MailerOptions {
        #[serde(default)]
        retries: u8,
    }

    struct Mailer {
        transport: String,
        options: MailerOptions,
    }

    impl Service for Mailer {}
    impl Reflect for Mailer {
        fn identifier() -> &'static str {
            "Mailer"
        }
        fn type_info() -> TypeInfo {
            TypeInfo::new::<Self, _>(Self::identifier(), |args| {
                Ok(Mailer {
                    transport: args.value(0)?,
                    options: args.options(1)?,
                })
            })
            .with_constructor([
                Param::with_default("transport", String::from("smtp")),
                Param::with_default("config", Config::new()),
            ])
            .configurable()
        }
    }

    #[derive(Default)]
    struct Locator {
        container: Option<ContainerRef>,
    }

    impl Service for Locator {
        fn attach_container(&mut self, container: ContainerRef) {
            self.container = Some(container);
        }
    }

    impl Reflect for Locator {
        fn identifier() -> &'static str {
            "Locator"
        }
        fn type_info() -> TypeInfo {
            TypeInfo::new::<Self, _>(Self::identifier(), |_| Ok(Locator::default()))
        }
    }

    fn catalog() -> TypeCatalog {
        TypeCatalog::new()
            .with::<Logger>()
            .with::<Widget>()
            .with::<Gadget>()
            .with::<Broken>()
            .with::<Chicken>()
            .with::<Egg>()
            .with::<Mailer>()
            .with::<Locator>()
    }

    fn container() -> Container {
        Container::builder().catalog(catalog()).build()
    }

    struct CountingIntrospector {
        catalog: TypeCatalog,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingIntrospector {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                catalog: catalog(),
                calls: AtomicUsize::new(0),
                delay,
            })
        }
    }

    impl Introspector for CountingIntrospector {
        fn inspect(&self, identifier: &str) -> Option<Arc<TypeInfo>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.catalog.inspect(identifier)
        }
    }

    /// Runs `work` on `threads` threads released together.
    fn contended<F>(threads: usize, work: F)
    where
        F: Fn(usize) + Sync,
    {
        let barrier = Barrier::new(threads);
        thread::scope(|scope| {
            for i in 0..threads {
                let (barrier, work) = (&barrier, &work);
                scope.spawn(move || {
                    barrier.wait();
                    work(i);
                });
            }
        });
    }

    // === Singleton / transient ===

    #[test]
    fn get_returns_the_same_instance() {
        let container = container();

        let a = container.get_as::<Logger>("Logger").unwrap();
        let b = container.get_as::<Logger>("Logger").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(container.is_loaded("Logger"));
    }

    #[test]
    fn make_returns_fresh_instances() {
        let container = container();

        let a = container.make("Logger").unwrap();
        let b = container.make("Logger").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!container.is_loaded("Logger"));
    }

    #[test]
    fn constructor_injection_uses_singletons_and_defaults() {
        let container = container();

        let widget = container.resolve::<Widget>().unwrap();
        let logger = container.resolve::<Logger>().unwrap();

        assert_eq!(widget.name, "default");
        assert!(Arc::ptr_eq(&widget.logger, &logger));

        widget.logger.log("hello");
        assert_eq!(logger.lines.lock().as_slice(), ["hello"]);
    }

    #[test]
    fn unset_rebuilds_singleton() {
        let container = container();

        let first = container.resolve::<Widget>().unwrap();
        container.unset("Widget");
        assert!(!container.is_loaded("Widget"));
        let second = container.resolve::<Widget>().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        // dependencies stay cached
        assert!(Arc::ptr_eq(&first.logger, &second.logger));
    }

    #[test]
    fn singleton_built_once_under_contention() {
        let container = container();
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        container
            .factory("slow", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                Ok(Arc::new(String::from("slow")) as Instance)
            })
            .unwrap();

        let first = container.get("slow").unwrap();
        container.unset("slow");
        builds.store(0, Ordering::SeqCst);

        let instances = Mutex::new(Vec::new());
        contended(8, |_| {
            let instance = container.get("slow").unwrap();
            instances.lock().push(instance);
        });

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        let instances = instances.into_inner();
        assert_eq!(instances.len(), 8);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
        assert!(!Arc::ptr_eq(&first, &instances[0]));
    }

    #[test]
    fn factory_reentering_itself_is_circular() {
        let container = container();
        container.factory("loop", |c| c.get("loop")).unwrap();

        match container.get("loop").unwrap_err() {
            InjectorError::ConstructionFailed { identifier, source } => {
                assert_eq!(identifier, "loop");
                assert!(source.to_string().contains("loop → loop"));
            }
            other => panic!("Expected ConstructionFailed, got: {other:?}"),
        }
        assert!(!container.is_loaded("loop"));
    }

    // === Aliases ===

    #[test]
    fn alias_shares_the_cache_slot() {
        let container = container();
        container.alias("Logger", "log");

        let via_alias = container.get_as::<Logger>("log").unwrap();
        let direct = container.get_as::<Logger>("Logger").unwrap();
        assert!(Arc::ptr_eq(&via_alias, &direct));
        assert!(container.has("log").unwrap());

        container.unset("log");
        assert!(!container.is_loaded("Logger"));
    }

    // === Delegation ===

    #[test]
    fn delegate_supplies_missing_identifier() {
        let parent = container();
        let child = Container::builder()
            .catalog(TypeCatalog::new())
            .delegate(parent.clone())
            .build();

        assert!(child.has("Logger").unwrap());
        let from_child = child.get_as::<Logger>("Logger").unwrap();
        let from_parent = parent.get_as::<Logger>("Logger").unwrap();

        assert!(Arc::ptr_eq(&from_child, &from_parent));
        assert!(!child.is_loaded("Logger"));
        assert!(parent.is_loaded("Logger"));
    }

    #[test]
    fn delegates_consulted_in_order() {
        let first = Container::builder().catalog(TypeCatalog::new()).build();
        let second = Container::builder().catalog(TypeCatalog::new()).build();
        first
            .factory("region", |_| Ok(Arc::new("eu") as Instance))
            .unwrap();
        second
            .factory("region", |_| Ok(Arc::new("us") as Instance))
            .unwrap();

        let container = Container::builder()
            .catalog(TypeCatalog::new())
            .delegate(first)
            .delegate(second)
            .build();

        let region = container.get_as::<&str>("region").unwrap();
        assert_eq!(*region, "eu");
    }

    #[test]
    fn local_definition_wins_over_delegate() {
        let parent = container();
        let child = Container::builder()
            .catalog(catalog())
            .delegate(parent.clone())
            .build();

        child.get("Logger").unwrap();
        assert!(child.is_loaded("Logger"));
        assert!(!parent.is_loaded("Logger"));
    }

    #[test]
    fn unknown_everywhere_is_not_found() {
        let container = Container::builder()
            .catalog(catalog())
            .delegate(Container::builder().catalog(TypeCatalog::new()).build())
            .build();

        assert!(!container.has("Widgit").unwrap());
        match container.get("Widgit").unwrap_err() {
            InjectorError::NotFound(err) => {
                assert_eq!(err.requested, "Widgit");
                assert!(err.required_by.is_none());
            }
            other => panic!("Expected NotFound, got: {other:?}"),
        }
    }

    // === Reflection ===

    #[test]
    fn definition_lookup_is_memoized() {
        let introspector = CountingIntrospector::new(Duration::ZERO);
        let container = Container::builder()
            .introspector(introspector.clone())
            .build();

        assert!(container.load_definition("Nothing").unwrap().is_none());
        assert!(container.load_definition("Nothing").unwrap().is_none());
        assert!(!container.has("Nothing").unwrap());
        assert_eq!(introspector.calls.load(Ordering::SeqCst), 1);

        container.get("Widget").unwrap();
        container.make("Widget").unwrap();
        // Widget and Logger, once each
        assert_eq!(introspector.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn introspection_runs_once_under_contention() {
        let introspector = CountingIntrospector::new(Duration::from_millis(50));
        let container = Container::builder()
            .introspector(introspector.clone())
            .build();

        contended(8, |_| assert!(!container.has("ghost").unwrap()));
        assert_eq!(introspector.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reflected_definition_mirrors_signature() {
        let container = container();
        let definition = container.load_definition("Widget").unwrap().unwrap();

        let arguments = definition.constructor().unwrap().arguments();
        assert_eq!(arguments.len(), 2);
        assert_eq!(arguments[0].referent_name(), Some("Logger"));
        let name = arguments[1].value().unwrap();
        assert_eq!(name.downcast_ref::<String>().map(String::as_str), Some("default"));

        let logger = container.load_definition("Logger").unwrap().unwrap();
        assert!(logger.constructor().is_none());
    }

    #[test]
    fn missing_default_is_a_definition_error() {
        let introspector = CountingIntrospector::new(Duration::ZERO);
        let container = Container::builder()
            .introspector(introspector.clone())
            .build();

        for _ in 0..2 {
            match container.get("Broken").unwrap_err() {
                InjectorError::Definition(DefinitionError::MissingDefault { parameter, .. }) => {
                    assert_eq!(parameter, "size");
                }
                other => panic!("Expected Definition, got: {other:?}"),
            }
        }
        assert!(matches!(
            container.has("Broken"),
            Err(InjectorError::Definition(_))
        ));
        assert_eq!(introspector.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn define_replaces_reflected_definition() {
        let container = container();
        container
            .define("Broken", |definition| {
                definition.have_constructor().have_argument("size").with_value(4usize);
            })
            .unwrap();

        assert!(container.has("Broken").unwrap());
        assert!(container.get_as::<Broken>("Broken").is_ok());
    }

    // === Explicit registration ===

    #[test]
    fn define_under_arbitrary_name_with_class() {
        let container = container();
        container
            .define("widget.named", |definition| {
                definition.set_class("Widget");
                let constructor = definition.have_constructor();
                constructor.have_argument("logger").reference_to("Logger");
                constructor.have_argument("name").with_value(String::from("named"));
            })
            .unwrap();

        let widget = container.get_as::<Widget>("widget.named").unwrap();
        assert_eq!(widget.name, "named");
        assert!(Arc::ptr_eq(&widget.logger, &container.resolve::<Logger>().unwrap()));
    }

    #[test]
    fn define_rejects_unbound_reference() {
        let container = container();
        let result = container.define("Widget", |definition| {
            definition.have_constructor().have_argument("logger");
        });

        assert!(matches!(
            result,
            Err(InjectorError::Definition(DefinitionError::UnboundReference { .. }))
        ));
        // the reflected definition is still in place
        assert_eq!(container.resolve::<Widget>().unwrap().name, "default");
    }

    #[test]
    fn extend_mutates_reflected_definition() {
        let container = container();
        let extended = container
            .extend("Widget", |definition| {
                definition
                    .have_constructor()
                    .have_argument("name")
                    .with_value(String::from("extended"));
            })
            .unwrap();

        assert!(extended.is_some());
        assert_eq!(container.resolve::<Widget>().unwrap().name, "extended");
    }

    #[test]
    fn concurrent_extensions_keep_every_edit() {
        let container = container();

        contended(8, |i| {
            container
                .extend("Gadget", |definition| {
                    thread::sleep(Duration::from_millis(5));
                    definition.have_property(&format!("tag{i}")).with_value(i);
                })
                .unwrap();
        });

        let definition = container.load_definition("Gadget").unwrap().unwrap();
        let mut names: Vec<&str> = definition.properties().iter().map(Reference::name).collect();
        names.sort();
        assert_eq!(names, ["tag0", "tag1", "tag2", "tag3", "tag4", "tag5", "tag6", "tag7"]);
    }

    #[test]
    fn extend_unknown_is_a_no_op() {
        let container = container();
        let mut called = false;
        let extended = container.extend("Nothing", |_| called = true).unwrap();

        assert!(extended.is_none());
        assert!(!called);
        assert!(!container.has("Nothing").unwrap());
    }

    #[test]
    fn factory_bypasses_construction() {
        let container = container();
        container
            .factory("greeting", |c| {
                let logger = c.get_as::<Logger>("Logger")?;
                logger.log("factory ran");
                Ok(Arc::new(String::from("hi")) as Instance)
            })
            .unwrap();

        let greeting = container.get_as::<String>("greeting").unwrap();
        assert_eq!(greeting.as_str(), "hi");
        let logger = container.resolve::<Logger>().unwrap();
        assert_eq!(logger.lines.lock().len(), 1);
    }

    #[test]
    fn factory_failure_is_wrapped() {
        let container = container();
        container
            .factory("flaky", |c| c.get("Missing"))
            .unwrap();

        match container.get("flaky").unwrap_err() {
            InjectorError::ConstructionFailed { identifier, source } => {
                assert_eq!(identifier, "flaky");
                assert!(source.to_string().contains("Missing"));
            }
            other => panic!("Expected ConstructionFailed, got: {other:?}"),
        }
    }

    #[test]
    fn blank_definition_without_factory_fails() {
        let container = container();
        container.with_definition("empty", |_| {}).unwrap();

        assert!(container.has("empty").unwrap());
        assert!(matches!(
            container.get("empty"),
            Err(InjectorError::ConstructionFailed { .. })
        ));
    }

    // === Properties ===

    #[test]
    fn guarded_reference_writes_private_property() {
        let container = container();
        container
            .extend("Gadget", |definition| {
                definition.have_property("logger").reference_to("Logger").guarded(true);
                definition.have_property("label").with_value(String::from("shiny"));
            })
            .unwrap();

        let gadget = container.resolve::<Gadget>().unwrap();
        let logger = container.resolve::<Logger>().unwrap();
        assert!(Arc::ptr_eq(gadget.logger().unwrap(), &logger));
        assert_eq!(gadget.label, "shiny");
    }

    #[test]
    fn unguarded_reference_cannot_write_private_property() {
        let container = container();
        container
            .extend("Gadget", |definition| {
                definition.have_property("logger").reference_to("Logger");
            })
            .unwrap();

        match container.get("Gadget").unwrap_err() {
            InjectorError::ConstructionFailed { source, .. } => {
                assert!(source.to_string().contains("not public"));
            }
            other => panic!("Expected ConstructionFailed, got: {other:?}"),
        }
    }

    #[test]
    fn unknown_property_fails() {
        let container = container();
        container
            .extend("Gadget", |definition| {
                definition.have_property("colour").with_value("red");
            })
            .unwrap();

        assert!(matches!(
            container.get("Gadget"),
            Err(InjectorError::ConstructionFailed { .. })
        ));
    }

    #[test]
    fn missing_dependency_names_the_dependent() {
        let container = container();
        assert!(container.has("Logger").unwrap());
        container
            .extend("Gadget", |definition| {
                definition.have_property("logger").reference_to("Lodger").guarded(true);
            })
            .unwrap();

        match container.get("Gadget").unwrap_err() {
            InjectorError::NotFound(err) => {
                assert_eq!(err.requested, "Lodger");
                assert_eq!(err.required_by.as_deref(), Some("Gadget"));
                assert_eq!(err.suggestions, ["Logger"]);
            }
            other => panic!("Expected NotFound, got: {other:?}"),
        }
    }

    // === Cycles ===

    #[test]
    fn circular_reference_is_reported() {
        let container = container();

        match container.get("Chicken").unwrap_err() {
            InjectorError::CircularReference(err) => {
                assert_eq!(err.chain, ["Chicken", "Egg", "Chicken"]);
            }
            other => panic!("Expected CircularReference, got: {other:?}"),
        }

        // the in-progress marks were released
        container.define("Egg", |_| {}).unwrap();
        assert!(container.get("Chicken").is_ok());
    }

    #[test]
    fn validate_finds_cycles_without_building() {
        let container = container();
        assert!(container.validate(["Widget", "Gadget"]).is_ok());
        assert!(matches!(
            container.validate(["Chicken"]),
            Err(InjectorError::CircularReference(_))
        ));
        assert!(!container.is_loaded("Widget"));
    }

    // === Config and parameters ===

    #[test]
    fn configurable_type_receives_config() {
        let container = container();
        let mut config = Config::new();
        config.insert("retries".into(), serde_json::json!(5));

        let instance = container
            .make_with("Mailer", &Parameters::new(), config)
            .unwrap();
        let mailer = instance.downcast_ref::<Mailer>().unwrap();
        assert_eq!(mailer.options.retries, 5);
        assert_eq!(mailer.transport, "smtp");

        let plain = container.get_as::<Mailer>("Mailer").unwrap();
        assert_eq!(plain.options.retries, 0);
    }

    #[test]
    fn parameters_override_arguments_by_name() {
        let container = container();
        let mut parameters = Parameters::new();
        parameters.insert("name".into(), Arc::new(String::from("custom")) as Instance);

        let instance = container
            .make_with("Widget", &parameters, Config::new())
            .unwrap();
        let widget = instance.downcast_ref::<Widget>().unwrap();
        assert_eq!(widget.name, "custom");
    }

    // === Container awareness ===

    #[test]
    fn container_aware_service_gets_a_handle() {
        let container = container();
        let locator = container.resolve::<Locator>().unwrap();

        let handle = locator.container.as_ref().unwrap().upgrade().unwrap();
        assert!(Arc::ptr_eq(
            &handle.resolve::<Logger>().unwrap(),
            &container.resolve::<Logger>().unwrap()
        ));
    }

    #[test]
    fn get_as_reports_type_mismatch() {
        let container = container();
        match container.get_as::<Widget>("Logger") {
            Err(InjectorError::ConstructionFailed { source, .. }) => {
                assert!(source.to_string().contains("Type mismatch"));
            }
            Err(other) => panic!("Expected ConstructionFailed, got: {other:?}"),
            Ok(_) => panic!("Expected ConstructionFailed, got a Widget"),
        }
    }

    #[test]
    fn debug_display() {
        let container = container();
        container.get("Widget").unwrap();

        let debug = format!("{container:?}");
        assert!(debug.contains("Container"));
        assert!(debug.contains("loaded: 2"));
    }
}
