//! Core container implementation for Wasil DI.

pub mod container;
pub mod definition;
pub mod error;
mod graph;
pub mod reference;
pub mod reflect;
mod registry;
pub mod spec;

pub use container::{Container, ContainerBuilder, ContainerRef, Parameters, ServiceLocator, prelude};
pub use definition::{ConstructorDefinition, Factory, ObjectDefinition};
pub use error::{
    BoxError, CircularReferenceError, DefinitionError, InjectorError, NotFoundError, Result,
};
pub use reference::{Reference, Target};
pub use reflect::{
    ArgumentError, Arguments, AsAny, Config, Instance, Introspector, Param, ParamKind,
    PropertySlot, Reflect, Service, TypeCatalog, TypeInfo, TypeRegistration, Visibility, cloned,
    identifier_of, shared,
};
pub use spec::ObjectSpec;

#[doc(hidden)]
pub use inventory;
