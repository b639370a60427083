//! Procedural macros for Wasil.
//!
//! - `#[derive(Injectable)]` describes a struct to the container: its
//!   constructor parameters, injectable properties and identifier.
//!
//! Generated code refers to the `wasil` facade crate.

use proc_macro::TokenStream;

mod injectable;

/// Derive macro making a struct constructible by a Wasil container.
///
/// Generates `Reflect`, `Service` (unless `custom_service`) and a catalog
/// registration so `Container::default()` finds the type without manual
/// wiring.
///
/// # Attributes
///
/// On the struct:
/// - `#[injectable(id = "mailer")]`: identifier, defaults to the type name
/// - `#[injectable(custom_service)]`: write `impl Service` yourself, e.g.
///   to receive the container handle
///
/// On fields (constructor parameters, in declaration order):
/// - `#[inject(service)]`: resolve `T` of an `Arc<T>` field from the
///   container; other field types are a compile error
/// - `#[inject(service = "id")]`: resolve an explicit identifier
/// - `#[inject(default = 30)]`: literal used unless a definition overrides it
/// - `#[inject(config)]`: last field; receives the caller's options
///   deserialized with serde
/// - no attribute: a required parameter; reflection fails until a
///   definition binds it
///
/// Fields marked `#[inject(property)]` are not constructor parameters: they
/// start as `Default::default()` and are written after construction.
/// Add `service` or `default` to wire them automatically. Non-`pub`
/// properties are only written by guarded references.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use wasil::Injectable;
///
/// #[derive(Injectable)]
/// #[injectable(id = "newsletter")]
/// pub struct Newsletter {
///     #[inject(service)]
///     mailer: Arc<Mailer>,
///     #[inject(default = "weekly")]
///     cadence: String,
///     #[inject(property, service)]
///     audit: Option<Arc<AuditLog>>,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(injectable, inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable_impl(input)
}
