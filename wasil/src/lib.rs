//! # Wasil: Inversion-of-Control Container for Rust
//!
//! Services are named by string identifiers and built on demand. A type
//! describes its constructor and injectable properties once, usually with
//! `#[derive(Injectable)]`; the container reflects that description into a
//! definition, resolves dependencies recursively and caches what
//! [`Container::get`] returns.
//!
//! ```rust
//! use std::sync::Arc;
//! use wasil::{Container, Injectable};
//!
//! #[derive(Injectable)]
//! #[injectable(id = "greeter")]
//! struct Greeter {
//!     #[inject(default = "hello")]
//!     greeting: String,
//! }
//!
//! #[derive(Injectable)]
//! #[injectable(id = "front_desk")]
//! struct FrontDesk {
//!     #[inject(service)]
//!     greeter: Arc<Greeter>,
//! }
//!
//! let container = Container::default();
//! let desk = container.resolve::<FrontDesk>().unwrap();
//! assert_eq!(desk.greeter.greeting, "hello");
//! ```
//!
//! Definitions can be registered or adjusted explicitly with
//! [`Container::define`], [`Container::extend`] and [`Container::factory`],
//! and other containers can be consulted as delegates through
//! [`ContainerBuilder::delegate`].

pub use wasil_container::*;
pub use wasil_derive::*;
pub use wasil_support::*;

pub use serde_json;
