//! Kapsel DI resolves object graphs on demand from a pre-built registry of
//! factories, caches instances according to each factory's scoping policy and
//! enforces lifetime semantics across a tree of scopes.
//!
//! Kapsel DI is split into three major parts:
//! 1. [RegistryBuilder]/[FactoryRegistry]: the flat table of factories plus
//!    its lookup index, assembled once and consumed as data
//! 2. [Scope]: hierarchical cache node and the resolution entry point
//! 3. [InstanceFactory]/[ScopeFactory]: descriptions of how instances and
//!    capability holders are constructed
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use kapsel_di::{classifier, InstanceFactory, RegistryBuilder, Scope};
//!
//! struct Greeter {
//!     greeting: String,
//! }
//!
//! let mut builder = RegistryBuilder::new();
//! builder.factory(InstanceFactory::new(|_| {
//!     Ok(Greeter {
//!         greeting: "hello".to_owned(),
//!     })
//! }));
//!
//! let root = Scope::root(Arc::new(builder.build()));
//! let greeter = root.get_single::<Greeter>(classifier::NONE).unwrap();
//! assert_eq!(greeter.greeting, "hello");
//!
//! // Scoped factories cache: the same instance comes back.
//! let again = root.get_single::<Greeter>(classifier::NONE).unwrap();
//! assert!(Arc::ptr_eq(&greeter, &again));
//! ```
//!
//! Resolution is fully synchronous. Scopes may be shared between threads;
//! the per-call instantiation state never is.

pub mod errors;
pub mod factories;
pub mod registry;
pub mod scope;
pub mod selector;
pub mod types;

mod context;

pub use errors::{InstallError, ScopeError};
pub use factories::{FactoryId, InstanceFactory, ScopeFactory, Scoping};
pub use registry::{install, FactoryRegistry, RegistryBuilder};
pub use scope::{root_scope, Resolver, Scope};
pub use selector::{Selector, SelectorFilter};
pub use types::{classifier, DynError, Injectable, Instance, InstanceKey, TypeInfo};
