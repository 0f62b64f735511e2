//! Tools for dependency injection
//!
//! Bindings are registered in a [`ServiceCollection`], which builds a root [`ServiceProvider`].
//! The provider creates instances on demand and applies one of three lifetimes:
//! - **Singleton**: one instance, cached at the root and shared with every scope.
//! - **Scoped**: one instance per [`ServiceScope`], never resolvable from the root.
//! - **Transient**: a new instance per resolution.
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use keel_di::{ServiceCollection, ServiceProvider, Inject, error::Error};
//!
//! #[derive(Default)]
//! struct Clock;
//!
//! struct Greeter {
//!     clock: Arc<Clock>
//! }
//!
//! impl Inject for Greeter {
//!     fn inject(provider: &ServiceProvider) -> Result<Self, Error> {
//!         let clock = provider.get_required_service::<Clock>()?;
//!         Ok(Self { clock })
//!     }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services
//!     .add_singleton::<Clock>()?
//!     .add_scoped::<Greeter>()?;
//!
//! let provider = services.build_provider();
//! let scope = provider.create_scope();
//! let greeter = scope.get_required_service::<Greeter>()?;
//! ```

pub use crate::{
    collection::ServiceCollection,
    descriptor::{ServiceDescriptor, ServiceKey, ServiceLifetime},
    inject::{Close, Implements, Inject, Service},
    provider::{FromProvider, GenericFactory, ServiceProvider},
    scope::ServiceScope,
};

#[cfg(feature = "macros")]
pub use keel_macros::Service;

pub mod error;
pub mod collection;
pub mod descriptor;
pub mod inject;
pub mod provider;
pub mod scope;
