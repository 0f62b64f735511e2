//! Utilities to inject and resolve dependencies

use crate::{ServiceProvider, descriptor::ServiceLifetime, error::{BoxError, Error}};
use std::sync::Arc;

/// A trait that adds the ability to inject dependencies when resolving a type from the [`ServiceProvider`]
///
/// If there is no need to inject other dependencies, the `struct` must implement the `Default` trait
///
/// # Example
/// ```ignore
/// use keel::di::ServiceCollection;
///
/// #[derive(Default)]
/// struct ScopedService;
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped::<ScopedService>()?;
/// ```
///
/// If it's required to construct a `struct` from other dependencies, the `Inject` can be implemented manually
///
/// # Example
/// ```ignore
/// use std::sync::Arc;
/// use keel::di::{Inject, ServiceCollection, ServiceProvider, error::Error};
///
/// #[derive(Default)]
/// struct ScopedService;
///
/// struct TransientService {
///     service: Arc<ScopedService>
/// }
///
/// impl Inject for TransientService {
///     fn inject(provider: &ServiceProvider) -> Result<Self, Error> {
///         let service = provider.get_required_service::<ScopedService>()?;
///         Ok(Self { service })
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services
///     .add_scoped::<ScopedService>()?
///     .add_transient::<TransientService>()?;
/// ```
pub trait Inject: Sized + Send + Sync + 'static {
    /// Constructs `Self`, resolving its dependencies from `provider`
    fn inject(provider: &ServiceProvider) -> Result<Self, Error>;
}

impl<T: Default + Send + Sync + 'static> Inject for T {
    #[inline]
    fn inject(_: &ServiceProvider) -> Result<Self, Error> {
        Ok(Self::default())
    }
}

/// Declares that `Self` can be exposed under the service key `S`.
///
/// Every type implements it for itself. Use the [`implements!`](crate::implements) macro
/// to expose a type as a trait object.
pub trait Implements<S: ?Sized>: Send + Sync + 'static {
    /// Converts a shared implementation into a shared service
    fn upcast(self: Arc<Self>) -> Arc<S>;
}

impl<T: Send + Sync + 'static> Implements<T> for T {
    #[inline]
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// An `implements!` macro that declares one or more types as implementations of trait-object services.
///
/// # Macro Syntax
/// ```ignore
/// implements! {
///     Type1 => dyn Trait1,
///     Type2 => dyn Trait2,
/// }
/// ```
///
/// # Example
/// ```ignore
/// use keel::di::{implements, ServiceCollection};
///
/// trait Cache: Send + Sync {}
///
/// #[derive(Default)]
/// struct InMemoryCache;
///
/// impl Cache for InMemoryCache {}
///
/// implements! { InMemoryCache => dyn Cache }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_as::<dyn Cache, InMemoryCache>()?;
/// ```
#[macro_export]
macro_rules! implements {
    ($($implementation:ty => $service:ty),* $(,)?) => {
        $(impl $crate::Implements<$service> for $implementation {
            #[inline]
            fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$service> {
                self
            }
        })*
    };
}

/// A resource that is released when its owning provider is closed.
///
/// Closing is opted into per binding, see [`ServiceDescriptor::with_close`](crate::ServiceDescriptor::with_close).
pub trait Close: Send + Sync {
    /// Releases the resource
    fn close(&self) -> Result<(), BoxError>;
}

/// Declares the default service key and lifetime of a type,
/// used for registration by convention.
///
/// Usually derived with `#[derive(Service)]` when the `macros` feature is enabled.
///
/// # Example
/// ```ignore
/// use std::sync::Arc;
/// use keel::di::{Service, ServiceLifetime};
///
/// #[derive(Default)]
/// struct Clock;
///
/// impl Service for Clock {
///     type Contract = Self;
///     const LIFETIME: ServiceLifetime = ServiceLifetime::Singleton;
///
///     fn into_contract(self: Arc<Self>) -> Arc<Self> {
///         self
///     }
/// }
/// ```
pub trait Service: Inject {
    /// The service key under which the type is registered
    type Contract: ?Sized + Send + Sync + 'static;

    /// The lifetime of the registration
    const LIFETIME: ServiceLifetime;

    /// Converts a shared instance into the service key type
    fn into_contract(self: Arc<Self>) -> Arc<Self::Contract>;
}
