//! Background services whose lifetime is bound to the [`Host`](crate::Host)

use crate::{
    di::{
        FromProvider,
        GenericFactory,
        Inject,
        Service,
        ServiceCollection,
        ServiceDescriptor,
        ServiceKey,
        ServiceLifetime,
        error::{BoxError, Error},
    },
};
use std::{any::type_name, sync::Arc};

/// A service started and stopped together with the [`Host`](crate::Host).
///
/// Services start in registration order. On stop they are sorted by [`HostedService::order`],
/// highest first; services with the same order stop in reverse registration order.
///
/// # Example
/// ```no_run
/// use keel::{HostedService, error::BoxError};
///
/// #[derive(Default)]
/// struct Poller;
///
/// impl HostedService for Poller {
///     fn start(&self) -> Result<(), BoxError> {
///         println!("polling...");
///         Ok(())
///     }
///
///     fn stop(&self) -> Result<(), BoxError> {
///         println!("done");
///         Ok(())
///     }
/// }
/// ```
pub trait HostedService: Send + Sync + 'static {
    /// Starts the service. A failure aborts the host start.
    fn start(&self) -> Result<(), BoxError>;

    /// Stops the service. A failure is collected and reported after every service was stopped.
    fn stop(&self) -> Result<(), BoxError>;

    /// Stop priority, services with a higher order stop first
    #[inline]
    fn order(&self) -> i32 {
        0
    }

    /// Service name used in logs and errors
    #[inline]
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

/// Registration of [`HostedService`]s in the [`ServiceCollection`].
///
/// Every method registers the concrete type as a singleton and a second binding
/// that exposes the same instance as `dyn HostedService`.
pub trait HostedServiceExt {
    /// Registers a hosted service constructed through [`Inject`]
    fn add_hosted_service<T>(&mut self) -> Result<&mut Self, Error>
    where
        T: HostedService + Inject;

    /// Registers an already created hosted service
    fn add_hosted_instance<T>(&mut self, instance: T) -> Result<&mut Self, Error>
    where
        T: HostedService;

    /// Registers a hosted service produced by a factory function
    fn add_hosted_factory<T, F, Args>(&mut self, factory: F) -> Result<&mut Self, Error>
    where
        T: HostedService,
        F: GenericFactory<Args, Output = T>,
        Args: FromProvider;

    /// Registers a hosted service declared through the [`Service`] trait.
    ///
    /// Fails with [`Error::InvalidLifetime`] unless the declared lifetime is singleton.
    fn add_hosted<T>(&mut self) -> Result<&mut Self, Error>
    where
        T: HostedService + Service;
}

impl HostedServiceExt for ServiceCollection {
    fn add_hosted_service<T>(&mut self) -> Result<&mut Self, Error>
    where
        T: HostedService + Inject
    {
        self.add_singleton::<T>()?
            .add(alias::<T, T>())
    }

    fn add_hosted_instance<T>(&mut self, instance: T) -> Result<&mut Self, Error>
    where
        T: HostedService
    {
        self.add_singleton_instance(instance)?
            .add(alias::<T, T>())
    }

    fn add_hosted_factory<T, F, Args>(&mut self, factory: F) -> Result<&mut Self, Error>
    where
        T: HostedService,
        F: GenericFactory<Args, Output = T>,
        Args: FromProvider
    {
        self.add_singleton_factory(factory)?
            .add(alias::<T, T>())
    }

    fn add_hosted<T>(&mut self) -> Result<&mut Self, Error>
    where
        T: HostedService + Service
    {
        if T::LIFETIME != ServiceLifetime::Singleton {
            return Err(Error::InvalidLifetime {
                service: type_name::<T>(),
                lifetime: T::LIFETIME,
            });
        }

        self.add_service::<T>()?;
        if ServiceKey::of::<T::Contract>() == ServiceKey::of::<dyn HostedService>() {
            Ok(self)
        } else {
            self.add(alias::<T::Contract, T>())
        }
    }
}

/// Binding of `dyn HostedService` that forwards to the singleton registered as `S => T`
fn alias<S, T>() -> ServiceDescriptor
where
    S: ?Sized + Send + Sync + 'static,
    T: HostedService
{
    ServiceDescriptor::from_fn::<dyn HostedService, T, _>(
        ServiceLifetime::Singleton,
        |provider| provider.get_implementation::<S, T>(),
        upcast::<T>,
    )
}

#[inline]
fn upcast<T: HostedService>(service: Arc<T>) -> Arc<dyn HostedService> {
    service
}
