//! Builder for the [`Host`]

use super::{Host, env::Environment};
use crate::{
    di::{ServiceCollection, ServiceDescriptor, ServiceLifetime, error::Error as DiError},
    error::Error,
};
use std::{fmt::{Debug, Formatter}, sync::Arc};

/// Collects the environment settings and service registrations of a [`Host`].
///
/// # Example
/// ```no_run
/// use keel::{Host, HostedServiceExt};
/// # use keel::{HostedService, error::BoxError};
/// # #[derive(Default)]
/// # struct Worker;
/// # impl HostedService for Worker {
/// #     fn start(&self) -> Result<(), BoxError> { Ok(()) }
/// #     fn stop(&self) -> Result<(), BoxError> { Ok(()) }
/// # }
///
/// # fn main() -> Result<(), keel::error::Error> {
/// let host = Host::builder()
///     .configure_environment(|env| {
///         env.set_environment_name("Staging");
///     })
///     .configure_services(|services| {
///         services.add_hosted_service::<Worker>()?;
///         Ok(())
///     })?
///     .build()?;
///
/// host.run()
/// # }
/// ```
pub struct HostBuilder {
    environment: Arc<Environment>,
    services: ServiceCollection,
}

impl Debug for HostBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBuilder")
            .field("environment", &self.environment)
            .field("services", &self.services.len())
            .finish()
    }
}

impl Default for HostBuilder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl HostBuilder {
    /// Creates a new [`HostBuilder`] with the default [`Environment`] and no services
    pub fn new() -> Self {
        Self {
            environment: Arc::new(Environment::new()),
            services: ServiceCollection::new(),
        }
    }

    /// Configures the host [`Environment`]: name, content root, shutdown timeout and hooks
    pub fn configure_environment<F>(self, config: F) -> Self
    where
        F: FnOnce(&Environment)
    {
        config(&self.environment);
        self
    }

    /// Registers services in the host container
    pub fn configure_services<F>(mut self, config: F) -> Result<Self, Error>
    where
        F: FnOnce(&mut ServiceCollection) -> Result<(), DiError>
    {
        config(&mut self.services)?;
        Ok(self)
    }

    /// Returns the environment being configured
    #[inline]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Builds the [`Host`].
    ///
    /// The [`Environment`] is registered as a singleton service, so it can't be registered manually.
    pub fn build(mut self) -> Result<Host, Error> {
        let environment = self.environment.clone();
        self.services.add(ServiceDescriptor::from_fn::<Environment, Environment, _>(
            ServiceLifetime::Singleton,
            move |_| Ok(environment.clone()),
            |environment| environment,
        ))?;

        tracing::debug!(
            "building host for {} environment",
            self.environment.environment_name()
        );
        let provider = self.services.build_provider();
        Ok(Host::new(self.environment, provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Default)]
    struct Clock;

    #[test]
    fn it_configures_environment() {
        let builder = HostBuilder::new()
            .configure_environment(|env| {
                env.set_environment_name("Staging")
                    .set_shutdown_timeout(Duration::from_secs(1));
            });

        assert!(builder.environment().is_staging());
        assert_eq!(builder.environment().shutdown_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn it_registers_environment_as_singleton() {
        let host = HostBuilder::new()
            .configure_environment(|env| {
                env.set_environment_name("Production");
            })
            .build()
            .unwrap();

        let env = host.service_provider().get_required_service::<Environment>().unwrap();

        assert!(env.is_production());
        assert!(Arc::ptr_eq(&env, host.environment()));
    }

    #[test]
    fn it_propagates_registration_errors() {
        let result = HostBuilder::new()
            .configure_services(|services| {
                services.add_singleton::<Clock>()?;
                services.add_singleton::<Clock>()?;
                Ok(())
            });

        assert!(matches!(result, Err(Error::Services(DiError::DuplicateBinding { .. }))));
    }

    #[test]
    fn it_rejects_manual_environment_registration() {
        let result = HostBuilder::new()
            .configure_services(|services| {
                services.add_singleton::<Environment>()?;
                Ok(())
            })
            .unwrap()
            .build();

        assert!(matches!(result, Err(Error::Services(DiError::DuplicateBinding { .. }))));
    }
}
