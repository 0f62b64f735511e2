//! Application host: lifecycle of hosted services and the service provider

use crate::{di::ServiceProvider, error::{Error, HostedFailure}};
use self::env::{Environment, HookPhase};
use std::{
    cmp::Reverse,
    fmt::{Debug, Formatter},
    future::Future,
    sync::Arc,
};
use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::sync::CancellationToken;

pub use self::{
    builder::HostBuilder,
    hosted_service::{HostedService, HostedServiceExt},
};

pub mod env;
pub mod hosted_service;
mod builder;

/// Runs [`HostedService`]s and owns the root [`ServiceProvider`].
///
/// `Host` is a cheap handle, clones share the same state.
///
/// # Example
/// ```no_run
/// use keel::Host;
///
/// # fn main() -> Result<(), keel::error::Error> {
/// let host = Host::builder().build()?;
///
/// let stopper = host.clone();
/// std::thread::spawn(move || stopper.environment().stop());
///
/// host.run()
/// # }
/// ```
#[derive(Clone)]
pub struct Host {
    inner: Arc<HostInner>,
}

struct HostInner {
    environment: Arc<Environment>,
    provider: ServiceProvider,
    exited: CancellationToken,
}

impl Debug for Host {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("environment", &self.inner.environment)
            .field("exited", &self.inner.exited.is_cancelled())
            .finish()
    }
}

/// Closes the provider and marks the run loop as exited, also when `run` unwinds
struct RunGuard<'a> {
    host: &'a Host,
    closed: bool,
}

impl RunGuard<'_> {
    fn close(mut self, result: Result<(), Error>) -> Result<(), Error> {
        self.closed = true;
        match (result, self.host.close()) {
            (Err(err), Err(close_err)) => {
                tracing::error!("failed to close services: {close_err:#}");
                Err(err)
            },
            (Err(err), Ok(())) => Err(err),
            (Ok(()), closed) => closed,
        }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.closed && let Err(err) = self.host.close() {
            tracing::error!("failed to close services: {err:#}");
        }
        self.host.inner.exited.cancel();
    }
}

impl Host {
    #[inline]
    pub(crate) fn new(environment: Arc<Environment>, provider: ServiceProvider) -> Self {
        let inner = HostInner {
            environment,
            provider,
            exited: CancellationToken::new(),
        };
        Self { inner: Arc::new(inner) }
    }

    /// Creates a new [`HostBuilder`]
    #[inline]
    pub fn builder() -> HostBuilder {
        HostBuilder::new()
    }

    /// Creates a new [`HostBuilder`], same as [`Host::builder`]
    #[inline]
    pub fn create_builder() -> HostBuilder {
        HostBuilder::new()
    }

    /// Returns the root [`ServiceProvider`]
    #[inline]
    pub fn service_provider(&self) -> &ServiceProvider {
        &self.inner.provider
    }

    /// Returns the host [`Environment`]
    #[inline]
    pub fn environment(&self) -> &Arc<Environment> {
        &self.inner.environment
    }

    /// Starts every hosted service in registration order.
    ///
    /// Runs the `starting` hooks before and the `started` hooks after.
    /// The first service that fails to start aborts the start.
    pub fn start(&self) -> Result<(), Error> {
        tracing::debug!("hosting starting");
        self.inner.environment.run_hooks(HookPhase::Starting);

        let services = self.inner.provider.get_services::<dyn HostedService>()?;
        for service in services {
            tracing::trace!("starting hosted service: {}", service.name());
            service
                .start()
                .map_err(|source| Error::Start { service: service.name(), source })?;
        }

        self.inner.environment.run_hooks(HookPhase::Started);
        tracing::debug!("hosting started");
        Ok(())
    }

    /// Stops every hosted service, highest [`HostedService::order`] first.
    ///
    /// Every service gets a stop attempt, failures are reported together in [`Error::Stop`].
    /// The `stopped` hooks run even if the services cannot be resolved.
    pub fn stop(&self) -> Result<(), Error> {
        tracing::debug!("hosting stopping");
        self.inner.environment.run_hooks(HookPhase::Stopping);

        let result = self.inner.provider
            .get_services::<dyn HostedService>()
            .map_err(Error::from)
            .and_then(Self::stop_services);

        self.inner.environment.run_hooks(HookPhase::Stopped);
        tracing::debug!("hosting stopped");
        result
    }

    fn stop_services(mut services: Vec<Arc<dyn HostedService>>) -> Result<(), Error> {
        services.reverse();
        services.sort_by_key(|service| Reverse(service.order()));

        let mut failures = Vec::new();
        for service in services {
            tracing::trace!("stopping hosted service: {}", service.name());
            if let Err(error) = service.stop() {
                tracing::error!("hosted service {} failed to stop: {error:#}", service.name());
                failures.push(HostedFailure { service: service.name(), error });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Stop(failures))
        }
    }

    /// Starts the host and blocks the current thread until [`Environment::stop`] is called,
    /// then stops the host.
    ///
    /// The service provider is closed on every exit path.
    pub fn run(&self) -> Result<(), Error> {
        let guard = RunGuard { host: self, closed: false };
        let result = self.start().and_then(|_| {
            self.wait_for_shutdown();
            self.stop()
        });
        guard.close(result)
    }

    /// Starts the host and returns immediately.
    ///
    /// Once [`Environment::stop`] is called, the spawned task stops the host and closes
    /// the service provider on a blocking thread. Its failures are logged.
    ///
    /// Requires a Tokio runtime.
    pub fn run_async(&self) -> Result<JoinHandle<()>, Error> {
        let handle = Handle::try_current()?;
        self.start()?;

        let host = self.clone();
        let shutdown = self.inner.environment.shutdown_token();
        let task = handle.spawn(async move {
            shutdown.cancelled().await;

            let exited = host.inner.exited.clone();
            let result = tokio::task::spawn_blocking(move || {
                if let Err(err) = host.stop() {
                    tracing::error!("failed to stop host: {err:#}");
                }
                if let Err(err) = host.close() {
                    tracing::error!("failed to close services: {err:#}");
                }
            }).await;

            if let Err(err) = result {
                tracing::error!("host shutdown task failed: {err:#}");
            }
            exited.cancel();
        });
        Ok(task)
    }

    /// Stops the host when `signal` completes, then waits for the run loop to exit
    /// for at most [`Environment::shutdown_timeout`].
    ///
    /// Requires a Tokio runtime.
    ///
    /// # Example
    /// ```no_run
    /// use keel::Host;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), keel::error::Error> {
    /// let host = Host::builder().build()?;
    /// let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    ///
    /// host.stop_on(rx)?;
    /// host.run_async()?;
    ///
    /// tx.send(()).unwrap();
    /// # Ok(())
    /// # }
    /// ```
    pub fn stop_on<F>(&self, signal: F) -> Result<JoinHandle<()>, Error>
    where
        F: Future + Send + 'static
    {
        let handle = Handle::try_current()?;
        let host = self.clone();
        let task = handle.spawn(async move {
            signal.await;
            tracing::debug!("stop signal received");

            let environment = host.environment();
            environment.stop();

            let timeout = environment.shutdown_timeout();
            let exited = host.inner.exited.cancelled();
            if tokio::time::timeout(timeout, exited).await.is_err() {
                tracing::warn!("host did not exit within {timeout:?}");
            }
        });
        Ok(task)
    }

    /// Stops the host on `Ctrl+C`, see [`Host::stop_on`]
    pub fn stop_on_ctrl_c(&self) -> Result<JoinHandle<()>, Error> {
        self.stop_on(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("unable to listen for shutdown signal: {err:#}");
                std::future::pending::<()>().await;
            }
        })
    }

    /// Blocks the current thread until [`Environment::stop`] is called
    #[inline]
    pub fn wait_for_shutdown(&self) {
        self.inner.environment.wait_for_shutdown();
    }

    /// Completes when [`Environment::stop`] is called
    pub async fn shutdown_requested(&self) {
        self.inner.environment
            .shutdown_token()
            .cancelled()
            .await;
    }

    /// Closes the root [`ServiceProvider`]. Calling it more than once has no further effect.
    #[inline]
    pub fn close(&self) -> Result<(), Error> {
        self.inner.provider
            .close()
            .map_err(Error::from)
    }
}
