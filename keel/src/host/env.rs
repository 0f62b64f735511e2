//! Host Environment configuration

use crate::error::BoxError;
use parking_lot::{Condvar, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use std::{
    fmt::{Debug, Display, Formatter},
    panic::{AssertUnwindSafe, catch_unwind},
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::Duration,
};

/// Name of the development environment, the default one
pub const DEVELOPMENT: &str = "Development";

/// Name of the staging environment
pub const STAGING: &str = "Staging";

/// Name of the production environment
pub const PRODUCTION: &str = "Production";

/// Process variable that overrides the default environment name
pub const ENVIRONMENT_VAR: &str = "KEEL_ENVIRONMENT";

pub(crate) const GRACEFUL_SHUTDOWN_TIMEOUT: u64 = 10;

type Hook = Arc<
    dyn Fn() -> Result<(), BoxError>
    + Send
    + Sync
>;

/// Lifecycle phase a hook is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HookPhase {
    Starting,
    Started,
    Stopping,
    Stopped,
}

impl Display for HookPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            HookPhase::Starting => f.write_str("starting"),
            HookPhase::Started => f.write_str("started"),
            HookPhase::Stopping => f.write_str("stopping"),
            HookPhase::Stopped => f.write_str("stopped"),
        }
    }
}

#[derive(Default)]
struct Hooks {
    starting: Mutex<Vec<Hook>>,
    started: Mutex<Vec<Hook>>,
    stopping: Mutex<Vec<Hook>>,
    stopped: Mutex<Vec<Hook>>,
}

impl Hooks {
    #[inline]
    fn of(&self, phase: HookPhase) -> &Mutex<Vec<Hook>> {
        match phase {
            HookPhase::Starting => &self.starting,
            HookPhase::Started => &self.started,
            HookPhase::Stopping => &self.stopping,
            HookPhase::Stopped => &self.stopped,
        }
    }
}

/// Stop flag guarded by a condition variable, mirrored by a cancellation token for async waiters
#[derive(Default)]
struct ShutdownSignal {
    requested: Mutex<bool>,
    condvar: Condvar,
    token: CancellationToken,
}

impl ShutdownSignal {
    fn notify(&self) {
        let mut requested = self.requested.lock();
        *requested = true;
        self.condvar.notify_all();
        drop(requested);
        self.token.cancel();
    }

    fn wait(&self) {
        let mut requested = self.requested.lock();
        while !*requested {
            self.condvar.wait(&mut requested);
        }
    }

    #[inline]
    fn is_requested(&self) -> bool {
        *self.requested.lock()
    }
}

/// Describes the Hosting Environment: lifecycle hooks, stop signal,
/// environment name, content root and shutdown timeout.
///
/// The environment is shared by the host and registered as a singleton service,
/// so hosted services can resolve it to request a stop.
///
/// # Example
/// ```no_run
/// use keel::Host;
///
/// let host = Host::builder()
///     .configure_environment(|env| {
///         env.set_environment_name("Production");
///         env.add_started_hook(|| {
///             println!("started");
///             Ok(())
///         });
///     })
///     .build()
///     .unwrap();
/// ```
pub struct Environment {
    /// Default: `Development`
    name: RwLock<String>,

    /// Default: process working directory
    content_root: RwLock<PathBuf>,

    /// Default: 10 seconds
    shutdown_timeout: RwLock<Duration>,

    hooks: Hooks,
    signal: ShutdownSignal,
}

impl Debug for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("name", &*self.name.read())
            .field("content_root", &*self.content_root.read())
            .field("shutdown_timeout", &*self.shutdown_timeout.read())
            .field("stop_requested", &self.is_stop_requested())
            .finish()
    }
}

impl Default for Environment {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Creates a new [`Environment`] named after the `KEEL_ENVIRONMENT` variable,
    /// or `Development` when it is not set
    pub fn new() -> Self {
        let name = std::env::var(ENVIRONMENT_VAR)
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEVELOPMENT.to_string());
        let content_root = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."));

        Self {
            name: RwLock::new(name),
            content_root: RwLock::new(absolute(&content_root)),
            shutdown_timeout: RwLock::new(Duration::from_secs(GRACEFUL_SHUTDOWN_TIMEOUT)),
            hooks: Hooks::default(),
            signal: ShutdownSignal::default(),
        }
    }

    /// Registers a hook that runs before hosted services start
    pub fn add_starting_hook<F>(&self, hook: F) -> &Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static
    {
        self.add_hook(HookPhase::Starting, hook)
    }

    /// Registers a hook that runs after every hosted service has started
    pub fn add_started_hook<F>(&self, hook: F) -> &Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static
    {
        self.add_hook(HookPhase::Started, hook)
    }

    /// Registers a hook that runs before hosted services stop
    pub fn add_stopping_hook<F>(&self, hook: F) -> &Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static
    {
        self.add_hook(HookPhase::Stopping, hook)
    }

    /// Registers a hook that runs after every hosted service has been asked to stop
    pub fn add_stopped_hook<F>(&self, hook: F) -> &Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static
    {
        self.add_hook(HookPhase::Stopped, hook)
    }

    #[inline]
    fn add_hook<F>(&self, phase: HookPhase, hook: F) -> &Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static
    {
        self.hooks.of(phase).lock().push(Arc::new(hook));
        self
    }

    /// Runs the hooks of `phase` in registration order.
    ///
    /// Failures and panics are logged and never interrupt the phase.
    pub(crate) fn run_hooks(&self, phase: HookPhase) {
        let hooks = self.hooks.of(phase).lock().clone();
        for hook in hooks {
            match catch_unwind(AssertUnwindSafe(|| hook())) {
                Ok(Ok(())) => (),
                Ok(Err(err)) => tracing::error!("{phase} hook failed: {err:#}"),
                Err(_) => tracing::error!("{phase} hook panicked"),
            }
        }
    }

    /// Signals the host to stop. Calling it more than once has no further effect.
    pub fn stop(&self) {
        if !self.signal.is_requested() {
            tracing::trace!("stop requested");
        }
        self.signal.notify();
    }

    /// Returns `true` once [`Environment::stop`] has been called
    #[inline]
    pub fn is_stop_requested(&self) -> bool {
        self.signal.is_requested()
    }

    /// Blocks the current thread until [`Environment::stop`] is called
    #[inline]
    pub fn wait_for_shutdown(&self) {
        self.signal.wait();
    }

    /// Returns a token that is cancelled when [`Environment::stop`] is called
    #[inline]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.signal.token.clone()
    }

    /// Returns the environment name
    #[inline]
    pub fn environment_name(&self) -> String {
        self.name.read().clone()
    }

    /// Updates the environment name
    pub fn set_environment_name(&self, name: impl Into<String>) -> &Self {
        *self.name.write() = name.into();
        self
    }

    /// Returns the absolute, normalized content root
    #[inline]
    pub fn content_root(&self) -> PathBuf {
        self.content_root.read().clone()
    }

    /// Updates the content root. Relative paths are resolved against the working directory.
    pub fn set_content_root(&self, path: impl AsRef<Path>) -> &Self {
        *self.content_root.write() = absolute(path.as_ref());
        self
    }

    /// Returns how long a stop signal waits for the run loop to exit
    ///
    /// Default: 10 seconds
    #[inline]
    pub fn shutdown_timeout(&self) -> Duration {
        *self.shutdown_timeout.read()
    }

    /// Updates the shutdown timeout
    pub fn set_shutdown_timeout(&self, timeout: Duration) -> &Self {
        *self.shutdown_timeout.write() = timeout;
        self
    }

    /// Returns `true` if the environment name is `Development`, ignoring case
    #[inline]
    pub fn is_development(&self) -> bool {
        self.is_environment(DEVELOPMENT)
    }

    /// Returns `true` if the environment name is `Staging`, ignoring case
    #[inline]
    pub fn is_staging(&self) -> bool {
        self.is_environment(STAGING)
    }

    /// Returns `true` if the environment name is `Production`, ignoring case
    #[inline]
    pub fn is_production(&self) -> bool {
        self.is_environment(PRODUCTION)
    }

    /// Compares the environment name with `name`, ignoring case
    #[inline]
    pub fn is_environment(&self, name: &str) -> bool {
        self.name.read().eq_ignore_ascii_case(name)
    }
}

/// Makes `path` absolute and removes `.` and `..` components without touching the file system
fn absolute(path: &Path) -> PathBuf {
    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => (),
            Component::ParentDir => {
                normalized.pop();
            },
            other => normalized.push(other),
        }
    }
    normalized
}
