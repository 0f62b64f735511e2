//! Bounded resolution context with its own scoped-instance cache

use crate::{ServiceProvider, error::Error};
use std::ops::Deref;

/// Owns a non-root [`ServiceProvider`] created by [`ServiceProvider::create_scope`].
///
/// Closing the scope closes only the instances it created. A scope that is dropped
/// while still open is closed on drop and close failures are logged.
///
/// # Example
/// ```ignore
/// let provider = services.build_provider();
/// {
///     let scope = provider.create_scope();
///     let unit_of_work = scope.get_required_service::<UnitOfWork>()?;
///     // ...
///     scope.close()?;
/// }
/// ```
#[derive(Debug)]
pub struct ServiceScope {
    provider: ServiceProvider,
}

impl ServiceScope {
    #[inline]
    pub(crate) fn new(provider: ServiceProvider) -> Self {
        Self { provider }
    }

    /// Returns the provider of this scope
    #[inline]
    pub fn service_provider(&self) -> &ServiceProvider {
        &self.provider
    }

    /// Closes the scope. Subsequent calls are no-ops.
    #[inline]
    pub fn close(&self) -> Result<(), Error> {
        self.provider.close()
    }
}

impl Deref for ServiceScope {
    type Target = ServiceProvider;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.provider
    }
}

impl Drop for ServiceScope {
    fn drop(&mut self) {
        if let Err(err) = self.provider.close() {
            tracing::warn!("failed to close service scope: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Close, ServiceCollection, ServiceDescriptor, ServiceLifetime, error::BoxError};
    use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};

    #[derive(Default)]
    struct Session {
        closed: AtomicUsize,
    }

    impl Close for Session {
        fn close(&self) -> Result<(), BoxError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn provider() -> crate::ServiceProvider {
        let mut services = ServiceCollection::new();
        services
            .add(ServiceDescriptor::activated::<Session, Session>(ServiceLifetime::Scoped)
                .with_close::<Session>())
            .unwrap();
        services.build_provider()
    }

    #[test]
    fn it_closes_scope_once() {
        let provider = provider();
        let scope = provider.create_scope();
        let session = scope.get_required_service::<Session>().unwrap();

        scope.close().unwrap();
        scope.close().unwrap();
        drop(scope);

        assert_eq!(session.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn it_closes_scope_on_drop() {
        let provider = provider();
        let session = {
            let scope = provider.create_scope();
            scope.get_required_service::<Session>().unwrap()
        };

        assert_eq!(session.closed.load(Ordering::SeqCst), 1);
        assert!(!provider.is_closed());
    }

    #[test]
    fn it_chains_nested_scopes_to_root() {
        let provider = provider();
        let outer = provider.create_scope();
        let inner = outer.create_scope();

        let outer_session = outer.get_required_service::<Session>().unwrap();
        let inner_session = inner.get_required_service::<Session>().unwrap();

        assert!(!inner.is_root());
        assert!(!Arc::ptr_eq(&outer_session, &inner_session));

        drop(inner);
        assert_eq!(outer_session.closed.load(Ordering::SeqCst), 0);
        assert_eq!(inner_session.closed.load(Ordering::SeqCst), 1);
    }
}
