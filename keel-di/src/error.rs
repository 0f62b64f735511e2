//! Describes dependency injection errors

use crate::descriptor::ServiceLifetime;
use thiserror::Error as ThisError;

/// A boxed error produced by user code: factories, constructors and [`Close`](crate::Close) implementations
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while registering, resolving or closing services
#[derive(Debug, ThisError)]
pub enum Error {
    /// The same service/implementation pair has been registered twice
    #[error("Services Error: service already registered: {service} => {implementation}")]
    DuplicateBinding {
        /// Service key
        service: &'static str,
        /// Implementation key
        implementation: &'static str,
    },

    /// The service declares a lifetime that is not allowed in the current context
    #[error("Services Error: service {service} cannot be {lifetime}")]
    InvalidLifetime {
        /// Service key
        service: &'static str,
        /// Declared lifetime
        lifetime: ServiceLifetime,
    },

    /// No binding matches the requested service key
    #[error("Services Error: service not registered: {0}")]
    NotRegistered(&'static str),

    /// A scoped service was requested from the root provider
    #[error("Services Error: cannot resolve scoped service from the root provider: {0}")]
    ScopedFromRoot(&'static str),

    /// A singleton tried to capture a scoped dependency
    #[error("Services Error: scoped service {scoped} cannot be captured by singleton {singleton}")]
    CaptiveDependency {
        /// The scoped dependency
        scoped: &'static str,
        /// The singleton that requested it
        singleton: &'static str,
    },

    /// The requested service depends on itself
    #[error("Services Error: cyclic dependency detected: {}", .0.join(" -> "))]
    CyclicDependency(Vec<&'static str>),

    /// Construction of a service failed, `source` holds the proximate cause
    #[error("Services Error: unable to resolve the service: {service}: {source}")]
    ResolveFailed {
        /// The service that failed to construct
        service: &'static str,
        /// The proximate cause
        source: Box<Error>,
    },

    /// A cached instance could not be converted into the requested type
    #[error("Services Error: resolved instance has unexpected type: {0}")]
    TypeMismatch(&'static str),

    /// The provider has already been closed
    #[error("Services Error: service provider is closed")]
    ProviderClosed,

    /// An error raised by a user-provided factory or constructor
    #[error("Services Error: {0}")]
    Other(BoxError),

    /// One or more owned services failed to close
    #[error("Services Error: failed to close {} service(s): {}", .0.len(), join_errors(.0))]
    Close(Vec<BoxError>),
}

impl Error {
    /// Wraps an arbitrary error raised by a user-provided factory or constructor
    #[inline]
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }

    /// Walks through nested [`Error::ResolveFailed`] wrappers and returns the innermost cause
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::ResolveFailed { source, .. } = current {
            current = source;
        }
        current
    }

    /// Returns the chain of services that were being constructed when the error occurred,
    /// outermost first
    pub fn resolution_chain(&self) -> Vec<&'static str> {
        let mut chain = Vec::new();
        let mut current = self;
        while let Error::ResolveFailed { service, source } = current {
            chain.push(*service);
            current = source;
        }
        chain
    }
}

fn join_errors(errors: &[BoxError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_formats_cyclic_dependency() {
        let err = Error::CyclicDependency(vec!["A", "B", "A"]);

        assert_eq!(err.to_string(), "Services Error: cyclic dependency detected: A -> B -> A");
    }

    #[test]
    fn it_formats_not_registered() {
        let err = Error::NotRegistered("my_crate::Cache");

        assert_eq!(err.to_string(), "Services Error: service not registered: my_crate::Cache");
    }

    #[test]
    fn it_formats_invalid_lifetime() {
        let err = Error::InvalidLifetime { service: "Worker", lifetime: ServiceLifetime::Scoped };

        assert_eq!(err.to_string(), "Services Error: service Worker cannot be scoped");
    }

    #[test]
    fn it_finds_root_cause_and_chain() {
        let err = Error::ResolveFailed {
            service: "A",
            source: Box::new(Error::ResolveFailed {
                service: "B",
                source: Box::new(Error::NotRegistered("C")),
            }),
        };

        assert!(matches!(err.root_cause(), Error::NotRegistered("C")));
        assert_eq!(err.resolution_chain(), vec!["A", "B"]);
    }

    #[test]
    fn it_enumerates_close_failures() {
        let err = Error::Close(vec!["first".into(), "second".into()]);

        assert_eq!(err.to_string(), "Services Error: failed to close 2 service(s): first; second");
    }
}
