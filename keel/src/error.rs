//! Error Handling tools

use thiserror::Error as ThisError;

pub use crate::di::error::BoxError;

/// Errors produced by the host while building, starting or stopping
#[derive(Debug, ThisError)]
pub enum Error {
    /// Registration or resolution error from the service provider
    #[error(transparent)]
    Services(#[from] crate::di::error::Error),

    /// A hosted service failed to start
    #[error("Host Error: hosted service {service} failed to start: {source}")]
    Start {
        /// Name of the hosted service
        service: &'static str,
        /// The error returned by the service
        source: BoxError,
    },

    /// One or more hosted services failed to stop
    #[error("Host Error: {} hosted service(s) failed to stop: {}", .0.len(), join_failures(.0))]
    Stop(Vec<HostedFailure>),

    /// The operation requires a Tokio runtime
    #[error("Host Error: no Tokio runtime is available: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

/// A failure of a single hosted service
#[derive(Debug, ThisError)]
#[error("{service}: {error}")]
pub struct HostedFailure {
    /// Name of the hosted service
    pub service: &'static str,
    /// The error returned by the service
    pub error: BoxError,
}

impl Error {
    /// Returns the failures collected while stopping hosted services
    #[inline]
    pub fn stop_failures(&self) -> &[HostedFailure] {
        match self {
            Error::Stop(failures) => failures.as_slice(),
            _ => &[],
        }
    }
}

fn join_failures(failures: &[HostedFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
