//! # Keel
//!
//! > Dependency injection and application hosting lifecycle for Rust.
//!
//! ## Features
//! * Singleton, scoped and transient services
//! * Cycle and captive dependency detection
//! * Deterministic release of owned resources
//! * Hosted services with ordered start and stop
//! * Blocking and [Tokio](https://tokio.rs/) driven run loops
//!
//! ## Example
//! ```toml
//! [dependencies]
//! keel = "0.1.0"
//! tokio = { version = "1", features = ["full"] }
//! ```
//! ```no_run
//! use keel::{Host, HostedService, HostedServiceExt, error::BoxError};
//!
//! #[derive(Default)]
//! struct Worker;
//!
//! impl HostedService for Worker {
//!     fn start(&self) -> Result<(), BoxError> {
//!         println!("worker started");
//!         Ok(())
//!     }
//!
//!     fn stop(&self) -> Result<(), BoxError> {
//!         println!("worker stopped");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), keel::error::Error> {
//!     let host = Host::builder()
//!         .configure_services(|services| {
//!             services.add_hosted_service::<Worker>()?;
//!             Ok(())
//!         })?
//!         .build()?;
//!
//!     host.stop_on_ctrl_c()?;
//!     host.run_async()?.await.ok();
//!     Ok(())
//! }
//! ```

pub mod di;
pub mod error;
pub mod host;

pub use crate::host::{
    Host,
    HostBuilder,
    HostedService,
    HostedServiceExt,
    env::Environment,
};
