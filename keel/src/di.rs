//! Tools for Dependency Injection

pub use keel_di::{
    Close,
    FromProvider,
    GenericFactory,
    Implements,
    Inject,
    Service,
    ServiceCollection,
    ServiceDescriptor,
    ServiceKey,
    ServiceLifetime,
    ServiceProvider,
    ServiceScope,
    implements,
};

pub mod error {
    //! Dependency injection errors
    pub use keel_di::error::{BoxError, Error};
}
