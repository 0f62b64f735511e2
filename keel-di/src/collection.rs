//! Registry of service bindings

use crate::{
    Close,
    Implements,
    Inject,
    Service,
    ServiceProvider,
    descriptor::{ServiceDescriptor, ServiceKey, ServiceLifetime},
    error::Error,
    provider::{FromProvider, GenericFactory, Registry},
};
use indexmap::IndexMap;
use std::sync::Arc;

/// Insertion-ordered set of bindings, unique by service and implementation key.
///
/// The collection is only a configuration: [`ServiceCollection::build_provider`] takes
/// a snapshot, and later changes never reach providers that were already built.
///
/// # Example
/// ```ignore
/// use keel::di::ServiceCollection;
///
/// let mut services = ServiceCollection::new();
/// services
///     .add_singleton::<Clock>()?
///     .add_scoped::<UnitOfWork>()?
///     .add_transient_factory(|clock: Arc<Clock>| Ok(Stopwatch::new(clock)))?;
///
/// let provider = services.build_provider();
/// ```
#[derive(Debug, Default, Clone)]
pub struct ServiceCollection {
    descriptors: IndexMap<(ServiceKey, ServiceKey), ServiceDescriptor>,
}

impl ServiceCollection {
    /// Creates an empty collection
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding, failing if the same service/implementation pair is already registered
    pub fn add(&mut self, descriptor: ServiceDescriptor) -> Result<&mut Self, Error> {
        let service = descriptor.service_key();
        let implementation = descriptor.implementation_key();
        let key = (service, implementation);

        if self.descriptors.contains_key(&key) {
            return Err(Error::DuplicateBinding {
                service: service.name(),
                implementation: implementation.name(),
            });
        }

        tracing::trace!(
            "registered {} service {} => {}",
            descriptor.lifetime(),
            service.name(),
            implementation.name()
        );
        self.descriptors.insert(key, descriptor);
        Ok(self)
    }

    /// Registers a type by convention, using the key and lifetime declared by its [`Service`] implementation
    #[inline]
    pub fn add_service<T: Service>(&mut self) -> Result<&mut Self, Error> {
        self.add(ServiceDescriptor::convention::<T>())
    }

    /// Registers a singleton service constructed through [`Inject`]
    #[inline]
    pub fn add_singleton<T: Inject>(&mut self) -> Result<&mut Self, Error> {
        self.add_singleton_as::<T, T>()
    }

    /// Registers a singleton implementation `I` under the service key `S`
    #[inline]
    pub fn add_singleton_as<S, I>(&mut self) -> Result<&mut Self, Error>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Inject + Implements<S>,
    {
        self.add(ServiceDescriptor::activated::<S, I>(ServiceLifetime::Singleton))
    }

    /// Registers an existing instance as a singleton
    #[inline]
    pub fn add_singleton_instance<T: Send + Sync + 'static>(&mut self, instance: T) -> Result<&mut Self, Error> {
        self.add_singleton_instance_as::<T, T>(instance)
    }

    /// Registers an existing instance as a singleton under the service key `S`
    #[inline]
    pub fn add_singleton_instance_as<S, I>(&mut self, instance: I) -> Result<&mut Self, Error>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Implements<S>,
    {
        self.add(ServiceDescriptor::instance::<S, I>(instance))
    }

    /// Registers a singleton service created by a factory
    #[inline]
    pub fn add_singleton_factory<T, F, Args>(&mut self, factory: F) -> Result<&mut Self, Error>
    where
        T: Send + Sync + 'static,
        F: GenericFactory<Args, Output = T>,
        Args: FromProvider,
    {
        self.add_singleton_factory_as::<T, T, F, Args>(factory)
    }

    /// Registers a singleton implementation `I`, created by a factory, under the service key `S`
    #[inline]
    pub fn add_singleton_factory_as<S, I, F, Args>(&mut self, factory: F) -> Result<&mut Self, Error>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Implements<S>,
        F: GenericFactory<Args, Output = I>,
        Args: FromProvider,
    {
        self.add(ServiceDescriptor::factory::<S, I, F, Args>(ServiceLifetime::Singleton, factory))
    }

    /// Registers a singleton service that is closed together with the root provider
    #[inline]
    pub fn add_singleton_closeable<T: Inject + Close>(&mut self) -> Result<&mut Self, Error> {
        self.add(ServiceDescriptor::activated::<T, T>(ServiceLifetime::Singleton).with_close::<T>())
    }

    /// Registers a scoped service constructed through [`Inject`]
    #[inline]
    pub fn add_scoped<T: Inject>(&mut self) -> Result<&mut Self, Error> {
        self.add_scoped_as::<T, T>()
    }

    /// Registers a scoped implementation `I` under the service key `S`
    #[inline]
    pub fn add_scoped_as<S, I>(&mut self) -> Result<&mut Self, Error>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Inject + Implements<S>,
    {
        self.add(ServiceDescriptor::activated::<S, I>(ServiceLifetime::Scoped))
    }

    /// Registers a scoped service created by a factory
    #[inline]
    pub fn add_scoped_factory<T, F, Args>(&mut self, factory: F) -> Result<&mut Self, Error>
    where
        T: Send + Sync + 'static,
        F: GenericFactory<Args, Output = T>,
        Args: FromProvider,
    {
        self.add_scoped_factory_as::<T, T, F, Args>(factory)
    }

    /// Registers a scoped implementation `I`, created by a factory, under the service key `S`
    #[inline]
    pub fn add_scoped_factory_as<S, I, F, Args>(&mut self, factory: F) -> Result<&mut Self, Error>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Implements<S>,
        F: GenericFactory<Args, Output = I>,
        Args: FromProvider,
    {
        self.add(ServiceDescriptor::factory::<S, I, F, Args>(ServiceLifetime::Scoped, factory))
    }

    /// Registers a scoped service that is closed together with its scope
    #[inline]
    pub fn add_scoped_closeable<T: Inject + Close>(&mut self) -> Result<&mut Self, Error> {
        self.add(ServiceDescriptor::activated::<T, T>(ServiceLifetime::Scoped).with_close::<T>())
    }

    /// Registers a transient service constructed through [`Inject`]
    #[inline]
    pub fn add_transient<T: Inject>(&mut self) -> Result<&mut Self, Error> {
        self.add_transient_as::<T, T>()
    }

    /// Registers a transient implementation `I` under the service key `S`
    #[inline]
    pub fn add_transient_as<S, I>(&mut self) -> Result<&mut Self, Error>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Inject + Implements<S>,
    {
        self.add(ServiceDescriptor::activated::<S, I>(ServiceLifetime::Transient))
    }

    /// Registers a transient service created by a factory
    #[inline]
    pub fn add_transient_factory<T, F, Args>(&mut self, factory: F) -> Result<&mut Self, Error>
    where
        T: Send + Sync + 'static,
        F: GenericFactory<Args, Output = T>,
        Args: FromProvider,
    {
        self.add_transient_factory_as::<T, T, F, Args>(factory)
    }

    /// Registers a transient implementation `I`, created by a factory, under the service key `S`
    #[inline]
    pub fn add_transient_factory_as<S, I, F, Args>(&mut self, factory: F) -> Result<&mut Self, Error>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Implements<S>,
        F: GenericFactory<Args, Output = I>,
        Args: FromProvider,
    {
        self.add(ServiceDescriptor::factory::<S, I, F, Args>(ServiceLifetime::Transient, factory))
    }

    /// Returns `true` if the binding `S => I` is registered
    #[inline]
    pub fn contains<S: ?Sized + 'static, I: 'static>(&self) -> bool {
        self.descriptors.contains_key(&(ServiceKey::of::<S>(), ServiceKey::of::<I>()))
    }

    /// Removes every binding
    #[inline]
    pub fn clear(&mut self) {
        self.descriptors.clear();
    }

    /// Returns the number of bindings
    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` if there are no bindings
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Iterates over the bindings in registration order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.descriptors.values()
    }

    /// Builds a new root provider over a snapshot of the current bindings
    pub fn build_provider(&self) -> ServiceProvider {
        let descriptors = self.descriptors
            .values()
            .cloned()
            .collect::<Vec<_>>();
        tracing::debug!("building service provider with {} binding(s)", descriptors.len());
        ServiceProvider::new(Arc::new(Registry::new(descriptors)), None)
    }
}

impl<'a> IntoIterator for &'a ServiceCollection {
    type Item = &'a ServiceDescriptor;
    type IntoIter = indexmap::map::Values<'a, (ServiceKey, ServiceKey), ServiceDescriptor>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::implements;

    trait Repository: Send + Sync {}

    #[derive(Default)]
    struct SqlRepository;

    #[derive(Default)]
    struct MemoryRepository;

    impl Repository for SqlRepository {}
    impl Repository for MemoryRepository {}

    implements! {
        SqlRepository => dyn Repository,
        MemoryRepository => dyn Repository,
    }

    #[derive(Default)]
    struct Clock;

    impl Service for Clock {
        type Contract = Self;
        const LIFETIME: ServiceLifetime = ServiceLifetime::Transient;

        fn into_contract(self: Arc<Self>) -> Arc<Self> {
            self
        }
    }

    #[test]
    fn it_rejects_duplicate_binding() {
        let mut services = ServiceCollection::new();
        services.add_singleton::<Clock>().unwrap();

        let err = services.add_transient::<Clock>().unwrap_err();

        assert!(matches!(err, Error::DuplicateBinding { .. }));
        assert_eq!(services.len(), 1);
    }

    #[test]
    fn it_allows_several_implementations_of_one_service() {
        let mut services = ServiceCollection::new();
        services
            .add_singleton_as::<dyn Repository, SqlRepository>().unwrap()
            .add_scoped_as::<dyn Repository, MemoryRepository>().unwrap();

        assert_eq!(services.len(), 2);
        assert!(services.contains::<dyn Repository, SqlRepository>());
        assert!(services.contains::<dyn Repository, MemoryRepository>());
        assert!(!services.contains::<SqlRepository, SqlRepository>());
    }

    #[test]
    fn it_keeps_registration_order() {
        let mut services = ServiceCollection::new();
        services
            .add_transient::<Clock>().unwrap()
            .add_singleton_as::<dyn Repository, SqlRepository>().unwrap()
            .add_singleton_instance(42u32).unwrap();

        let keys = services
            .iter()
            .map(|d| d.implementation_key())
            .collect::<Vec<_>>();

        assert_eq!(keys, vec![
            ServiceKey::of::<Clock>(),
            ServiceKey::of::<SqlRepository>(),
            ServiceKey::of::<u32>(),
        ]);
    }

    #[test]
    fn it_registers_by_convention() {
        let mut services = ServiceCollection::new();
        services.add_service::<Clock>().unwrap();

        let descriptor = services.iter().next().unwrap();

        assert_eq!(descriptor.lifetime(), ServiceLifetime::Transient);
        assert!(services.add_service::<Clock>().is_err());
    }

    #[test]
    fn it_does_not_leak_mutations_into_built_provider() {
        let mut services = ServiceCollection::new();
        services.add_singleton_instance(1u8).unwrap();
        let provider = services.build_provider();

        services.clear();
        services.add_singleton_instance(2u16).unwrap();

        assert!(services.contains::<u16, u16>());
        assert_eq!(*provider.get_required_service::<u8>().unwrap(), 1);
        assert!(provider.get_service::<u16>().unwrap().is_none());
    }

    #[test]
    fn it_clears_bindings() {
        let mut services = ServiceCollection::new();
        services.add_singleton::<Clock>().unwrap();

        services.clear();

        assert!(services.is_empty());
        assert!(services.add_singleton::<Clock>().is_ok());
    }
}
