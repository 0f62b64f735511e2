//! Service bindings: keys, lifetimes and creation strategies

use crate::{
    Close,
    Implements,
    Inject,
    Service,
    ServiceProvider,
    error::Error,
    provider::{FromProvider, GenericFactory},
};
use std::{
    any::{Any, TypeId, type_name},
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    sync::Arc,
};

pub(crate) type ArcService = Arc<
    dyn Any
    + Send
    + Sync
>;

pub(crate) type ActivatorFn = Arc<
    dyn Fn(&ServiceProvider) -> Result<Activated, Error>
    + Send
    + Sync
>;

pub(crate) type CloseFn = fn(&ArcService) -> Option<Arc<dyn Close>>;

/// Describes how long a resolved instance lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceLifetime {
    /// One instance for the whole root provider and every scope derived from it
    Singleton,
    /// One instance per scope
    Scoped,
    /// A new instance per resolution
    Transient,
}

impl Display for ServiceLifetime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceLifetime::Singleton => f.write_str("singleton"),
            ServiceLifetime::Scoped => f.write_str("scoped"),
            ServiceLifetime::Transient => f.write_str("transient"),
        }
    }
}

/// Identifies a service or an implementation type.
///
/// Keys compare by [`TypeId`] only, the type name is kept for diagnostics.
#[derive(Clone, Copy)]
pub struct ServiceKey {
    id: TypeId,
    name: &'static str,
}

impl ServiceKey {
    /// Creates a key for `T`, which may be unsized (e.g. `dyn Trait`)
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Returns the [`TypeId`] of the keyed type
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Returns the type name of the keyed type
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ServiceKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for ServiceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// A constructed instance, seen both through its service key and its concrete type
#[derive(Clone)]
pub(crate) struct Activated {
    /// Holds an `Arc<S>`
    service: ArcService,
    /// Holds the concrete `I`
    implementation: ArcService,
}

impl Activated {
    #[inline]
    pub(crate) fn new<S, I>(instance: Arc<I>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Implements<S>,
    {
        let service = <I as Implements<S>>::upcast(instance.clone());
        Self::from_parts::<S, I>(instance, service)
    }

    #[inline]
    pub(crate) fn from_parts<S, I>(instance: Arc<I>, service: Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Send + Sync + 'static,
    {
        Self {
            service: Arc::new(service),
            implementation: instance,
        }
    }

    #[inline]
    pub(crate) fn service<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<S>, Error> {
        self.service
            .downcast_ref::<Arc<S>>()
            .cloned()
            .ok_or(Error::TypeMismatch(type_name::<S>()))
    }

    #[inline]
    pub(crate) fn implementation<I: Send + Sync + 'static>(&self) -> Result<Arc<I>, Error> {
        self.implementation
            .clone()
            .downcast::<I>()
            .map_err(|_| Error::TypeMismatch(type_name::<I>()))
    }

    #[inline]
    pub(crate) fn erased_implementation(&self) -> &ArcService {
        &self.implementation
    }
}

#[derive(Clone)]
pub(crate) enum Strategy {
    /// A fixed, already created instance
    Instance(Activated),
    /// A user-supplied factory function
    Factory(ActivatorFn),
    /// Construction through the [`Inject`] trait of the implementation type
    Activator(ActivatorFn),
}

impl Debug for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Instance(_) => f.write_str("Instance(..)"),
            Strategy::Factory(_) => f.write_str("Factory(..)"),
            Strategy::Activator(_) => f.write_str("Activator(..)"),
        }
    }
}

/// An immutable record of one registration: service key, implementation key,
/// lifetime and the strategy used to create instances.
#[derive(Clone)]
pub struct ServiceDescriptor {
    service: ServiceKey,
    implementation: ServiceKey,
    lifetime: ServiceLifetime,
    pub(crate) strategy: Strategy,
    pub(crate) closer: Option<CloseFn>,
}

impl Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("service", &self.service)
            .field("implementation", &self.implementation)
            .field("lifetime", &self.lifetime)
            .field("strategy", &self.strategy)
            .field("closeable", &self.closer.is_some())
            .finish()
    }
}

impl ServiceDescriptor {
    #[inline]
    fn new<S: ?Sized + 'static, I: 'static>(lifetime: ServiceLifetime, strategy: Strategy) -> Self {
        Self {
            service: ServiceKey::of::<S>(),
            implementation: ServiceKey::of::<I>(),
            lifetime,
            strategy,
            closer: None,
        }
    }

    /// Creates a singleton binding over an existing instance
    pub fn instance<S, I>(instance: I) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Implements<S>,
    {
        let activated = Activated::new::<S, I>(Arc::new(instance));
        Self::new::<S, I>(ServiceLifetime::Singleton, Strategy::Instance(activated))
    }

    /// Creates a binding whose instances are produced by a factory function.
    ///
    /// Factory arguments are extracted from the requesting provider, see [`FromProvider`].
    pub fn factory<S, I, F, Args>(lifetime: ServiceLifetime, factory: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Implements<S>,
        F: GenericFactory<Args, Output = I>,
        Args: FromProvider,
    {
        let activator: ActivatorFn = Arc::new(move |provider: &ServiceProvider| {
            factory
                .produce(provider)
                .map(|instance| Activated::new::<S, I>(Arc::new(instance)))
        });
        Self::new::<S, I>(lifetime, Strategy::Factory(activator))
    }

    /// Creates a binding whose instances are constructed through [`Inject`]
    pub fn activated<S, I>(lifetime: ServiceLifetime) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Inject + Implements<S>,
    {
        let activator: ActivatorFn = Arc::new(|provider: &ServiceProvider| {
            I::inject(provider).map(|instance| Activated::new::<S, I>(Arc::new(instance)))
        });
        Self::new::<S, I>(lifetime, Strategy::Activator(activator))
    }

    /// Creates a binding from a function that returns an already shared instance,
    /// converted to the service key with `upcast`.
    ///
    /// Useful to expose one instance under several service keys.
    ///
    /// # Example
    /// ```ignore
    /// // `Worker` is resolvable both as itself and as `dyn Job`, sharing one instance
    /// services.add_singleton::<Worker>()?;
    /// services.add(ServiceDescriptor::from_fn::<dyn Job, Worker, _>(
    ///     ServiceLifetime::Singleton,
    ///     |provider| provider.get_implementation::<Worker, Worker>(),
    ///     |worker| worker,
    /// ))?;
    /// ```
    pub fn from_fn<S, I, F>(lifetime: ServiceLifetime, f: F, upcast: fn(Arc<I>) -> Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<Arc<I>, Error> + Send + Sync + 'static,
    {
        let activator: ActivatorFn = Arc::new(move |provider: &ServiceProvider| {
            let instance = f(provider)?;
            let service = upcast(instance.clone());
            Ok(Activated::from_parts::<S, I>(instance, service))
        });
        Self::new::<S, I>(lifetime, Strategy::Factory(activator))
    }

    /// Creates a binding from the declarations of a [`Service`] type
    pub fn convention<T: Service>() -> Self {
        let activator: ActivatorFn = Arc::new(|provider: &ServiceProvider| {
            let instance = Arc::new(T::inject(provider)?);
            let service = T::into_contract(instance.clone());
            Ok(Activated::from_parts::<T::Contract, T>(instance, service))
        });
        Self::new::<T::Contract, T>(T::LIFETIME, Strategy::Activator(activator))
    }

    /// Marks instances created by this binding to be closed by their owning provider.
    ///
    /// `I` must be the implementation type of this binding, otherwise the call has no effect.
    /// Transient instances are never tracked. A fixed instance is owned by every root provider
    /// built from the collection and is closed with it, whether or not it was resolved.
    pub fn with_close<I: Close + 'static>(mut self) -> Self {
        if self.implementation.type_id() == TypeId::of::<I>() {
            self.closer = Some(closer_of::<I>);
        } else {
            tracing::warn!(
                "close tracking ignored for {}: implementation is {}",
                type_name::<I>(),
                self.implementation.name()
            );
        }
        self
    }

    /// Returns the service key
    #[inline]
    pub fn service_key(&self) -> ServiceKey {
        self.service
    }

    /// Returns the implementation key
    #[inline]
    pub fn implementation_key(&self) -> ServiceKey {
        self.implementation
    }

    /// Returns the lifetime of the binding
    #[inline]
    pub fn lifetime(&self) -> ServiceLifetime {
        self.lifetime
    }

    /// Returns `true` if instances of this binding are tracked for closing
    #[inline]
    pub fn is_closeable(&self) -> bool {
        self.closer.is_some()
    }
}

fn closer_of<I: Close + 'static>(instance: &ArcService) -> Option<Arc<dyn Close>> {
    instance
        .clone()
        .downcast::<I>()
        .ok()
        .map(|instance| instance as Arc<dyn Close>)
}
