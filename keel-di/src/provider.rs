//! Service provider that creates, caches and closes service instances

use crate::{
    ServiceScope,
    descriptor::{Activated, ArcService, ServiceDescriptor, ServiceKey, ServiceLifetime, Strategy},
    error::{BoxError, Error},
    inject::Close,
};
use parking_lot::{Mutex, ReentrantMutex};
use std::{
    any::{TypeId, type_name},
    collections::HashMap,
    fmt::{Debug, Formatter},
    hash::{BuildHasherDefault, Hasher},
    sync::{
        Arc,
        OnceLock,
        atomic::{AtomicBool, Ordering},
    },
};

pub use self::{
    factory::GenericFactory,
    from_provider::FromProvider,
};

pub mod factory;
pub mod from_provider;
mod stack;

/// Maps a service key to the indices of its bindings, in registration order
type ServiceIndex = HashMap<
    TypeId,
    Vec<usize>,
    BuildHasherDefault<TypeIdHasher>
>;

#[derive(Default)]
struct TypeIdHasher(u64);

impl Hasher for TypeIdHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }

    #[cold]
    fn write(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(8) {
            let mut buf = [0u8; 8];
            buf[..chunk.len()].copy_from_slice(chunk);
            self.0 ^= u64::from_ne_bytes(buf);
        }
    }

    #[inline]
    fn write_u64(&mut self, id: u64) {
        self.0 = id;
    }
}

/// Immutable snapshot of bindings shared by the root provider and all of its scopes
pub(crate) struct Registry {
    descriptors: Box<[ServiceDescriptor]>,
    index: ServiceIndex,
}

impl Registry {
    pub(crate) fn new(descriptors: Vec<ServiceDescriptor>) -> Self {
        let mut index = ServiceIndex::default();
        for (i, descriptor) in descriptors.iter().enumerate() {
            index
                .entry(descriptor.service_key().type_id())
                .or_default()
                .push(i);
        }
        Self {
            descriptors: descriptors.into_boxed_slice(),
            index,
        }
    }

    /// Fixed instances exist before any resolution, so the root owns them from the start
    fn instance_closeables(&self) -> Vec<Arc<dyn Close>> {
        self.descriptors
            .iter()
            .filter_map(|descriptor| match (&descriptor.strategy, descriptor.closer) {
                (Strategy::Instance(instance), Some(closer)) => closer(instance.erased_implementation()),
                _ => None,
            })
            .collect()
    }

    #[inline]
    fn bindings_of(&self, key: TypeId) -> &[usize] {
        self.index
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

struct ProviderInner {
    registry: Arc<Registry>,
    /// One slot per binding; only the lifetimes owned by this provider are ever filled
    cache: Box<[OnceLock<Activated>]>,
    /// Serializes construction of cached instances owned by this provider
    lock: ReentrantMutex<()>,
    /// Closeable instances in creation order
    closeables: Mutex<Vec<Arc<dyn Close>>>,
    closed: AtomicBool,
    /// `None` for the root provider
    root: Option<ServiceProvider>,
}

/// Resolves services from an immutable snapshot of bindings,
/// caching singletons at the root and scoped services in each scope.
///
/// Cloning a provider is cheap and yields a handle to the same provider.
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

impl Debug for ServiceProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("bindings", &self.inner.registry.descriptors.len())
            .field("is_root", &self.is_root())
            .field("closed", &self.inner.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl ServiceProvider {
    pub(crate) fn new(registry: Arc<Registry>, root: Option<ServiceProvider>) -> Self {
        let cache = registry.descriptors
            .iter()
            .map(|_| OnceLock::new())
            .collect();
        let closeables = if root.is_none() {
            registry.instance_closeables()
        } else {
            Vec::new()
        };
        let inner = ProviderInner {
            registry,
            cache,
            lock: ReentrantMutex::new(()),
            closeables: Mutex::new(closeables),
            closed: AtomicBool::new(false),
            root,
        };
        Self { inner: Arc::new(inner) }
    }

    /// Returns `true` if this is the root provider
    #[inline]
    pub fn is_root(&self) -> bool {
        self.inner.root.is_none()
    }

    /// Returns `true` if [`ServiceProvider::close`] has been called
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Creates a new scope.
    ///
    /// The scope is always chained to the root provider, even when created from another scope:
    /// - **Singleton** services are shared with the root.
    /// - **Scoped** services are created lazily and cached in the new scope only.
    /// - **Transient** services are created on every resolution.
    pub fn create_scope(&self) -> ServiceScope {
        let root = self.root().clone();
        let registry = root.inner.registry.clone();
        tracing::trace!("creating service scope");
        ServiceScope::new(Self::new(registry, Some(root)))
    }

    /// Resolves a service registered under the key `S`.
    ///
    /// If several bindings share the key, the first registered one wins.
    /// The provider itself can be resolved as `ServiceProvider`.
    pub fn get_required_service<S>(&self) -> Result<Arc<S>, Error>
    where
        S: ?Sized + Send + Sync + 'static
    {
        self.get_service::<S>()?
            .ok_or(Error::NotRegistered(type_name::<S>()))
    }

    /// Resolves a service registered under the key `S`,
    /// returning `Ok(None)` if it is not registered.
    pub fn get_service<S>(&self) -> Result<Option<Arc<S>>, Error>
    where
        S: ?Sized + Send + Sync + 'static
    {
        if let Some(provider) = self.resolve_self::<S>() {
            return Ok(Some(provider));
        }

        match self.inner.registry.bindings_of(TypeId::of::<S>()).first() {
            Some(&index) => self.resolve(index)?.service::<S>().map(Some),
            None => Ok(None),
        }
    }

    /// Resolves every service registered under the key `S`, in registration order.
    ///
    /// Fails if any one of them fails to resolve.
    pub fn get_services<S>(&self) -> Result<Vec<Arc<S>>, Error>
    where
        S: ?Sized + Send + Sync + 'static
    {
        self.inner.registry
            .bindings_of(TypeId::of::<S>())
            .iter()
            .map(|&index| self.resolve(index)?.service::<S>())
            .collect()
    }

    /// Resolves exactly the binding `S => I` and returns the concrete implementation
    pub fn get_implementation<S, I>(&self) -> Result<Arc<I>, Error>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Send + Sync + 'static
    {
        let implementation = ServiceKey::of::<I>();
        let index = self.inner.registry
            .bindings_of(TypeId::of::<S>())
            .iter()
            .copied()
            .find(|&i| self.inner.registry.descriptors[i].implementation_key() == implementation)
            .ok_or(Error::NotRegistered(type_name::<I>()))?;

        self.resolve(index)?.implementation::<I>()
    }

    /// Closes every closeable instance owned by this provider, in reverse creation order.
    ///
    /// Every instance gets a chance to close; failures are collected into [`Error::Close`].
    /// Calling `close` again is a no-op. Open scopes are not closed by their root.
    pub fn close(&self) -> Result<(), Error> {
        let closeables = {
            let mut closeables = self.inner.closeables.lock();
            if self.inner.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            std::mem::take(&mut *closeables)
        };

        tracing::trace!(
            "closing {} service provider, {} closeable(s)",
            if self.is_root() { "root" } else { "scoped" },
            closeables.len()
        );

        let errors = closeables
            .iter()
            .rev()
            .filter_map(|closeable| closeable.close().err())
            .collect::<Vec<BoxError>>();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Close(errors))
        }
    }

    #[inline]
    fn root(&self) -> &ServiceProvider {
        self.inner.root.as_ref().unwrap_or(self)
    }

    #[inline]
    fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    #[inline]
    fn resolve_self<S: ?Sized + 'static>(&self) -> Option<Arc<S>> {
        if TypeId::of::<S>() != TypeId::of::<ServiceProvider>() {
            return None;
        }
        let erased: ArcService = Arc::new(Arc::new(self.clone()));
        erased.downcast_ref::<Arc<S>>().cloned()
    }

    /// Resolves the binding at `index` following its lifetime rules
    fn resolve(&self, index: usize) -> Result<Activated, Error> {
        if self.is_closed() {
            return Err(Error::ProviderClosed);
        }

        let descriptor = &self.inner.registry.descriptors[index];
        let name = descriptor.service_key().name();

        match descriptor.lifetime() {
            ServiceLifetime::Singleton => self.root().resolve_cached(index, self),
            ServiceLifetime::Scoped => {
                if self.is_root() {
                    return Err(Error::ScopedFromRoot(name));
                }
                if let Some(singleton) = stack::captor(self.id()) {
                    return Err(Error::CaptiveDependency { scoped: name, singleton });
                }
                self.resolve_cached(index, self)
            },
            ServiceLifetime::Transient => {
                let _frame = stack::enter(self.frame(self.root().id(), index))?;
                self.activate(descriptor)
            }
        }
    }

    /// Resolves a cached binding, `self` is the owner of the cache
    fn resolve_cached(&self, index: usize, requester: &ServiceProvider) -> Result<Activated, Error> {
        let slot = &self.inner.cache[index];
        if let Some(activated) = slot.get() {
            return Ok(activated.clone());
        }

        let _lock = self.inner.lock.lock();
        if let Some(activated) = slot.get() {
            return Ok(activated.clone());
        }

        let _frame = stack::enter(requester.frame(self.id(), index))?;
        let descriptor = &self.inner.registry.descriptors[index];
        let activated = requester.activate(descriptor)?;
        let activated = slot.get_or_init(|| activated).clone();

        self.track(descriptor, &activated);
        Ok(activated)
    }

    /// Creates an instance according to the binding's strategy
    fn activate(&self, descriptor: &ServiceDescriptor) -> Result<Activated, Error> {
        let service = descriptor.service_key().name();
        let activated = match &descriptor.strategy {
            Strategy::Instance(instance) => Ok(instance.clone()),
            Strategy::Factory(factory) => factory(self),
            Strategy::Activator(activator) => activator(self),
        };

        match activated {
            Ok(activated) => {
                tracing::debug!(
                    "created {} instance of {service} ({})",
                    descriptor.lifetime(),
                    descriptor.implementation_key().name()
                );
                Ok(activated)
            },
            Err(err) => Err(Error::ResolveFailed { service, source: Box::new(err) }),
        }
    }

    /// Records a closeable instance created by the binding
    fn track(&self, descriptor: &ServiceDescriptor, activated: &Activated) {
        if matches!(descriptor.strategy, Strategy::Instance(_)) {
            return;
        }
        let Some(closeable) = descriptor.closer
            .and_then(|closer| closer(activated.erased_implementation())) else {
            return;
        };

        let mut closeables = self.inner.closeables.lock();
        if !self.is_closed() {
            closeables.push(closeable);
            return;
        }
        drop(closeables);

        if let Err(err) = closeable.close() {
            tracing::warn!(
                "failed to close {} created after its provider was closed: {err:#}",
                descriptor.service_key().name()
            );
        }
    }

    #[inline]
    fn frame(&self, owner: usize, index: usize) -> stack::Frame {
        let descriptor = &self.inner.registry.descriptors[index];
        stack::Frame {
            owner,
            requester: self.id(),
            index,
            lifetime: descriptor.lifetime(),
            name: descriptor.service_key().name(),
        }
    }
}
