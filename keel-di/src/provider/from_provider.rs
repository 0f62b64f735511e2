//! Extractors for fetching data from the service provider

use super::{Error, ServiceProvider};
use std::sync::Arc;

/// A trait that defines how to extract the `Self` from the service provider
pub trait FromProvider: Sized + Send + Sync {
    /// Extracts `Self` from the service provider
    fn from_provider(provider: &ServiceProvider) -> Result<Self, Error>;
}

impl FromProvider for ServiceProvider {
    #[inline]
    fn from_provider(provider: &ServiceProvider) -> Result<Self, Error> {
        Ok(provider.clone())
    }
}

impl FromProvider for () {
    #[inline]
    fn from_provider(_: &ServiceProvider) -> Result<Self, Error> {
        Ok(())
    }
}

/// A required service
impl<T: ?Sized + Send + Sync + 'static> FromProvider for Arc<T> {
    #[inline]
    fn from_provider(provider: &ServiceProvider) -> Result<Self, Error> {
        provider.get_required_service::<T>()
    }
}

/// An optional service, `None` when not registered
impl<T: ?Sized + Send + Sync + 'static> FromProvider for Option<Arc<T>> {
    #[inline]
    fn from_provider(provider: &ServiceProvider) -> Result<Self, Error> {
        provider.get_service::<T>()
    }
}

/// Every service registered under the key `T`
impl<T: ?Sized + Send + Sync + 'static> FromProvider for Vec<Arc<T>> {
    #[inline]
    fn from_provider(provider: &ServiceProvider) -> Result<Self, Error> {
        provider.get_services::<T>()
    }
}

macro_rules! define_generic_from_provider {
    ($($T: ident),*) => {
        impl<$($T: FromProvider),+> FromProvider for ($($T,)+) {
            #[inline]
            #[allow(non_snake_case)]
            fn from_provider(provider: &ServiceProvider) -> Result<Self, Error> {
                let tuple = (
                    $(
                    $T::from_provider(provider)?,
                    )*
                );
                Ok(tuple)
            }
        }
    }
}

define_generic_from_provider! { T1 }
define_generic_from_provider! { T1, T2 }
define_generic_from_provider! { T1, T2, T3 }
define_generic_from_provider! { T1, T2, T3, T4 }
define_generic_from_provider! { T1, T2, T3, T4, T5 }

#[cfg(test)]
mod tests {
    use crate::{ServiceCollection, implements};
    use super::*;

    #[derive(Debug, Default)]
    struct Dependency {
        x: i32
    }

    trait Plugin: Send + Sync {
        fn id(&self) -> u8;
    }

    #[derive(Default)]
    struct First;

    #[derive(Default)]
    struct Second;

    impl Plugin for First {
        fn id(&self) -> u8 { 1 }
    }

    impl Plugin for Second {
        fn id(&self) -> u8 { 2 }
    }

    implements! {
        First => dyn Plugin,
        Second => dyn Plugin,
    }

    #[test]
    fn it_resolves_required_service() {
        let mut services = ServiceCollection::new();
        services.add_transient_factory(|| Ok(Dependency { x: 1 })).unwrap();

        let provider = services.build_provider();

        let dependency = Arc::<Dependency>::from_provider(&provider).unwrap();

        assert_eq!(dependency.x, 1);
    }

    #[test]
    fn it_resolves_required_service_with_error() {
        let provider = ServiceCollection::new().build_provider();

        let err = Arc::<Dependency>::from_provider(&provider).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Services Error: service not registered: keel_di::provider::from_provider::tests::Dependency"
        );
    }

    #[test]
    fn it_resolves_optional_service() {
        let provider = ServiceCollection::new().build_provider();

        let dependency = Option::<Arc<Dependency>>::from_provider(&provider).unwrap();

        assert!(dependency.is_none());
    }

    #[test]
    fn it_resolves_all_plugins_in_order() {
        let mut services = ServiceCollection::new();
        services
            .add_singleton_as::<dyn Plugin, First>().unwrap()
            .add_singleton_as::<dyn Plugin, Second>().unwrap();

        let provider = services.build_provider();

        let plugins = Vec::<Arc<dyn Plugin>>::from_provider(&provider).unwrap();
        let ids = plugins.iter().map(|p| p.id()).collect::<Vec<_>>();

        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn it_resolves_tuples() {
        let mut services = ServiceCollection::new();
        services.add_singleton::<Dependency>().unwrap();

        let provider = services.build_provider();

        let (p, d, none) = <(ServiceProvider, Arc<Dependency>, Option<Arc<First>>)>::from_provider(&provider).unwrap();

        assert!(p.is_root());
        assert_eq!(d.x, 0);
        assert!(none.is_none());
    }
}
