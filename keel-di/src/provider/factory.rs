//! Factory functions whose arguments are extracted from a provider

use super::{FromProvider, ServiceProvider};
use crate::error::Error;

/// A fallible function taking up to five [`FromProvider`] arguments.
///
/// `Args` is the tuple of argument types, `()` for a function without arguments.
/// Every factory returns `Result<Output, Error>`, so a failure is reported the same
/// way whatever the arity.
pub trait GenericFactory<Args>: Send + Sync + 'static {
    /// The type the factory produces
    type Output;

    /// Calls the factory with already extracted arguments
    fn call(&self, args: Args) -> Result<Self::Output, Error>;

    /// Extracts the arguments from `provider` and calls the factory
    #[inline]
    fn produce(&self, provider: &ServiceProvider) -> Result<Self::Output, Error>
    where
        Args: FromProvider,
    {
        Args::from_provider(provider).and_then(|args| self.call(args))
    }
}

macro_rules! impl_generic_factory {
    () => {
        impl<F, R> GenericFactory<()> for F
        where
            F: Fn() -> Result<R, Error> + Send + Sync + 'static,
        {
            type Output = R;

            #[inline]
            fn call(&self, _: ()) -> Result<R, Error> {
                self()
            }
        }
    };
    ($head:ident $($tail:ident)*) => {
        impl<F, R, $head, $($tail,)*> GenericFactory<($head, $($tail,)*)> for F
        where
            F: Fn($head, $($tail),*) -> Result<R, Error> + Send + Sync + 'static,
        {
            type Output = R;

            #[inline]
            #[allow(non_snake_case)]
            fn call(&self, ($head, $($tail,)*): ($head, $($tail,)*)) -> Result<R, Error> {
                self($head, $($tail),*)
            }
        }

        impl_generic_factory! { $($tail)* }
    };
}

impl_generic_factory! { A1 A2 A3 A4 A5 }
