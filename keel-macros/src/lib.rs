//! Proc-Macros implementations for different features of Keel
//!

#[cfg(feature = "di-derive")]
use {proc_macro::TokenStream, syn::parse_macro_input};

#[cfg(feature = "di-derive")]
mod di;

/// Implements the `Service` trait, declaring the default service key and lifetime
/// used by registration by convention.
///
/// The lifetime is required: `singleton`, `scoped` or `transient`.
/// The service key defaults to the type itself and can be changed with `contract = ...`.
/// The generated impl refers to `::keel::di`; crates depending on `keel-di` directly
/// pass its path with `crate = keel_di`.
///
/// # Example
/// ```ignore
/// use keel::di::Service;
///
/// trait Clock: Send + Sync {}
///
/// #[derive(Default, Service)]
/// #[service(singleton, contract = dyn Clock)]
/// struct SystemClock;
///
/// impl Clock for SystemClock {}
///
/// // This expands to:
/// // impl Service for SystemClock {
/// //     type Contract = dyn Clock;
/// //     const LIFETIME: ServiceLifetime = ServiceLifetime::Singleton;
/// //     fn into_contract(self: Arc<Self>) -> Arc<dyn Clock> {
/// //         self
/// //     }
/// // }
/// ```
#[cfg(feature = "di-derive")]
#[proc_macro_derive(Service, attributes(service))]
pub fn derive_service(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as syn::DeriveInput);
    di::expand_service(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
