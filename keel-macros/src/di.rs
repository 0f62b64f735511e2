//! Macros for dependency injection

use proc_macro2::{Ident, TokenStream};
use quote::quote;
use syn::{Path, Type, meta::ParseNestedMeta, spanned::Spanned};

const LIFETIME_MISSING: &str =
    "missing service lifetime, expected #[service(singleton)], #[service(scoped)] or #[service(transient)]";

/// Creates a derive-macro for a service declared by convention
pub(super) fn expand_service(input: &syn::DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut lifetime: Option<Ident> = None;
    let mut contract: Option<Type> = None;
    let mut krate: Option<Path> = None;

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("service")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("singleton") {
                set_lifetime(&mut lifetime, &meta, "Singleton")
            } else if meta.path.is_ident("scoped") {
                set_lifetime(&mut lifetime, &meta, "Scoped")
            } else if meta.path.is_ident("transient") {
                set_lifetime(&mut lifetime, &meta, "Transient")
            } else if meta.path.is_ident("contract") {
                if contract.is_some() {
                    return Err(meta.error("service contract is already specified"));
                }
                contract = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("crate") {
                if krate.is_some() {
                    return Err(meta.error("crate path is already specified"));
                }
                krate = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported service attribute, expected `singleton`, `scoped`, `transient`, `contract = ...` or `crate = ...`"))
            }
        })?;
    }

    let lifetime = lifetime.ok_or_else(|| syn::Error::new_spanned(name, LIFETIME_MISSING))?;
    let contract = match contract {
        Some(contract) => quote! { #contract },
        None => quote! { Self },
    };
    let krate = match krate {
        Some(krate) => quote! { #krate },
        None => quote! { ::keel::di },
    };

    Ok(quote! {
        impl #impl_generics #krate::Service for #name #ty_generics #where_clause {
            type Contract = #contract;

            const LIFETIME: #krate::ServiceLifetime = #krate::ServiceLifetime::#lifetime;

            #[inline]
            fn into_contract(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<#contract> {
                self
            }
        }
    })
}

fn set_lifetime(slot: &mut Option<Ident>, meta: &ParseNestedMeta, variant: &str) -> syn::Result<()> {
    if slot.is_some() {
        return Err(meta.error("service lifetime is already specified"));
    }
    *slot = Some(Ident::new(variant, meta.path.span()));
    Ok(())
}
