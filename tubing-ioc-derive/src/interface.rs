use proc_macro2::TokenStream;
use quote::quote;
use std::ops::Deref;
use syn::spanned::Spanned;
use syn::{Error, Item, Result, Type};

pub fn expand_injectable(item: &Item) -> Result<TokenStream> {
    let Item::Trait(item_trait) = item else {
        return Err(Error::new(
            item.span(),
            "Only traits can be marked as injectable!",
        ));
    };

    if !item_trait.generics.params.is_empty() {
        return Err(Error::new(
            item_trait.generics.span(),
            "Generic traits cannot be injected!",
        ));
    }

    let ident = &item_trait.ident;

    Ok(quote! {
        #item_trait

        #[automatically_derived]
        impl tubing_ioc::bean::Injectable for dyn #ident + Send + Sync {
            const INTERFACE: bool = true;
        }
    })
}

pub fn expand_bean_alias(item: &Item) -> Result<TokenStream> {
    let Item::Impl(item_impl) = item else {
        return Err(Error::new(
            item.span(),
            "Registering bean aliases is possible only on trait implementations!",
        ));
    };

    let trait_type = item_impl
        .trait_
        .as_ref()
        .map(|(_, path, ..)| path)
        .ok_or_else(|| Error::new(item.span(), "Missing trait identifier!"))?;

    let Type::Path(target_type) = item_impl.self_ty.deref() else {
        return Err(Error::new(
            item_impl.self_ty.span(),
            "Registering traits is only available for beans!",
        ));
    };

    Ok(quote! {
        #item_impl

        #[automatically_derived]
        impl tubing_ioc::bean::BeanDowncast<#target_type> for dyn #trait_type + Send + Sync {
            fn downcast(
                source: tubing_ioc::instance_provider::BeanInstanceAnyPtr,
            ) -> Result<tubing_ioc::instance_provider::BeanInstancePtr<Self>, tubing_ioc::instance_provider::BeanInstanceAnyPtr> {
                source.downcast::<#target_type>().map(|p| p as tubing_ioc::instance_provider::BeanInstancePtr<Self>)
            }
        }

        const _: () = {
            fn register() -> tubing_ioc::scanner::BeanAlias {
                tubing_ioc::scanner::BeanAlias {
                    interface: tubing_ioc::instance_provider::BeanType::of::<dyn #trait_type + Send + Sync>(),
                    target: tubing_ioc::instance_provider::BeanType::of::<#target_type>(),
                    module_path: module_path!(),
                    cast: tubing_ioc::bean::cast_alias::<dyn #trait_type + Send + Sync, #target_type>,
                }
            }

            tubing_ioc::scanner::internal::submit! {
                tubing_ioc::scanner::internal::BeanAliasRegisterer {
                    register
                }
            }
        };
    })
}
