use crate::attributes::{strip_bean_attributes, FieldAttributes};
use crate::bean::{generate_injection, generate_property_injection};
use itertools::Itertools;
use proc_macro2::TokenStream;
use quote::{quote, ToTokens};
use syn::spanned::Spanned;
use syn::{Error, FnArg, Item, ItemFn, Pat, Result, ReturnType, Type};

#[derive(Clone, Copy, Eq, PartialEq)]
pub enum FunctionKind {
    Provider,
    MultiProvider,
    AfterLoad,
}

fn generate_argument(function: &str, index: usize, argument: &FnArg) -> Result<TokenStream> {
    let FnArg::Typed(argument) = argument else {
        return Err(Error::new(
            argument.span(),
            "Methods cannot be used as providers or hooks!",
        ));
    };

    let attributes = FieldAttributes::parse(&argument.attrs)?;
    let ty = &argument.ty;

    let Some(property) = attributes.property() else {
        return Ok(generate_injection(ty, &attributes));
    };

    let name = match argument.pat.as_ref() {
        Pat::Ident(pat) => pat.ident.to_string(),
        _ => index.to_string(),
    };
    let injection = generate_property_injection(
        &property,
        quote!(instance_provider.configuration()),
        quote!(&mut value),
        &format!("{function}::{name}"),
    );

    Ok(quote! {
        {
            let mut value: #ty = std::default::Default::default();
            #injection
            value
        }
    })
}

fn output_type(function: &ItemFn) -> Result<&Type> {
    match &function.sig.output {
        ReturnType::Type(_, ty) => Ok(ty),
        ReturnType::Default => Err(Error::new(
            function.sig.span(),
            "Providers must return the provided instances!",
        )),
    }
}

pub fn expand_function(item: &Item, kind: FunctionKind) -> Result<TokenStream> {
    let Item::Fn(function) = item else {
        return Err(Error::new(
            item.span(),
            "Providers and hooks must be free functions!",
        ));
    };

    if !function.sig.generics.params.is_empty() || function.sig.asyncness.is_some() {
        return Err(Error::new(
            function.sig.span(),
            "Providers and hooks cannot be generic or async!",
        ));
    }

    let ident = &function.sig.ident;
    let name = ident.to_string();
    let arguments: Vec<_> = function
        .sig
        .inputs
        .iter()
        .enumerate()
        .map(|(index, argument)| generate_argument(&name, index, argument))
        .try_collect()?;

    let mut function = function.clone();
    for argument in function.sig.inputs.iter_mut() {
        if let FnArg::Typed(argument) = argument {
            strip_bean_attributes(&mut argument.attrs);
        }
    }

    let call = quote! {
        {
            #[allow(unused_imports)]
            use tubing_ioc::instance_provider::TypedBeanInstanceProvider as _;
            #ident(#(#arguments),*)
        }
    };

    let registration = match kind {
        FunctionKind::Provider => {
            let output = output_type(&function)?;
            quote! {
                #[allow(unused_variables)]
                fn construct_provided(
                    instance_provider: &mut dyn tubing_ioc::instance_provider::BeanInstanceProvider,
                ) -> Result<tubing_ioc::instance_provider::BeanInstanceAnyPtr, tubing_ioc::error::BeanInstanceProviderError> {
                    tubing_ioc::provider::provided_instance(#call)
                }

                fn register_provider() -> tubing_ioc::scanner::ProviderDefinition {
                    tubing_ioc::scanner::ProviderDefinition {
                        output: tubing_ioc::instance_provider::BeanType::of::<<#output as tubing_ioc::provider::ProviderOutput>::Bean>(),
                        name: #name,
                        module_path: module_path!(),
                        constructor: construct_provided,
                        cast: tubing_ioc::registry::cast_provided::<<#output as tubing_ioc::provider::ProviderOutput>::Bean>,
                    }
                }

                tubing_ioc::scanner::internal::submit! {
                    tubing_ioc::scanner::internal::ProviderRegisterer {
                        register: register_provider
                    }
                }
            }
        }
        FunctionKind::MultiProvider => {
            let output = output_type(&function)?;
            quote! {
                #[allow(unused_variables)]
                fn construct_multi_provided(
                    instance_provider: &mut dyn tubing_ioc::instance_provider::BeanInstanceProvider,
                ) -> Result<Vec<tubing_ioc::registry::AggregatedInstance>, tubing_ioc::error::BeanInstanceProviderError> {
                    tubing_ioc::provider::provided_instances(#call)
                }

                fn register_multi_provider() -> tubing_ioc::scanner::MultiProviderDefinition {
                    tubing_ioc::scanner::MultiProviderDefinition {
                        output: tubing_ioc::instance_provider::BeanType::of::<<#output as tubing_ioc::provider::MultiProviderOutput>::Bean>(),
                        name: #name,
                        module_path: module_path!(),
                        constructor: construct_multi_provided,
                    }
                }

                tubing_ioc::scanner::internal::submit! {
                    tubing_ioc::scanner::internal::MultiProviderRegisterer {
                        register: register_multi_provider
                    }
                }
            }
        }
        FunctionKind::AfterLoad => quote! {
            #[allow(unused_variables)]
            fn run_after_load(
                instance_provider: &mut dyn tubing_ioc::instance_provider::BeanInstanceProvider,
            ) -> Result<(), tubing_ioc::error::BeanInstanceProviderError> {
                tubing_ioc::provider::AfterLoadOutput::into_result(#call, #name)
            }

            fn register_after_load() -> tubing_ioc::scanner::AfterLoadHook {
                tubing_ioc::scanner::AfterLoadHook {
                    name: #name,
                    module_path: module_path!(),
                    run: run_after_load,
                }
            }

            tubing_ioc::scanner::internal::submit! {
                tubing_ioc::scanner::internal::AfterLoadRegisterer {
                    register: register_after_load
                }
            }
        },
    };

    let function = function.into_token_stream();

    Ok(quote! {
        #function

        const _: () = {
            #registration
        };
    })
}
