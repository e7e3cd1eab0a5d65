use crate::attributes::{BeanAttributes, DefaultDefinition, FieldAttributes, PropertyDefinition};
use itertools::Itertools;
use proc_macro2::{Ident, TokenStream};
use quote::{quote, ToTokens};
use syn::spanned::Spanned;
use syn::{Data, DataStruct, DeriveInput, Error, Field, Fields, Index, Member, Result, Type};

/// Expression creating a value for a field or parameter, without configuration properties.
pub fn generate_injection(ty: &Type, attributes: &FieldAttributes) -> TokenStream {
    if attributes.host {
        return quote! {
            instance_provider.host_typed::<<#ty as std::ops::Deref>::Target>()?
        };
    }

    match &attributes.default {
        Some(DefaultDefinition::Expr(path)) => quote!(#path()),
        Some(DefaultDefinition::Default) => quote!(std::default::Default::default()),
        None => quote! {
            <#ty as tubing_ioc::instance_provider::Inject>::inject(instance_provider)?
        },
    }
}

/// Call injecting a configuration property into `target_value`.
pub fn generate_property_injection(
    property: &PropertyDefinition,
    configuration: TokenStream,
    target_value: TokenStream,
    target: &str,
) -> TokenStream {
    let identifier = &property.identifier;
    let required = property.required;
    let message = match &property.error {
        Some(error) => quote!(Some(#error)),
        None => quote!(None),
    };

    match &property.transform {
        Some(transform) => quote! {
            tubing_ioc::property::inject_transformed_property::<#transform>(
                #configuration,
                #target_value,
                #identifier,
                #required,
                #message,
                #target,
            )?;
        },
        None => quote! {
            tubing_ioc::property::inject_property(
                #configuration,
                #target_value,
                #identifier,
                #required,
                #message,
                #target,
            )?;
        },
    }
}

struct FieldGeneration {
    construction: TokenStream,
    injection: Option<TokenStream>,
}

fn generate_field(ident: &Ident, member: &Member, field: &Field) -> Result<FieldGeneration> {
    let attributes = FieldAttributes::parse(&field.attrs)?;
    if let Some(property) = attributes.property() {
        let target = format!("{}::{}", ident, member.to_token_stream());
        return Ok(FieldGeneration {
            construction: quote!(std::default::Default::default()),
            injection: Some(generate_property_injection(
                &property,
                quote!(configuration),
                quote!(&mut self.#member),
                &target,
            )),
        });
    }

    Ok(FieldGeneration {
        construction: generate_injection(&field.ty, &attributes),
        injection: None,
    })
}

fn generate_fields(ident: &Ident, fields: &Fields) -> Result<(TokenStream, Vec<TokenStream>)> {
    let members = fields
        .iter()
        .enumerate()
        .map(|(index, field)| match &field.ident {
            Some(name) => Member::Named(name.clone()),
            None => Member::Unnamed(Index::from(index)),
        })
        .collect_vec();

    let generated: Vec<_> = members
        .iter()
        .zip(fields.iter())
        .map(|(member, field)| generate_field(ident, member, field))
        .try_collect()?;

    let injections = generated
        .iter()
        .filter_map(|generation| generation.injection.clone())
        .collect_vec();
    let constructions = generated
        .into_iter()
        .map(|generation| generation.construction);

    let construction = match fields {
        Fields::Named(_) => quote! {
            Self {
                #(#members: #constructions),*
            }
        },
        Fields::Unnamed(_) => quote! {
            Self(#(#constructions),*)
        },
        Fields::Unit => quote!(Self),
    };

    Ok((construction, injections))
}

pub fn expand_bean(input: &DeriveInput) -> Result<TokenStream> {
    let Data::Struct(DataStruct { fields, .. }) = &input.data else {
        return Err(Error::new(input.span(), "Can only derive Bean on structs!"));
    };

    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "Generic beans are not supported!",
        ));
    }

    let ident = &input.ident;
    let attributes = BeanAttributes::parse(&input.attrs)?;
    let (construction, injections) = generate_fields(ident, fields)?;

    let annotation = match &attributes.annotation {
        Some(annotation) => quote!(#annotation),
        None => quote!(tubing_ioc::annotation::IOC_BEAN),
    };
    let priority = attributes.priority;
    let multi_providers = &attributes.multi_providers;
    let on_property = match &attributes.conditional_on_property {
        Some(expression) => quote!(Some(#expression)),
        None => quote!(None),
    };
    let on_missing_bean = attributes.conditional_on_missing_bean;
    let custom = match &attributes.condition {
        Some(condition) => quote!(Some(#condition as tubing_ioc::conditional::BeanCondition)),
        None => quote!(None),
    };

    let inject_properties = if injections.is_empty() {
        quote!()
    } else {
        quote! {
            fn inject_properties(
                &mut self,
                configuration: &tubing_ioc::property::ConfigurationFiles,
            ) -> Result<(), tubing_ioc::error::BeanInstanceProviderError> {
                #(#injections)*
                Ok(())
            }
        }
    };

    Ok(quote! {
        #[automatically_derived]
        impl tubing_ioc::bean::Injectable for #ident {}

        #[automatically_derived]
        impl tubing_ioc::bean::BeanDowncast<#ident> for #ident {
            fn downcast(
                source: tubing_ioc::instance_provider::BeanInstanceAnyPtr,
            ) -> Result<tubing_ioc::instance_provider::BeanInstancePtr<Self>, tubing_ioc::instance_provider::BeanInstanceAnyPtr> {
                source.downcast()
            }
        }

        #[automatically_derived]
        impl tubing_ioc::bean::Bean for #ident {
            #[allow(unused_variables)]
            fn create(
                instance_provider: &mut dyn tubing_ioc::instance_provider::BeanInstanceProvider,
            ) -> Result<Self, tubing_ioc::error::BeanInstanceProviderError> {
                #[allow(unused_imports)]
                use tubing_ioc::instance_provider::TypedBeanInstanceProvider as _;
                Ok(#construction)
            }

            #inject_properties
        }

        const _: () = {
            fn register() -> tubing_ioc::scanner::BeanDefinition {
                tubing_ioc::scanner::BeanDefinition {
                    bean_type: tubing_ioc::instance_provider::BeanType::of::<#ident>(),
                    module_path: module_path!(),
                    annotation: #annotation,
                    priority: #priority,
                    multi_providers: vec![#(tubing_ioc::instance_provider::BeanType::of::<#multi_providers>()),*],
                    conditions: tubing_ioc::conditional::BeanConditions {
                        on_property: #on_property,
                        on_missing_bean: #on_missing_bean,
                        custom: #custom,
                    },
                    constructor: tubing_ioc::bean::construct::<#ident>,
                    cast: tubing_ioc::bean::cast::<#ident>,
                }
            }

            tubing_ioc::scanner::internal::submit! {
                tubing_ioc::scanner::internal::BeanDefinitionRegisterer {
                    register
                }
            }
        };
    })
}
