use crate::bean::expand_bean;
use crate::function::{expand_function, FunctionKind};
use crate::interface::{expand_bean_alias, expand_injectable};
use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput, Error, Item};

mod attributes;
mod bean;
mod function;
mod interface;

#[proc_macro_derive(Bean, attributes(bean))]
pub fn generate_bean(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_bean(&input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

/// Registers a trait implementation of a bean, so the bean can be injected as
/// `dyn Trait + Send + Sync`.
#[proc_macro_attribute]
pub fn bean_alias(_attr: TokenStream, input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as Item);
    expand_bean_alias(&input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

/// Marks a trait as an injectable interface.
#[proc_macro_attribute]
pub fn injectable(_attr: TokenStream, input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as Item);
    expand_injectable(&input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

/// Registers a function creating a single bean of its return type. Parameters are injected the
/// same way as bean fields.
#[proc_macro_attribute]
pub fn bean_provider(_attr: TokenStream, input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as Item);
    expand_function(&input, FunctionKind::Provider)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

/// Registers a function creating beans aggregated under the element type of the returned `Vec`.
#[proc_macro_attribute]
pub fn bean_multi_provider(_attr: TokenStream, input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as Item);
    expand_function(&input, FunctionKind::MultiProvider)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

/// Registers a function run once after all beans are created.
#[proc_macro_attribute]
pub fn after_load(_attr: TokenStream, input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as Item);
    expand_function(&input, FunctionKind::AfterLoad)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}
