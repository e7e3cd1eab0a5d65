use syn::meta::ParseNestedMeta;
use syn::spanned::Spanned;
use syn::{Attribute, Error, ExprPath, LitStr, Result, Token, Type};

pub const BEAN: &str = "bean";

pub enum DefaultDefinition {
    Default,
    Expr(ExprPath),
}

pub struct PropertyDefinition {
    pub identifier: LitStr,
    pub required: bool,
    pub error: Option<LitStr>,
    pub transform: Option<Type>,
}

/// Attributes of bean fields, as well as provider and hook parameters.
#[derive(Default)]
pub struct FieldAttributes {
    pub host: bool,
    pub property: Option<LitStr>,
    pub required: bool,
    pub error: Option<LitStr>,
    pub transform: Option<Type>,
    pub default: Option<DefaultDefinition>,
}

impl FieldAttributes {
    pub fn parse(attributes: &[Attribute]) -> Result<Self> {
        let mut result = Self::default();
        for attribute in attributes.iter().filter(|attr| attr.path().is_ident(BEAN)) {
            attribute.parse_nested_meta(|meta| {
                if meta.path.is_ident("host") {
                    result.host = true;
                } else if meta.path.is_ident("property") {
                    result.property = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("required") {
                    result.required = true;
                } else if meta.path.is_ident("error") {
                    result.error = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("transform") {
                    result.transform = Some(parse_type(&meta)?);
                } else if meta.path.is_ident("default") {
                    if meta.input.peek(Token![=]) {
                        let expr: LitStr = meta.value()?.parse()?;
                        result.default = Some(DefaultDefinition::Expr(expr.parse()?));
                    } else {
                        result.default = Some(DefaultDefinition::Default);
                    }
                } else {
                    return Err(meta.error("Unsupported bean field attribute!"));
                }

                Ok(())
            })?;
        }

        result.validate(attributes)?;
        Ok(result)
    }

    pub fn property(&self) -> Option<PropertyDefinition> {
        self.property
            .as_ref()
            .map(|identifier| PropertyDefinition {
                identifier: identifier.clone(),
                required: self.required,
                error: self.error.clone(),
                transform: self.transform.clone(),
            })
    }

    fn validate(&self, attributes: &[Attribute]) -> Result<()> {
        let span = || {
            attributes
                .iter()
                .find(|attr| attr.path().is_ident(BEAN))
                .map(Spanned::span)
                .unwrap_or_else(proc_macro2::Span::call_site)
        };

        let sources = [self.host, self.property.is_some(), self.default.is_some()]
            .into_iter()
            .filter(|source| *source)
            .count();
        if sources > 1 {
            return Err(Error::new(
                span(),
                "Only one of host, property and default can be used at once!",
            ));
        }

        if self.property.is_none()
            && (self.required || self.error.is_some() || self.transform.is_some())
        {
            return Err(Error::new(
                span(),
                "The required, error and transform attributes need a property!",
            ));
        }

        Ok(())
    }
}

/// Attributes of bean structs.
#[derive(Default)]
pub struct BeanAttributes {
    pub annotation: Option<LitStr>,
    pub priority: bool,
    pub multi_providers: Vec<Type>,
    pub conditional_on_property: Option<LitStr>,
    pub conditional_on_missing_bean: bool,
    pub condition: Option<ExprPath>,
}

impl BeanAttributes {
    pub fn parse(attributes: &[Attribute]) -> Result<Self> {
        let mut result = Self::default();
        for attribute in attributes.iter().filter(|attr| attr.path().is_ident(BEAN)) {
            attribute.parse_nested_meta(|meta| {
                if meta.path.is_ident("annotation") {
                    result.annotation = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("priority") {
                    result.priority = true;
                } else if meta.path.is_ident("multi_provider") {
                    result.multi_providers.push(parse_type(&meta)?);
                } else if meta.path.is_ident("conditional_on_property") {
                    result.conditional_on_property = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("conditional_on_missing_bean") {
                    result.conditional_on_missing_bean = true;
                } else if meta.path.is_ident("condition") {
                    let expr: LitStr = meta.value()?.parse()?;
                    result.condition = Some(expr.parse()?);
                } else {
                    return Err(meta.error("Unsupported bean attribute!"));
                }

                Ok(())
            })?;
        }

        Ok(result)
    }
}

fn parse_type(meta: &ParseNestedMeta) -> Result<Type> {
    let value: LitStr = meta.value()?.parse()?;
    value.parse()
}

/// Removes `#[bean]` attributes, which are not allowed to stay on function parameters.
pub fn strip_bean_attributes(attributes: &mut Vec<Attribute>) {
    attributes.retain(|attr| !attr.path().is_ident(BEAN));
}
