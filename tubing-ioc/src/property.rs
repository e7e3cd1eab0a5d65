//! Configuration-bound values for beans.
//!
//! Configuration is a set of named files, each being a hierarchical [Config] tree. A property is
//! addressed by an identifier in the form of `file:key.path`. When the `file:` prefix is omitted,
//! the [DEFAULT_CONFIGURATION_FILE] is used.
//!
//! Identifiers and string values can reference other properties with `%identifier%` tokens,
//! which get substituted before lookup:
//!
//! ```
//! use config::Config;
//! use tubing_ioc::property::ConfigurationFiles;
//!
//! let configuration = ConfigurationFiles::default().with_file(
//!     "config",
//!     Config::builder()
//!         .set_override("server.name", "lobby")
//!         .unwrap()
//!         .set_override("server.motd", "Welcome to %server.name%!")
//!         .unwrap()
//!         .build()
//!         .unwrap(),
//! );
//!
//! assert_eq!(
//!     configuration.string_value("server.motd").unwrap(),
//!     "Welcome to lobby!"
//! );
//! ```

use crate::error::BeanInstanceProviderError;
use crate::instance_provider::ErrorPtr;
use config::{Config, Value, ValueKind};
use fxhash::FxHashMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use tracing::warn;

/// File id used for identifiers without an explicit `file:` prefix.
pub const DEFAULT_CONFIGURATION_FILE: &str = "config";

const MAX_PLACEHOLDER_DEPTH: usize = 8;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new("%(.*?)%").unwrap());

/// Loaded configuration, keyed by file id.
#[derive(Clone, Debug, Default)]
pub struct ConfigurationFiles {
    files: FxHashMap<String, Config>,
}

impl ConfigurationFiles {
    /// Adds a file to this configuration, replacing a previous one with the same id.
    pub fn with_file(mut self, file_id: impl Into<String>, config: Config) -> Self {
        self.insert(file_id, config);
        self
    }

    pub fn insert(&mut self, file_id: impl Into<String>, config: Config) {
        self.files.insert(file_id.into(), config);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Returns the raw value for given identifier, with placeholders substituted.
    pub fn value(&self, identifier: &str) -> Option<Value> {
        self.value_at_depth(identifier, 0)
    }

    /// Returns the value for given identifier converted to a string.
    pub fn string_value(&self, identifier: &str) -> Option<String> {
        self.value(identifier)
            .and_then(|value| value.into_string().ok())
    }

    /// Substitutes `%identifier%` tokens in given identifier. Unresolvable tokens stay literal.
    pub fn resolve_identifier(&self, identifier: &str) -> String {
        self.substitute(identifier, 0)
    }

    /// Resolves a value and deserializes it into `T`. Returns `None` for missing values.
    pub fn property<T: DeserializeOwned>(
        &self,
        identifier: &str,
        target: &str,
    ) -> Result<Option<T>, BeanInstanceProviderError> {
        self.value(identifier)
            .map(|value| value.try_deserialize::<T>())
            .transpose()
            .map_err(|error| BeanInstanceProviderError::InvalidProperty {
                target: target.to_string(),
                identifier: identifier.to_string(),
                message: error.to_string(),
            })
    }

    fn value_at_depth(&self, identifier: &str, depth: usize) -> Option<Value> {
        let identifier = self.substitute(identifier, depth);
        let (file_id, path) = split_identifier(&identifier);

        let value = self.files.get(file_id)?.get::<Value>(path).ok()?;
        if let ValueKind::String(text) = &value.kind {
            if PLACEHOLDER.is_match(text) {
                return Some(Value::from(self.substitute(text, depth)));
            }
        }

        Some(value)
    }

    fn substitute(&self, text: &str, depth: usize) -> String {
        if depth >= MAX_PLACEHOLDER_DEPTH {
            warn!("Placeholder nesting too deep, not substituting: {}", text);
            return text.to_string();
        }

        PLACEHOLDER
            .replace_all(text, |captures: &Captures| {
                let nested = &captures[1];
                match self
                    .value_at_depth(nested, depth + 1)
                    .and_then(|value| value.into_string().ok())
                {
                    Some(value) => value,
                    None => {
                        warn!("No property found for config: {}", nested);
                        captures[0].to_string()
                    }
                }
            })
            .into_owned()
    }
}

impl FromIterator<(String, Config)> for ConfigurationFiles {
    fn from_iter<I: IntoIterator<Item = (String, Config)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

fn split_identifier(identifier: &str) -> (&str, &str) {
    identifier
        .split_once(':')
        .unwrap_or((DEFAULT_CONFIGURATION_FILE, identifier))
}

/// Maps a raw configuration value into a field value. Used with `#[bean(transform = "Type")]`;
/// a new transformer is created with [Default] for every injection.
pub trait ConfigTransformer: Default {
    type Output;

    fn map_config(&self, value: Value) -> Result<Self::Output, ErrorPtr>;
}

/// Sets `field` from configuration, leaving it unchanged when the value is missing and not
/// required.
pub fn inject_property<T: DeserializeOwned>(
    configuration: &ConfigurationFiles,
    field: &mut T,
    identifier: &str,
    required: bool,
    message: Option<&str>,
    target: &str,
) -> Result<(), BeanInstanceProviderError> {
    match configuration.property(identifier, target)? {
        Some(value) => {
            *field = value;
            Ok(())
        }
        None => check_missing(identifier, required, message, target),
    }
}

/// Like [inject_property], but passes the raw value through the transformer `X`.
pub fn inject_transformed_property<X: ConfigTransformer>(
    configuration: &ConfigurationFiles,
    field: &mut X::Output,
    identifier: &str,
    required: bool,
    message: Option<&str>,
    target: &str,
) -> Result<(), BeanInstanceProviderError> {
    match configuration.value(identifier) {
        Some(value) => {
            *field = X::default().map_config(value).map_err(|error| {
                BeanInstanceProviderError::InvalidProperty {
                    target: target.to_string(),
                    identifier: identifier.to_string(),
                    message: error.to_string(),
                }
            })?;
            Ok(())
        }
        None => check_missing(identifier, required, message, target),
    }
}

fn check_missing(
    identifier: &str,
    required: bool,
    message: Option<&str>,
    target: &str,
) -> Result<(), BeanInstanceProviderError> {
    if required {
        Err(BeanInstanceProviderError::MissingProperty {
            target: target.to_string(),
            identifier: identifier.to_string(),
            message: message.map(str::to_string),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::BeanInstanceProviderError;
    use crate::instance_provider::ErrorPtr;
    use crate::property::{
        inject_property, inject_transformed_property, ConfigTransformer, ConfigurationFiles,
    };
    use config::{Config, Value};
    use std::sync::Arc;

    fn configuration() -> ConfigurationFiles {
        ConfigurationFiles::default()
            .with_file(
                "config",
                Config::builder()
                    .set_override("a.b", "5")
                    .unwrap()
                    .set_override("a.c", "%config:a.b%-x")
                    .unwrap()
                    .set_override("a.loop", "%a.loop%")
                    .unwrap()
                    .set_override("section", "b")
                    .unwrap()
                    .set_override("flags.enabled", true)
                    .unwrap()
                    .build()
                    .unwrap(),
            )
            .with_file(
                "messages",
                Config::builder()
                    .set_override("greeting", "hello")
                    .unwrap()
                    .build()
                    .unwrap(),
            )
    }

    #[derive(Default)]
    struct UppercaseTransformer;

    impl ConfigTransformer for UppercaseTransformer {
        type Output = String;

        fn map_config(&self, value: Value) -> Result<Self::Output, ErrorPtr> {
            value
                .into_string()
                .map(|value| value.to_uppercase())
                .map_err(|error| Arc::new(error) as ErrorPtr)
        }
    }

    #[test]
    fn should_substitute_placeholders_in_values() {
        assert_eq!(configuration().string_value("a.c").unwrap(), "5-x");
    }

    #[test]
    fn should_substitute_placeholders_in_identifiers() {
        let configuration = configuration();
        assert_eq!(configuration.resolve_identifier("a.%section%"), "a.b");
        assert_eq!(configuration.string_value("a.%section%").unwrap(), "5");
    }

    #[test]
    fn should_leave_unresolved_placeholders() {
        assert_eq!(
            configuration().resolve_identifier("a.%missing%"),
            "a.%missing%"
        );
    }

    #[test]
    fn should_stop_at_self_referencing_placeholders() {
        assert!(configuration()
            .string_value("a.loop")
            .unwrap()
            .contains("%a.loop%"));
    }

    #[test]
    fn should_resolve_file_prefix() {
        let configuration = configuration();
        assert_eq!(
            configuration.string_value("messages:greeting").unwrap(),
            "hello"
        );
        assert!(configuration.value("greeting").is_none());
        assert!(configuration.value("unknown:greeting").is_none());
    }

    #[test]
    fn should_deserialize_properties() {
        let configuration = configuration();
        assert_eq!(
            configuration.property::<u32>("a.b", "target").unwrap(),
            Some(5)
        );
        assert_eq!(
            configuration
                .property::<bool>("flags.enabled", "target")
                .unwrap(),
            Some(true)
        );
        assert_eq!(
            configuration.property::<u32>("a.missing", "target").unwrap(),
            None
        );
    }

    #[test]
    fn should_report_invalid_property() {
        assert!(matches!(
            configuration()
                .property::<u32>("messages:greeting", "Bean::field")
                .unwrap_err(),
            BeanInstanceProviderError::InvalidProperty { target, .. } if target == "Bean::field"
        ));
    }

    #[test]
    fn should_inject_optional_property() {
        let configuration = configuration();
        let mut value = 10u32;

        inject_property(&configuration, &mut value, "a.missing", false, None, "t").unwrap();
        assert_eq!(value, 10);

        inject_property(&configuration, &mut value, "a.b", false, None, "t").unwrap();
        assert_eq!(value, 5);
    }

    #[test]
    fn should_fail_on_missing_required_property() {
        let mut value = String::new();
        let error = inject_property(
            &configuration(),
            &mut value,
            "a.missing",
            true,
            Some("configure a.missing"),
            "Bean::value",
        )
        .unwrap_err();

        assert!(matches!(
            error,
            BeanInstanceProviderError::MissingProperty { ref target, ref identifier, ref message }
                if target == "Bean::value"
                    && identifier == "a.missing"
                    && message.as_deref() == Some("configure a.missing")
        ));
        assert!(error.to_string().contains("Bean::value"));
    }

    #[test]
    fn should_inject_transformed_property() {
        let mut value = String::new();
        inject_transformed_property::<UppercaseTransformer>(
            &configuration(),
            &mut value,
            "messages:greeting",
            true,
            None,
            "t",
        )
        .unwrap();

        assert_eq!(value, "HELLO");
    }
}
