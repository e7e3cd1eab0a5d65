//! Configuration is provided by a [ConfigurationLoader] bean, which is resolved before any other
//! bean, since conditions depend on loaded configuration.
//!
//! By default, [DefaultConfigurationLoader] loads an optional `config` file (any format supported
//! by the `config` crate) from the working directory, overridden by environment variables
//! prefixed with `TUBING_CONFIG_`. Plugins can register their own loader implementing
//! `dyn ConfigurationLoader + Send + Sync`, which replaces the default one:
//!
//! ```
//! use tubing_ioc::config::{ConfigurationLoader, FileConfigurationLoader};
//! use tubing_ioc::error::ConfigurationError;
//! use tubing_ioc::property::ConfigurationFiles;
//! use tubing_ioc::{bean_alias, Bean};
//!
//! #[derive(Bean)]
//! struct PluginConfigurationLoader;
//!
//! #[bean_alias]
//! impl ConfigurationLoader for PluginConfigurationLoader {
//!     fn configuration_files(&self) -> Result<ConfigurationFiles, ConfigurationError> {
//!         FileConfigurationLoader::new("plugins/my-plugin")
//!             .with_optional_file("config", "config.yml")
//!             .with_optional_file("messages", "messages.yml")
//!             .configuration_files()
//!     }
//! }
//! ```

use crate::bean::{cast, cast_alias, construct, Bean, BeanDowncast, Injectable};
use crate::conditional::BeanConditions;
use crate::error::{BeanInstanceProviderError, ConfigurationError};
use crate::instance_provider::{
    BeanInstanceAnyPtr, BeanInstanceProvider, BeanInstancePtr, BeanType, ErrorPtr,
};
use crate::property::{ConfigurationFiles, DEFAULT_CONFIGURATION_FILE};
use crate::scanner::internal::{BeanAliasRegisterer, BeanDefinitionRegisterer};
use crate::scanner::{BeanAlias, BeanDefinition};
use config::{Config, Environment, File};
use std::path::PathBuf;
use std::sync::Arc;

const CONFIG_ENV_PREFIX: &str = "TUBING_CONFIG";

/// Source of configuration files for beans.
pub trait ConfigurationLoader {
    fn configuration_files(&self) -> Result<ConfigurationFiles, ConfigurationError>;
}

impl Injectable for dyn ConfigurationLoader + Send + Sync {
    const INTERFACE: bool = true;
}

#[derive(Clone, Debug)]
struct FileSource {
    file_id: String,
    name: String,
    required: bool,
}

/// Loads configuration files relative to a base directory. The format of each file is based on
/// its extension; names without an extension are looked up with all supported extensions.
#[derive(Clone, Debug)]
pub struct FileConfigurationLoader {
    base_dir: PathBuf,
    files: Vec<FileSource>,
    environment_prefix: Option<String>,
}

impl FileConfigurationLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            files: vec![],
            environment_prefix: None,
        }
    }

    /// Adds a file which must exist.
    pub fn with_file(mut self, file_id: impl Into<String>, name: impl Into<String>) -> Self {
        self.files.push(FileSource {
            file_id: file_id.into(),
            name: name.into(),
            required: true,
        });
        self
    }

    /// Adds a file which is skipped when missing.
    pub fn with_optional_file(
        mut self,
        file_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.files.push(FileSource {
            file_id: file_id.into(),
            name: name.into(),
            required: false,
        });
        self
    }

    /// Overrides the default configuration file with environment variables with given prefix.
    /// Nested keys are separated with `__`, e.g. `PREFIX_SERVER__PORT` for `server.port`.
    pub fn with_environment(mut self, prefix: impl Into<String>) -> Self {
        self.environment_prefix = Some(prefix.into());
        self
    }
}

impl ConfigurationLoader for FileConfigurationLoader {
    fn configuration_files(&self) -> Result<ConfigurationFiles, ConfigurationError> {
        let mut files = ConfigurationFiles::default();
        for source in &self.files {
            let path = self.base_dir.join(&source.name);
            let mut builder = Config::builder()
                .add_source(File::with_name(&path.to_string_lossy()).required(source.required));

            if source.file_id == DEFAULT_CONFIGURATION_FILE {
                if let Some(prefix) = &self.environment_prefix {
                    builder = builder.add_source(
                        Environment::with_prefix(prefix)
                            .prefix_separator("_")
                            .separator("__"),
                    );
                }
            }

            let config = builder
                .build()
                .map_err(|error| ConfigurationError::Load {
                    file_id: source.file_id.clone(),
                    error: Arc::new(error) as ErrorPtr,
                })?;

            files.insert(source.file_id.clone(), config);
        }

        Ok(files)
    }
}

/// Loader returning already prepared configuration.
#[derive(Clone, Debug, Default)]
pub struct StaticConfigurationLoader {
    files: ConfigurationFiles,
}

impl StaticConfigurationLoader {
    pub fn new(files: ConfigurationFiles) -> Self {
        Self { files }
    }
}

impl ConfigurationLoader for StaticConfigurationLoader {
    fn configuration_files(&self) -> Result<ConfigurationFiles, ConfigurationError> {
        Ok(self.files.clone())
    }
}

/// Loader used when no other [ConfigurationLoader] is registered.
#[derive(Clone, Debug)]
pub struct DefaultConfigurationLoader {
    loader: FileConfigurationLoader,
}

impl Default for DefaultConfigurationLoader {
    fn default() -> Self {
        Self {
            loader: FileConfigurationLoader::new(".")
                .with_optional_file(DEFAULT_CONFIGURATION_FILE, DEFAULT_CONFIGURATION_FILE)
                .with_environment(CONFIG_ENV_PREFIX),
        }
    }
}

impl ConfigurationLoader for DefaultConfigurationLoader {
    fn configuration_files(&self) -> Result<ConfigurationFiles, ConfigurationError> {
        self.loader.configuration_files()
    }
}

impl Injectable for DefaultConfigurationLoader {}

impl BeanDowncast<DefaultConfigurationLoader> for DefaultConfigurationLoader {
    fn downcast(
        source: BeanInstanceAnyPtr,
    ) -> Result<BeanInstancePtr<Self>, BeanInstanceAnyPtr> {
        source.downcast()
    }
}

impl BeanDowncast<DefaultConfigurationLoader> for dyn ConfigurationLoader + Send + Sync {
    fn downcast(
        source: BeanInstanceAnyPtr,
    ) -> Result<BeanInstancePtr<Self>, BeanInstanceAnyPtr> {
        source
            .downcast::<DefaultConfigurationLoader>()
            .map(|p| p as BeanInstancePtr<Self>)
    }
}

impl Bean for DefaultConfigurationLoader {
    fn create(
        _instance_provider: &mut dyn BeanInstanceProvider,
    ) -> Result<Self, BeanInstanceProviderError> {
        Ok(Self::default())
    }
}

const _: () = {
    fn register_bean() -> BeanDefinition {
        BeanDefinition {
            bean_type: BeanType::of::<DefaultConfigurationLoader>(),
            module_path: module_path!(),
            annotation: crate::annotation::IOC_BEAN,
            priority: true,
            multi_providers: vec![],
            conditions: BeanConditions {
                on_missing_bean: true,
                ..Default::default()
            },
            constructor: construct::<DefaultConfigurationLoader>,
            cast: cast::<DefaultConfigurationLoader>,
        }
    }

    fn register_alias() -> BeanAlias {
        BeanAlias {
            interface: BeanType::of::<dyn ConfigurationLoader + Send + Sync>(),
            target: BeanType::of::<DefaultConfigurationLoader>(),
            module_path: module_path!(),
            cast: cast_alias::<dyn ConfigurationLoader + Send + Sync, DefaultConfigurationLoader>,
        }
    }

    inventory::submit! {
        BeanDefinitionRegisterer {
            register: register_bean
        }
    }

    inventory::submit! {
        BeanAliasRegisterer {
            register: register_alias
        }
    }
};
