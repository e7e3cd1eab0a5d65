//! Plugin lifecycle around an [IocContainer].

use crate::settings::TubingSettings;
use derive_more::Constructor;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tubing_ioc::bean::Injectable;
use tubing_ioc::container::IocContainer;
use tubing_ioc::error::{BeanInstanceProviderError, IocError};
use tubing_ioc::instance_provider::{BeanInstancePtr, ErrorPtr};

#[derive(Clone, Error, Debug)]
pub enum PluginError {
    #[error("Cannot load plugin settings: {0}")]
    Settings(ErrorPtr),
    #[error(transparent)]
    Container(#[from] IocError),
    #[error("Cannot retrieve bean: {0}")]
    Bean(#[from] BeanInstanceProviderError),
    #[error("Plugin {0} is not enabled")]
    NotEnabled(String),
}

/// Identification of a plugin.
#[derive(Clone, Debug, Constructor)]
pub struct PluginDescriptor {
    /// Human-readable plugin name, used in logs.
    pub name: String,

    /// Module path prefix containing the plugin beans, usually `module_path!()` of the plugin
    /// crate root.
    pub root_package: String,

    /// Directory containing plugin settings.
    pub data_dir: PathBuf,
}

/// Main entrypoint for plugins. Owns the host handle and the container created from it.
pub struct TubingPlugin<H: Send + Sync + 'static> {
    descriptor: PluginDescriptor,
    host: BeanInstancePtr<H>,
    settings: Option<TubingSettings>,
    container: Option<Arc<IocContainer>>,
}

impl<H: Send + Sync + 'static> TubingPlugin<H> {
    pub fn new(descriptor: PluginDescriptor, host: BeanInstancePtr<H>) -> Self {
        Self {
            descriptor,
            host,
            settings: None,
            container: None,
        }
    }

    /// Uses given settings instead of reading them when enabling.
    pub fn with_settings(mut self, settings: TubingSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Initializes the container. Enabling an enabled plugin does nothing.
    pub fn enable(&mut self) -> Result<(), PluginError> {
        if self.container.is_some() {
            warn!("Plugin {} is already enabled.", self.descriptor.name);
            return Ok(());
        }

        let settings = match &self.settings {
            Some(settings) => settings.clone(),
            None => TubingSettings::load_from(&self.descriptor.data_dir)
                .map_err(|error| PluginError::Settings(Arc::new(error) as ErrorPtr))?,
        };

        if settings.install_tracing_logger {
            install_tracing_logger();
        }

        info!("Enabling plugin {}...", self.descriptor.name);

        let container = IocContainer::builder()
            .with_root_package(self.descriptor.root_package.clone())
            .with_host(self.host.clone())
            .build()?;

        info!(
            "Plugin {} enabled with {} beans.",
            self.descriptor.name,
            container.bean_count()
        );

        self.container = Some(Arc::new(container));
        Ok(())
    }

    /// Drops the current container and creates a new one, picking up configuration changes.
    /// When initialization fails, the plugin stays disabled.
    pub fn reload(&mut self) -> Result<(), PluginError> {
        info!("Reloading plugin {}...", self.descriptor.name);
        self.disable();
        self.enable()
    }

    /// Drops the container. Beans still referenced elsewhere stay alive until released.
    pub fn disable(&mut self) {
        if self.container.take().is_some() {
            info!("Plugin {} disabled.", self.descriptor.name);
        } else {
            debug!("Plugin {} is not enabled.", self.descriptor.name);
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.container.is_some()
    }

    #[inline]
    pub fn container(&self) -> Option<&Arc<IocContainer>> {
        self.container.as_ref()
    }

    #[inline]
    pub fn host(&self) -> &BeanInstancePtr<H> {
        &self.host
    }

    #[inline]
    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    /// Shortcut for [IocContainer::get] on the current container.
    pub fn get<T: Injectable + ?Sized>(&self) -> Result<BeanInstancePtr<T>, PluginError> {
        self.container
            .as_ref()
            .ok_or_else(|| PluginError::NotEnabled(self.descriptor.name.clone()))?
            .get::<T>()
            .map_err(PluginError::from)
    }
}

fn install_tracing_logger() {
    // another plugin or the host might have installed one already
    if tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .is_err()
    {
        debug!("Tracing logger already installed.");
    }
}

#[cfg(test)]
mod tests {
    use crate::plugin::{PluginDescriptor, PluginError, TubingPlugin};
    use crate::settings::TubingSettings;
    use std::sync::Arc;
    use tubing_ioc::config::ConfigurationLoader;

    struct Host;

    fn plugin() -> TubingPlugin<Host> {
        TubingPlugin::new(
            PluginDescriptor::new(
                "test".to_string(),
                module_path!().to_string(),
                ".".into(),
            ),
            Arc::new(Host),
        )
        .with_settings(TubingSettings {
            install_tracing_logger: false,
        })
    }

    #[test]
    fn should_enable_and_disable() {
        let mut plugin = plugin();
        assert!(!plugin.is_enabled());

        plugin.enable().unwrap();
        assert!(plugin.is_enabled());
        assert!(plugin
            .get::<dyn ConfigurationLoader + Send + Sync>()
            .is_ok());

        plugin.disable();
        assert!(!plugin.is_enabled());
        assert!(matches!(
            plugin.get::<dyn ConfigurationLoader + Send + Sync>(),
            Err(PluginError::NotEnabled(_))
        ));
    }

    #[test]
    fn should_create_new_container_on_reload() {
        let mut plugin = plugin();
        plugin.enable().unwrap();
        let first = plugin.container().unwrap().clone();

        plugin.reload().unwrap();
        let second = plugin.container().unwrap().clone();

        assert!(!Arc::ptr_eq(&first, &second));
    }
}
