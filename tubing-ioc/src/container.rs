//! The [IocContainer] holds every bean created during initialization. Initialization is a single
//! pass: scan registrations, load configuration, filter candidates by their conditions, create all
//! valid beans and run after load hooks. Any error aborts the whole pass.
//!
//! ```
//! use tubing_ioc::container::IocContainer;
//! use tubing_ioc::instance_provider::BeanInstancePtr;
//! use tubing_ioc::Bean;
//!
//! struct Server {
//!     name: String,
//! }
//!
//! #[derive(Bean)]
//! struct Greeter {
//!     #[bean(host)]
//!     server: BeanInstancePtr<Server>,
//! }
//!
//! let container = IocContainer::initialize(
//!     module_path!(),
//!     BeanInstancePtr::new(Server {
//!         name: "lobby".to_string(),
//!     }),
//! )
//! .unwrap();
//!
//! let greeter = container.get::<Greeter>().unwrap();
//! assert_eq!(greeter.server.name, "lobby");
//! ```
//!
//! After initialization, the container is immutable and can be shared between threads.

use crate::annotation::BeanAnnotationRegistry;
use crate::bean::{cast_registered, Injectable};
use crate::config::ConfigurationLoader;
use crate::error::{BeanInstanceProviderError, IocError};
use crate::factory::BeanFactory;
use crate::instance_provider::{
    cast_instance, BeanInstanceAnyPtr, BeanInstancePtr, BeanType, CastFunction,
};
use crate::property::ConfigurationFiles;
use crate::registry::{cast_provided, BeanRegistry};
use crate::scanner::{BeanAlias, ScanResult};
use itertools::Itertools;
use std::any::TypeId;
use tracing::info;

/// Builder for [IocContainer] allowing custom scans and pre-registered instances.
#[derive(Clone, Debug, Default)]
pub struct IocContainerBuilder {
    root_package: String,
    scan: Option<ScanResult>,
    annotations: Option<BeanAnnotationRegistry>,
    host: Option<BeanInstanceAnyPtr>,
    registry: BeanRegistry,
}

impl IocContainerBuilder {
    /// Limits scanning to registrations made in given module path and its submodules.
    pub fn with_root_package(mut self, root_package: impl Into<String>) -> Self {
        self.root_package = root_package.into();
        self
    }

    /// Uses given registrations instead of scanning.
    pub fn with_scan_result(mut self, scan: ScanResult) -> Self {
        self.scan = Some(scan);
        self
    }

    /// Uses given annotations instead of discovering registered ones.
    pub fn with_annotations(mut self, annotations: BeanAnnotationRegistry) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Sets the host handle, which is injected into `#[bean(host)]` fields and parameters. The
    /// host is also available as a bean of its own type.
    pub fn with_host<H: Send + Sync + 'static>(mut self, host: BeanInstancePtr<H>) -> Self {
        self.registry
            .store_preregistered(TypeId::of::<H>(), host.clone(), cast_registered::<H>);
        self.host = Some(host as BeanInstanceAnyPtr);
        self
    }

    /// Registers an existing instance as a bean of type `T`.
    pub fn with_bean<T: Send + Sync + 'static>(mut self, instance: BeanInstancePtr<T>) -> Self {
        self.registry
            .store_preregistered(TypeId::of::<T>(), instance, cast_registered::<T>);
        self
    }

    /// Registers an existing instance for an interface type, e.g. `dyn Trait + Send + Sync`.
    pub fn with_interface_bean<T: ?Sized + Send + Sync + 'static>(
        mut self,
        instance: BeanInstancePtr<T>,
    ) -> Self {
        self.registry.store_preregistered(
            TypeId::of::<T>(),
            BeanInstancePtr::new(instance) as BeanInstanceAnyPtr,
            cast_provided::<T>,
        );
        self
    }

    /// Uses given loader instead of resolving one from registered beans.
    pub fn with_configuration_loader(
        self,
        loader: BeanInstancePtr<dyn ConfigurationLoader + Send + Sync>,
    ) -> Self {
        self.with_interface_bean(loader)
    }

    /// Runs initialization.
    pub fn build(self) -> Result<IocContainer, IocError> {
        let scan = match self.scan {
            Some(scan) => scan,
            None => ScanResult::scan(&self.root_package)?,
        };
        info!(
            "Found {} bean registrations in '{}'.",
            scan.len(),
            self.root_package
        );

        let annotations = match self.annotations {
            Some(annotations) => annotations,
            None => BeanAnnotationRegistry::discover()?,
        };
        info!("Using bean annotations: {}", annotations.names().join(", "));

        let mut factory = BeanFactory::new(scan, annotations, self.registry, self.host);

        info!("Loading configuration...");
        factory.load_configuration()?;
        factory.filter_candidates();

        info!("Creating {} beans...", factory.valid_bean_count());
        factory.instantiate_valid_beans()?;

        info!("Running after load hooks...");
        factory.run_after_load_hooks()?;

        let (scan, registry, configuration) = factory.into_parts();
        info!("IOC container loaded with {} beans.", registry.len());

        Ok(IocContainer {
            scan,
            registry,
            configuration,
        })
    }
}

/// Initialized, read-only bean container.
#[derive(Clone, Debug)]
pub struct IocContainer {
    scan: ScanResult,
    registry: BeanRegistry,
    configuration: ConfigurationFiles,
}

impl IocContainer {
    pub fn builder() -> IocContainerBuilder {
        IocContainerBuilder::default()
    }

    /// Scans `root_package` and creates all beans, with `host` as the host handle.
    pub fn initialize<H: Send + Sync + 'static>(
        root_package: &str,
        host: BeanInstancePtr<H>,
    ) -> Result<Self, IocError> {
        Self::builder()
            .with_root_package(root_package)
            .with_host(host)
            .build()
    }

    /// Returns the bean of given type. For interfaces, exactly one created implementation must
    /// exist.
    pub fn get<T: Injectable + ?Sized>(&self) -> Result<BeanInstancePtr<T>, BeanInstanceProviderError> {
        let (instance, cast) = self.instance(BeanType::of::<T>())?;
        cast_instance(instance, cast)
    }

    /// Returns all beans aggregated under given key. Returns an empty list for keys which never
    /// had any beans.
    pub fn get_list<T: Injectable + ?Sized>(
        &self,
    ) -> Result<Vec<BeanInstancePtr<T>>, BeanInstanceProviderError> {
        self.registry
            .aggregated(TypeId::of::<T>())
            .unwrap_or_default()
            .iter()
            .map(|instance| cast_instance(instance.instance.clone(), instance.cast))
            .collect()
    }

    /// Checks if a bean for given type can be retrieved.
    pub fn contains<T: Injectable + ?Sized>(&self) -> bool {
        self.instance(BeanType::of::<T>()).is_ok()
    }

    /// Returns configuration loaded during initialization.
    #[inline]
    pub fn configuration(&self) -> &ConfigurationFiles {
        &self.configuration
    }

    /// Returns registrations used during initialization.
    #[inline]
    pub fn scan_result(&self) -> &ScanResult {
        &self.scan
    }

    /// Returns the number of created beans.
    #[inline]
    pub fn bean_count(&self) -> usize {
        self.registry.len()
    }

    fn instance(
        &self,
        bean_type: BeanType,
    ) -> Result<(BeanInstanceAnyPtr, CastFunction), BeanInstanceProviderError> {
        if let Some(instance) = self.registry.instance(bean_type.id) {
            return Ok(instance);
        }

        if !bean_type.interface {
            return Err(BeanInstanceProviderError::InvalidBean(
                bean_type.name.to_string(),
            ));
        }

        if let Some(instance) = self
            .registry
            .preregistered_implementation(self.scan.implementations(bean_type.id))
        {
            return Ok(instance);
        }

        let (unconditional, on_missing): (Vec<&BeanAlias>, Vec<&BeanAlias>) = self
            .scan
            .implementations(bean_type.id)
            .iter()
            .filter(|alias| self.registry.contains(alias.target.id))
            .partition(|alias| !self.scan.is_on_missing_bean(alias.target.id));

        let alias = match (unconditional.as_slice(), on_missing.as_slice()) {
            ([alias], _) | ([], [alias]) => *alias,
            ([], []) => {
                return Err(BeanInstanceProviderError::MissingBean(
                    bean_type.name.to_string(),
                ))
            }
            ([], candidates) | (candidates, _) => {
                return Err(BeanInstanceProviderError::AmbiguousBean {
                    interface: bean_type.name.to_string(),
                    candidates: candidates.iter().map(|alias| alias.target.name).join(", "),
                })
            }
        };

        self.registry
            .instance(alias.target.id)
            .map(|(instance, _)| (instance, alias.cast))
            .ok_or_else(|| BeanInstanceProviderError::MissingBean(bean_type.name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use crate::annotation::{BeanAnnotation, BeanAnnotationRegistry, IOC_BEAN};
    use crate::bean::Injectable;
    use crate::config::{ConfigurationLoader, StaticConfigurationLoader};
    use crate::container::IocContainer;
    use crate::error::BeanInstanceProviderError;
    use crate::instance_provider::BeanInstancePtr;
    use crate::property::ConfigurationFiles;
    use crate::scanner::ScanResult;
    use config::Config;

    trait Plugin: Send + Sync {
        fn name(&self) -> &str;
    }

    impl std::fmt::Debug for dyn Plugin + Send + Sync {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("dyn Plugin")
        }
    }

    impl Injectable for dyn Plugin + Send + Sync {
        const INTERFACE: bool = true;
    }

    #[derive(Debug)]
    struct TestPlugin;

    impl Injectable for TestPlugin {}

    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            "test"
        }
    }

    struct Host {
        version: u32,
    }

    impl Injectable for Host {}

    fn builder() -> crate::container::IocContainerBuilder {
        IocContainer::builder()
            .with_scan_result(ScanResult::default())
            .with_annotations(
                BeanAnnotationRegistry::from_annotations([BeanAnnotation {
                    name: IOC_BEAN,
                    priority: false,
                    multi_provider: None,
                }])
                .unwrap(),
            )
    }

    #[test]
    fn should_return_registered_beans() {
        let plugin = BeanInstancePtr::new(TestPlugin);
        let container = builder()
            .with_bean(plugin.clone())
            .with_interface_bean(plugin as BeanInstancePtr<dyn Plugin + Send + Sync>)
            .with_host(BeanInstancePtr::new(Host { version: 3 }))
            .build()
            .unwrap();

        assert!(container.get::<TestPlugin>().is_ok());
        assert_eq!(
            container.get::<dyn Plugin + Send + Sync>().unwrap().name(),
            "test"
        );
        assert_eq!(container.get::<Host>().unwrap().version, 3);
        assert_eq!(container.bean_count(), 3);
    }

    #[test]
    fn should_report_missing_beans() {
        let container = builder().build().unwrap();

        assert!(matches!(
            container.get::<TestPlugin>().unwrap_err(),
            BeanInstanceProviderError::InvalidBean(_)
        ));
        assert!(matches!(
            container.get::<dyn Plugin + Send + Sync>().unwrap_err(),
            BeanInstanceProviderError::MissingBean(_)
        ));
        assert!(!container.contains::<TestPlugin>());
        assert!(container
            .get_list::<dyn Plugin + Send + Sync>()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn should_use_given_configuration_loader() {
        let loader = StaticConfigurationLoader::new(ConfigurationFiles::default().with_file(
            "config",
            Config::builder()
                .set_override("plugin.name", "test")
                .unwrap()
                .build()
                .unwrap(),
        ));

        let container = builder()
            .with_configuration_loader(
                BeanInstancePtr::new(loader) as BeanInstancePtr<dyn ConfigurationLoader + Send + Sync>
            )
            .build()
            .unwrap();

        assert_eq!(
            container
                .configuration()
                .string_value("plugin.name")
                .unwrap(),
            "test"
        );
    }

    #[test]
    fn should_be_shareable_between_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<IocContainer>();
    }
}
