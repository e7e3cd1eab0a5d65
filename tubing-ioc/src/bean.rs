//! One of the basic blocks of dependency injection is a [Bean]. Beans are singleton objects
//! managed by the container, which themselves can depend on other beans, configuration values and
//! the plugin host.
//!
//! ## Registering beans
//!
//! Any type which wants to be managed by the container needs to implement `Bean` and register a
//! [BeanDefinition](crate::scanner::BeanDefinition). For convenience, everything can be derived
//! when the `derive` feature is enabled:
//!
//! ```
//! use tubing_ioc::instance_provider::BeanInstancePtr;
//! use tubing_ioc::{bean_alias, injectable, Bean};
//!
//! #[injectable]
//! trait Storage {}
//!
//! #[derive(Bean)]
//! struct FileStorage;
//!
//! #[bean_alias]
//! impl Storage for FileStorage {}
//!
//! #[derive(Bean)]
//! struct PlayerService {
//!     // concrete type dependency
//!     storage_impl: BeanInstancePtr<FileStorage>,
//!     // interface dependency - note Send + Sync
//!     storage: BeanInstancePtr<dyn Storage + Send + Sync>,
//!     // optional dependency - don't fail, when not present
//!     optional_storage: Option<BeanInstancePtr<FileStorage>>,
//!     // all beans aggregated under the interface
//!     all_storages: Vec<BeanInstancePtr<dyn Storage + Send + Sync>>,
//!     #[bean(property = "players.max-count")]
//!     max_players: u32,
//!     #[bean(default)]
//!     cache_hits: u64,
//! }
//! ```
//!
//! ### Supported `#[bean]` struct configuration
//!
//! * `annotation = "name"` - bean annotation marking this type; `IocBean` by default
//! * `priority` - instantiate before non-priority beans during the bulk pass
//! * `multi_provider = "dyn Trait + Send + Sync"` - aggregate this bean under the given interface
//! * `conditional_on_property = "expr"` - register only if the configuration matches; see
//! [crate::conditional]
//! * `conditional_on_missing_bean` - use only when no unconditional implementation of the same
//! interface exists
//! * `condition = "path"` - call `path(context)` to decide if the bean should be registered
//!
//! ### Supported `#[bean]` field configuration
//!
//! * `host` - inject the plugin host handle
//! * `property = "file:key.path"` - inject a configuration value after construction
//! * `required` - fail initialization when the property is missing
//! * `error = "message"` - additional message for a missing required property
//! * `transform = "Type"` - map the raw value through a [ConfigTransformer](crate::property::ConfigTransformer)
//! * `default` - use `Default::default()` initialization
//! * `default = "expr"` - call `expr()` for initialization
//!
//! ## Registering interfaces
//!
//! Interfaces are `dyn Trait + Send + Sync` types, which make it possible to depend on an
//! abstraction instead of a concrete bean. Each such trait should be marked with `#[injectable]`,
//! and each implementation registered with `#[bean_alias]`.

use crate::error::BeanInstanceProviderError;
use crate::instance_provider::{BeanInstanceAnyPtr, BeanInstanceProvider, BeanInstancePtr};
use crate::property::ConfigurationFiles;
use std::any::Any;

/// Base trait for beans.
///
/// Beans might depend on other beans, which forms the basis for dependency injection. Bean
/// instances are always wrapped in a [BeanInstancePtr]. Please see the module-level documentation
/// for more information.
pub trait Bean: BeanDowncast<Self> + Sized + Send + Sync {
    /// Creates an instance of this bean using dependencies from given [BeanInstanceProvider].
    fn create(
        instance_provider: &mut dyn BeanInstanceProvider,
    ) -> Result<Self, BeanInstanceProviderError>;

    /// Sets configuration-bound fields on a freshly created instance.
    fn inject_properties(
        &mut self,
        _configuration: &ConfigurationFiles,
    ) -> Result<(), BeanInstanceProviderError> {
        Ok(())
    }
}

/// Helper trait for interfaces implemented by beans, thus allowing injection of beans based on
/// `dyn Trait` types. The type `C` refers to a concrete bean type. Typically automatically derived
/// when using the `#[bean_alias]` attribute.
pub trait BeanDowncast<C: Bean>: Injectable {
    fn downcast(
        source: BeanInstanceAnyPtr,
    ) -> Result<BeanInstancePtr<Self>, BeanInstanceAnyPtr>;
}

/// Marker trait for injectable types - beans and interfaces.
pub trait Injectable: 'static {
    /// Interfaces are resolved through their registered implementations.
    const INTERFACE: bool = false;
}

/// Type-erased constructor for `T`: creates the bean and injects its configuration properties.
pub fn construct<T: Bean>(
    instance_provider: &mut dyn BeanInstanceProvider,
) -> Result<BeanInstanceAnyPtr, BeanInstanceProviderError> {
    let mut bean = T::create(instance_provider)?;
    bean.inject_properties(instance_provider.configuration())?;
    Ok(BeanInstancePtr::new(bean) as BeanInstanceAnyPtr)
}

/// [CastFunction](crate::instance_provider::CastFunction) for a concrete bean.
pub fn cast<T: Bean>(instance: BeanInstanceAnyPtr) -> Result<Box<dyn Any>, BeanInstanceAnyPtr> {
    T::downcast(instance).map(|p| Box::new(p) as Box<dyn Any>)
}

/// [CastFunction](crate::instance_provider::CastFunction) for an interface implemented by `T`.
pub fn cast_alias<S: BeanDowncast<T> + ?Sized, T: Bean>(
    instance: BeanInstanceAnyPtr,
) -> Result<Box<dyn Any>, BeanInstanceAnyPtr> {
    S::downcast(instance).map(|p| Box::new(p) as Box<dyn Any>)
}

/// [CastFunction](crate::instance_provider::CastFunction) for instances registered directly,
/// outside of bean definitions.
pub fn cast_registered<T: Send + Sync + 'static>(
    instance: BeanInstanceAnyPtr,
) -> Result<Box<dyn Any>, BeanInstanceAnyPtr> {
    instance
        .downcast::<T>()
        .map(|p| Box::new(p) as Box<dyn Any>)
}

#[cfg(test)]
mod tests {
    use crate::bean::{cast, cast_alias, construct, Bean, BeanDowncast, Injectable};
    use crate::error::BeanInstanceProviderError;
    use crate::instance_provider::{
        cast_instance, BeanInstanceAnyPtr, BeanInstanceProvider, BeanInstancePtr,
        MockBeanInstanceProvider,
    };
    use crate::property::{inject_property, ConfigurationFiles};
    use config::Config;

    trait Greeter {
        fn greet(&self) -> String;
    }

    impl Injectable for dyn Greeter + Send + Sync {
        const INTERFACE: bool = true;
    }

    struct TestBean {
        name: String,
    }

    impl Injectable for TestBean {}

    impl BeanDowncast<TestBean> for TestBean {
        fn downcast(
            source: BeanInstanceAnyPtr,
        ) -> Result<BeanInstancePtr<Self>, BeanInstanceAnyPtr> {
            source.downcast()
        }
    }

    impl BeanDowncast<TestBean> for dyn Greeter + Send + Sync {
        fn downcast(
            source: BeanInstanceAnyPtr,
        ) -> Result<BeanInstancePtr<Self>, BeanInstanceAnyPtr> {
            source
                .downcast::<TestBean>()
                .map(|p| p as BeanInstancePtr<Self>)
        }
    }

    impl Bean for TestBean {
        fn create(
            _instance_provider: &mut dyn BeanInstanceProvider,
        ) -> Result<Self, BeanInstanceProviderError> {
            Ok(Self {
                name: "default".to_string(),
            })
        }

        fn inject_properties(
            &mut self,
            configuration: &ConfigurationFiles,
        ) -> Result<(), BeanInstanceProviderError> {
            inject_property(
                configuration,
                &mut self.name,
                "greeter.name",
                false,
                None,
                "TestBean::name",
            )
        }
    }

    impl Greeter for TestBean {
        fn greet(&self) -> String {
            format!("Hello {}", self.name)
        }
    }

    #[test]
    fn should_construct_and_inject_properties() {
        let configuration = ConfigurationFiles::default().with_file(
            "config",
            Config::builder()
                .set_override("greeter.name", "Steve")
                .unwrap()
                .build()
                .unwrap(),
        );

        let mut provider = MockBeanInstanceProvider::new();
        provider
            .expect_configuration()
            .return_const(configuration);

        let instance = construct::<TestBean>(&mut provider).unwrap();
        let greeter =
            cast_instance::<dyn Greeter + Send + Sync>(instance.clone(), cast_alias::<dyn Greeter + Send + Sync, TestBean>)
                .unwrap();
        assert_eq!(greeter.greet(), "Hello Steve");

        let bean = cast_instance::<TestBean>(instance, cast::<TestBean>).unwrap();
        assert_eq!(bean.name, "Steve");
    }

    #[test]
    fn should_keep_defaults_without_configuration() {
        let mut provider = MockBeanInstanceProvider::new();
        provider
            .expect_configuration()
            .return_const(ConfigurationFiles::default());

        let instance = construct::<TestBean>(&mut provider).unwrap();
        assert_eq!(
            cast_instance::<TestBean>(instance, cast::<TestBean>)
                .unwrap()
                .name,
            "default"
        );
    }
}
