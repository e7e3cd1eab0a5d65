//! Type-erased access to bean instances, along with strongly-typed helpers built on top of it.

use crate::bean::Injectable;
use crate::error::{BeanDefinitionError, BeanInstanceProviderError};
use crate::property::ConfigurationFiles;
#[cfg(test)]
use mockall::automock;
use serde::de::DeserializeOwned;
use std::any::{type_name, Any, TypeId};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type BeanInstancePtr<T> = Arc<T>;

pub type BeanInstanceAnyPtr = BeanInstancePtr<dyn Any + Send + Sync + 'static>;

pub type ErrorPtr = Arc<dyn Error + Send + Sync>;

/// Casts a type-erased instance into a `Box<BeanInstancePtr<T>>` of the type it was requested
/// as. Concrete beans and interface aliases of the same instance use different cast functions.
/// On failure, the original instance is returned.
pub type CastFunction =
    fn(instance: BeanInstanceAnyPtr) -> Result<Box<dyn Any>, BeanInstanceAnyPtr>;

/// Lookup key for beans: a concrete bean type or an `#[injectable]` interface.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct BeanType {
    pub id: TypeId,
    pub name: &'static str,
    pub interface: bool,
}

impl BeanType {
    #[inline]
    pub fn of<T: Injectable + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            interface: T::INTERFACE,
        }
    }
}

impl Display for BeanType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Generic provider for bean instances. Generated constructors, providers and hooks only ever
/// see the container through this trait.
#[cfg_attr(test, automock)]
pub trait BeanInstanceProvider {
    /// Returns the single instance for a given type, creating it on first use. For interfaces,
    /// the only eligible implementation is selected.
    fn primary_instance(
        &mut self,
        bean_type: BeanType,
    ) -> Result<(BeanInstanceAnyPtr, CastFunction), BeanInstanceProviderError>;

    /// Returns all instances aggregated under the given key.
    fn instances(
        &mut self,
        bean_type: BeanType,
    ) -> Result<Vec<(BeanInstanceAnyPtr, CastFunction)>, BeanInstanceProviderError>;

    /// Returns the host handle, if the container has one.
    fn host(&self) -> Option<BeanInstanceAnyPtr>;

    /// Returns the configuration available at this point of initialization.
    fn configuration(&self) -> &ConfigurationFiles;
}

/// Helper trait for [BeanInstanceProvider] providing strongly-typed access.
pub trait TypedBeanInstanceProvider {
    /// Typesafe version of [BeanInstanceProvider::primary_instance].
    fn primary_instance_typed<T: Injectable + ?Sized>(
        &mut self,
    ) -> Result<BeanInstancePtr<T>, BeanInstanceProviderError>;

    /// Tries to get an instance like [TypedBeanInstanceProvider::primary_instance_typed] does,
    /// but returns `None` when no eligible bean exists.
    fn primary_instance_option<T: Injectable + ?Sized>(
        &mut self,
    ) -> Result<Option<BeanInstancePtr<T>>, BeanInstanceProviderError>;

    /// Typesafe version of [BeanInstanceProvider::instances].
    fn instances_typed<T: Injectable + ?Sized>(
        &mut self,
    ) -> Result<Vec<BeanInstancePtr<T>>, BeanInstanceProviderError>;

    /// Returns the host handle downcast to `H`.
    fn host_typed<H: Send + Sync + 'static>(
        &self,
    ) -> Result<BeanInstancePtr<H>, BeanInstanceProviderError>;

    /// Resolves an optional configuration value, falling back to `T::default()`.
    fn property<T: DeserializeOwned + Default>(
        &self,
        identifier: &str,
        target: &str,
    ) -> Result<T, BeanInstanceProviderError>;

    /// Resolves a configuration value which must be present.
    fn required_property<T: DeserializeOwned>(
        &self,
        identifier: &str,
        target: &str,
        message: Option<&str>,
    ) -> Result<T, BeanInstanceProviderError>;
}

impl<CIP: BeanInstanceProvider + ?Sized> TypedBeanInstanceProvider for CIP {
    fn primary_instance_typed<T: Injectable + ?Sized>(
        &mut self,
    ) -> Result<BeanInstancePtr<T>, BeanInstanceProviderError> {
        self.primary_instance(BeanType::of::<T>())
            .and_then(|(instance, cast)| cast_instance(instance, cast))
    }

    fn primary_instance_option<T: Injectable + ?Sized>(
        &mut self,
    ) -> Result<Option<BeanInstancePtr<T>>, BeanInstanceProviderError> {
        match self.primary_instance_typed::<T>() {
            Ok(instance) => Ok(Some(instance)),
            Err(BeanInstanceProviderError::MissingBean(_))
            | Err(BeanInstanceProviderError::InvalidBean(_))
            | Err(BeanInstanceProviderError::Definition(
                BeanDefinitionError::MissingBeanAnnotation(_),
            )) => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn instances_typed<T: Injectable + ?Sized>(
        &mut self,
    ) -> Result<Vec<BeanInstancePtr<T>>, BeanInstanceProviderError> {
        self.instances(BeanType::of::<T>()).and_then(|instances| {
            instances
                .into_iter()
                .map(|(instance, cast)| cast_instance(instance, cast))
                .collect()
        })
    }

    fn host_typed<H: Send + Sync + 'static>(
        &self,
    ) -> Result<BeanInstancePtr<H>, BeanInstanceProviderError> {
        self.host()
            .ok_or_else(|| BeanInstanceProviderError::MissingHost(type_name::<H>().to_string()))?
            .downcast::<H>()
            .map_err(|_| BeanInstanceProviderError::IncompatibleHost(type_name::<H>().to_string()))
    }

    fn property<T: DeserializeOwned + Default>(
        &self,
        identifier: &str,
        target: &str,
    ) -> Result<T, BeanInstanceProviderError> {
        self.configuration()
            .property(identifier, target)
            .map(Option::unwrap_or_default)
    }

    fn required_property<T: DeserializeOwned>(
        &self,
        identifier: &str,
        target: &str,
        message: Option<&str>,
    ) -> Result<T, BeanInstanceProviderError> {
        self.configuration()
            .property(identifier, target)?
            .ok_or_else(|| BeanInstanceProviderError::MissingProperty {
                target: target.to_string(),
                identifier: identifier.to_string(),
                message: message.map(str::to_string),
            })
    }
}

/// Applies a [CastFunction] and unwraps the resulting pointer.
pub fn cast_instance<T: ?Sized + 'static>(
    instance: BeanInstanceAnyPtr,
    cast: CastFunction,
) -> Result<BeanInstancePtr<T>, BeanInstanceProviderError> {
    cast(instance)
        .ok()
        .and_then(|instance| instance.downcast::<BeanInstancePtr<T>>().ok())
        .map(|instance| *instance)
        .ok_or_else(|| BeanInstanceProviderError::IncompatibleBean(type_name::<T>().to_string()))
}

/// Values which can be injected into bean fields and provider parameters. Implemented for
/// single instances, optional instances and aggregated collections.
pub trait Inject: Sized {
    fn inject(
        instance_provider: &mut dyn BeanInstanceProvider,
    ) -> Result<Self, BeanInstanceProviderError>;
}

impl<T: Injectable + ?Sized> Inject for BeanInstancePtr<T> {
    #[inline]
    fn inject(
        instance_provider: &mut dyn BeanInstanceProvider,
    ) -> Result<Self, BeanInstanceProviderError> {
        instance_provider.primary_instance_typed::<T>()
    }
}

impl<T: Injectable + ?Sized> Inject for Option<BeanInstancePtr<T>> {
    #[inline]
    fn inject(
        instance_provider: &mut dyn BeanInstanceProvider,
    ) -> Result<Self, BeanInstanceProviderError> {
        instance_provider.primary_instance_option::<T>()
    }
}

impl<T: Injectable + ?Sized> Inject for Vec<BeanInstancePtr<T>> {
    #[inline]
    fn inject(
        instance_provider: &mut dyn BeanInstanceProvider,
    ) -> Result<Self, BeanInstanceProviderError> {
        instance_provider.instances_typed::<T>()
    }
}

#[cfg(test)]
mod tests {
    use crate::bean::Injectable;
    use crate::error::BeanInstanceProviderError;
    use crate::instance_provider::{
        BeanInstanceAnyPtr, BeanInstancePtr, BeanType, CastFunction, Inject,
        MockBeanInstanceProvider, TypedBeanInstanceProvider,
    };
    use crate::property::ConfigurationFiles;
    use config::Config;
    use mockall::predicate::*;
    use std::any::Any;

    #[derive(Debug)]
    struct TestBean(i8);

    impl Injectable for TestBean {}

    #[derive(Debug)]
    struct TestHost;

    fn cast(instance: BeanInstanceAnyPtr) -> Result<Box<dyn Any>, BeanInstanceAnyPtr> {
        instance
            .downcast::<TestBean>()
            .map(|p| Box::new(p) as Box<dyn Any>)
    }

    fn failing_cast(instance: BeanInstanceAnyPtr) -> Result<Box<dyn Any>, BeanInstanceAnyPtr> {
        Err(instance)
    }

    #[test]
    fn should_return_typed_instance() {
        let mut provider = MockBeanInstanceProvider::new();
        provider
            .expect_primary_instance()
            .with(eq(BeanType::of::<TestBean>()))
            .times(1)
            .returning(|_| {
                Ok((
                    BeanInstancePtr::new(TestBean(5)) as BeanInstanceAnyPtr,
                    cast as CastFunction,
                ))
            });

        assert_eq!(provider.primary_instance_typed::<TestBean>().unwrap().0, 5);
    }

    #[test]
    fn should_report_incompatible_cast() {
        let mut provider = MockBeanInstanceProvider::new();
        provider.expect_primary_instance().returning(|_| {
            Ok((
                BeanInstancePtr::new(TestBean(5)) as BeanInstanceAnyPtr,
                failing_cast as CastFunction,
            ))
        });

        assert!(matches!(
            provider.primary_instance_typed::<TestBean>().unwrap_err(),
            BeanInstanceProviderError::IncompatibleBean(_)
        ));
    }

    #[test]
    fn should_return_none_for_missing_optional_instance() {
        let mut provider = MockBeanInstanceProvider::new();
        provider.expect_primary_instance().returning(|bean_type| {
            Err(BeanInstanceProviderError::InvalidBean(
                bean_type.name.to_string(),
            ))
        });

        assert!(provider
            .primary_instance_option::<TestBean>()
            .unwrap()
            .is_none());
    }

    #[test]
    fn should_forward_other_errors_for_optional_instance() {
        let mut provider = MockBeanInstanceProvider::new();
        provider.expect_primary_instance().returning(|_| {
            Err(BeanInstanceProviderError::CircularDependency(
                "a -> a".to_string(),
            ))
        });

        assert!(provider.primary_instance_option::<TestBean>().is_err());
    }

    #[test]
    fn should_inject_collections() {
        let mut provider = MockBeanInstanceProvider::new();
        provider
            .expect_instances()
            .with(eq(BeanType::of::<TestBean>()))
            .times(1)
            .returning(|_| {
                Ok(vec![
                    (
                        BeanInstancePtr::new(TestBean(1)) as BeanInstanceAnyPtr,
                        cast as CastFunction,
                    ),
                    (
                        BeanInstancePtr::new(TestBean(2)) as BeanInstanceAnyPtr,
                        cast as CastFunction,
                    ),
                ])
            });

        let instances =
            <Vec<BeanInstancePtr<TestBean>> as Inject>::inject(&mut provider).unwrap();
        assert_eq!(
            instances.iter().map(|bean| bean.0).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn should_downcast_host() {
        let mut provider = MockBeanInstanceProvider::new();
        provider
            .expect_host()
            .returning(|| Some(BeanInstancePtr::new(TestHost) as BeanInstanceAnyPtr));

        assert!(provider.host_typed::<TestHost>().is_ok());
        assert!(matches!(
            provider.host_typed::<TestBean>().unwrap_err(),
            BeanInstanceProviderError::IncompatibleHost(_)
        ));
    }

    #[test]
    fn should_report_missing_host() {
        let mut provider = MockBeanInstanceProvider::new();
        provider.expect_host().returning(|| None);

        assert!(matches!(
            provider.host_typed::<TestHost>().unwrap_err(),
            BeanInstanceProviderError::MissingHost(_)
        ));
    }

    #[test]
    fn should_resolve_properties() {
        let configuration = ConfigurationFiles::default().with_file(
            "config",
            Config::builder()
                .set_override("server.port", 25565_i64)
                .unwrap()
                .build()
                .unwrap(),
        );

        let mut provider = MockBeanInstanceProvider::new();
        provider
            .expect_configuration()
            .return_const(configuration);

        assert_eq!(
            provider
                .required_property::<u16>("server.port", "port", None)
                .unwrap(),
            25565
        );
        assert_eq!(
            provider.property::<u16>("server.timeout", "timeout").unwrap(),
            0
        );
        assert!(matches!(
            provider
                .required_property::<u16>("server.timeout", "timeout", Some("set a timeout"))
                .unwrap_err(),
            BeanInstanceProviderError::MissingProperty { .. }
        ));
    }
}
