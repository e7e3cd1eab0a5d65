//! Support for bean provider functions. Providers create instances which cannot be expressed as
//! `#[derive(Bean)]` types, e.g. trait objects built from configuration:
//!
//! ```
//! use tubing_ioc::instance_provider::BeanInstancePtr;
//! use tubing_ioc::{bean_provider, injectable};
//!
//! #[injectable]
//! trait Storage {}
//!
//! struct MemoryStorage;
//!
//! impl Storage for MemoryStorage {}
//!
//! #[bean_provider]
//! fn storage() -> BeanInstancePtr<dyn Storage + Send + Sync> {
//!     BeanInstancePtr::new(MemoryStorage)
//! }
//! ```
//!
//! Provider results are stored under their declared output type only. They are not registered as
//! implementations of other interfaces.

use crate::bean::Injectable;
use crate::error::BeanInstanceProviderError;
use crate::instance_provider::{BeanInstanceAnyPtr, BeanInstancePtr, ErrorPtr};
use crate::registry::AggregatedInstance;
use std::any::type_name;
use std::error::Error;
use std::sync::Arc;

/// Return types supported by bean provider functions.
pub trait ProviderOutput {
    type Bean: Injectable + Send + Sync + ?Sized;

    fn into_instance(self) -> Result<BeanInstancePtr<Self::Bean>, BeanInstanceProviderError>;
}

impl<T: Injectable + Send + Sync + ?Sized> ProviderOutput for BeanInstancePtr<T> {
    type Bean = T;

    #[inline]
    fn into_instance(self) -> Result<BeanInstancePtr<Self::Bean>, BeanInstanceProviderError> {
        Ok(self)
    }
}

impl<T: Injectable + Send + Sync + ?Sized, E: Error + Send + Sync + 'static> ProviderOutput
    for Result<BeanInstancePtr<T>, E>
{
    type Bean = T;

    fn into_instance(self) -> Result<BeanInstancePtr<Self::Bean>, BeanInstanceProviderError> {
        self.map_err(|error| instantiation_error(type_name::<T>(), error))
    }
}

/// Return types supported by multi provider functions.
pub trait MultiProviderOutput {
    type Bean: Injectable + Send + Sync + ?Sized;

    fn into_instances(self)
        -> Result<Vec<BeanInstancePtr<Self::Bean>>, BeanInstanceProviderError>;
}

impl<T: Injectable + Send + Sync + ?Sized> MultiProviderOutput for Vec<BeanInstancePtr<T>> {
    type Bean = T;

    #[inline]
    fn into_instances(
        self,
    ) -> Result<Vec<BeanInstancePtr<Self::Bean>>, BeanInstanceProviderError> {
        Ok(self)
    }
}

impl<T: Injectable + Send + Sync + ?Sized, E: Error + Send + Sync + 'static> MultiProviderOutput
    for Result<Vec<BeanInstancePtr<T>>, E>
{
    type Bean = T;

    fn into_instances(
        self,
    ) -> Result<Vec<BeanInstancePtr<Self::Bean>>, BeanInstanceProviderError> {
        self.map_err(|error| instantiation_error(type_name::<T>(), error))
    }
}

/// Return types supported by after load hooks.
pub trait AfterLoadOutput {
    fn into_result(self, hook: &str) -> Result<(), BeanInstanceProviderError>;
}

impl AfterLoadOutput for () {
    #[inline]
    fn into_result(self, _hook: &str) -> Result<(), BeanInstanceProviderError> {
        Ok(())
    }
}

impl<E: Error + Send + Sync + 'static> AfterLoadOutput for Result<(), E> {
    fn into_result(self, hook: &str) -> Result<(), BeanInstanceProviderError> {
        self.map_err(|error| instantiation_error(hook, error))
    }
}

/// Type-erases a provider result. The instance is wrapped once more, so unsized outputs can be
/// stored; use [cast_provided](crate::registry::cast_provided) to get it back.
pub fn provided_instance<O: ProviderOutput>(
    output: O,
) -> Result<BeanInstanceAnyPtr, BeanInstanceProviderError> {
    output
        .into_instance()
        .map(|instance| BeanInstancePtr::new(instance) as BeanInstanceAnyPtr)
}

/// Type-erases multi provider results.
pub fn provided_instances<O: MultiProviderOutput>(
    output: O,
) -> Result<Vec<AggregatedInstance>, BeanInstanceProviderError> {
    output.into_instances().map(|instances| {
        instances
            .into_iter()
            .map(AggregatedInstance::from_provided)
            .collect()
    })
}

fn instantiation_error<E: Error + Send + Sync + 'static>(
    type_name: &str,
    error: E,
) -> BeanInstanceProviderError {
    BeanInstanceProviderError::Instantiation {
        type_name: type_name.to_string(),
        error: Arc::new(error) as ErrorPtr,
    }
}

#[cfg(test)]
mod tests {
    use crate::bean::Injectable;
    use crate::error::BeanInstanceProviderError;
    use crate::instance_provider::{cast_instance, BeanInstancePtr};
    use crate::provider::{provided_instance, provided_instances, AfterLoadOutput};
    use crate::registry::cast_provided;
    use std::fmt::{Display, Formatter};

    trait Sound: Send + Sync {
        fn play(&self) -> &'static str;
    }

    impl Injectable for dyn Sound + Send + Sync {
        const INTERFACE: bool = true;
    }

    struct Click;

    impl Sound for Click {
        fn play(&self) -> &'static str {
            "click"
        }
    }

    #[derive(Debug)]
    struct TestError;

    impl Display for TestError {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.write_str("test error")
        }
    }

    impl std::error::Error for TestError {}

    #[test]
    fn should_erase_unsized_output() {
        let output = BeanInstancePtr::new(Click) as BeanInstancePtr<dyn Sound + Send + Sync>;
        let instance = provided_instance(output).unwrap();

        let sound = cast_instance::<dyn Sound + Send + Sync>(
            instance,
            cast_provided::<dyn Sound + Send + Sync>,
        )
        .unwrap();
        assert_eq!(sound.play(), "click");
    }

    #[test]
    fn should_wrap_provider_errors() {
        let output: Result<BeanInstancePtr<dyn Sound + Send + Sync>, TestError> = Err(TestError);

        assert!(matches!(
            provided_instance(output).unwrap_err(),
            BeanInstanceProviderError::Instantiation { error, .. } if error.to_string() == "test error"
        ));
    }

    #[test]
    fn should_keep_multi_provider_order() {
        let first = BeanInstancePtr::new(Click) as BeanInstancePtr<dyn Sound + Send + Sync>;
        let second = BeanInstancePtr::new(Click) as BeanInstancePtr<dyn Sound + Send + Sync>;
        let first_identity = BeanInstancePtr::as_ptr(&first) as *const () as usize;

        let instances = provided_instances(vec![first, second]).unwrap();

        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].identity, first_identity);
        assert_ne!(instances[0].identity, instances[1].identity);
    }

    #[test]
    fn should_convert_after_load_results() {
        assert!(().into_result("hook").is_ok());
        assert!(matches!(
            Err::<(), _>(TestError).into_result("hook").unwrap_err(),
            BeanInstanceProviderError::Instantiation { type_name, .. } if type_name == "hook"
        ));
    }
}
