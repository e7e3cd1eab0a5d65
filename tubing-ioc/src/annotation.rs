//! Bean annotations mark types as managed by the container and carry metadata shared by all
//! beans using them.
//!
//! The built-in [IOC_BEAN] annotation is used by default. Plugins can define their own, e.g. to
//! group listeners or commands under a multi provider key:
//!
//! ```
//! use tubing_ioc::{injectable, register_bean_annotation};
//!
//! #[injectable]
//! trait Listener {}
//!
//! register_bean_annotation!(
//!     name = "IocListener",
//!     multi_provider = dyn Listener + Send + Sync
//! );
//! ```

use crate::annotation::internal::BeanAnnotationRegisterer;
use crate::error::BeanDefinitionError;
use crate::instance_provider::BeanType;
use fxhash::FxHashMap;
use itertools::Itertools;

/// Name of the default bean annotation.
pub const IOC_BEAN: &str = "IocBean";

/// Metadata of a bean annotation.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct BeanAnnotation {
    pub name: &'static str,

    /// Beans with priority annotations are instantiated first during the bulk pass.
    pub priority: bool,

    /// Every bean using this annotation gets aggregated under this key.
    pub multi_provider: Option<BeanType>,
}

/// Registers a new bean annotation, which can then be used with
/// `#[bean(annotation = "...")]`.
#[macro_export]
macro_rules! register_bean_annotation {
    (@priority) => {
        false
    };
    (@priority $priority:expr) => {
        $priority
    };
    (@multi_provider) => {
        None
    };
    (@multi_provider $multi_provider:ty) => {
        Some($crate::instance_provider::BeanType::of::<$multi_provider>())
    };
    (name = $name:expr $(, priority = $priority:expr)? $(, multi_provider = $multi_provider:ty)? $(,)?) => {
        const _: () = {
            fn register() -> $crate::annotation::BeanAnnotation {
                $crate::annotation::BeanAnnotation {
                    name: $name,
                    priority: $crate::register_bean_annotation!(@priority $($priority)?),
                    multi_provider: $crate::register_bean_annotation!(@multi_provider $($multi_provider)?),
                }
            }

            $crate::annotation::internal::submit! {
                $crate::annotation::internal::BeanAnnotationRegisterer {
                    register
                }
            }
        };
    };
}

register_bean_annotation!(name = IOC_BEAN);

/// Known bean annotations, by name.
#[derive(Clone, Debug, Default)]
pub struct BeanAnnotationRegistry {
    annotations: FxHashMap<&'static str, BeanAnnotation>,
}

impl BeanAnnotationRegistry {
    /// Collects all statically registered annotations.
    pub fn discover() -> Result<Self, BeanDefinitionError> {
        Self::from_annotations(
            inventory::iter::<BeanAnnotationRegisterer>
                .into_iter()
                .map(|registerer| (registerer.register)()),
        )
    }

    pub fn from_annotations<I: IntoIterator<Item = BeanAnnotation>>(
        annotations: I,
    ) -> Result<Self, BeanDefinitionError> {
        let mut registry = Self::default();
        for annotation in annotations {
            registry.register(annotation)?;
        }

        Ok(registry)
    }

    /// Adds a new annotation. Names must be unique.
    pub fn register(&mut self, annotation: BeanAnnotation) -> Result<(), BeanDefinitionError> {
        if self.annotations.contains_key(annotation.name) {
            return Err(BeanDefinitionError::DuplicateBeanAnnotation(
                annotation.name.to_string(),
            ));
        }

        self.annotations.insert(annotation.name, annotation);
        Ok(())
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&BeanAnnotation> {
        self.annotations.get(name)
    }

    #[inline]
    pub fn is_bean_annotation(&self, name: &str) -> bool {
        self.annotations.contains_key(name)
    }

    /// Returns annotation names in alphabetical order.
    pub fn names(&self) -> Vec<&'static str> {
        self.annotations.keys().copied().sorted().collect_vec()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}

#[doc(hidden)]
pub mod internal {
    use crate::annotation::BeanAnnotation;
    use inventory::collect;
    pub use inventory::submit;

    pub struct BeanAnnotationRegisterer {
        pub register: fn() -> BeanAnnotation,
    }

    collect!(BeanAnnotationRegisterer);
}
