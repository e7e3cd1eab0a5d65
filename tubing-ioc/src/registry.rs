//! Storage for created bean instances. Each concrete type is stored at most once, while multi
//! provider keys map to ordered lists of instances.

use crate::instance_provider::{BeanInstanceAnyPtr, BeanInstancePtr, CastFunction};
use crate::scanner::BeanAlias;
use derivative::Derivative;
use fxhash::{FxHashMap, FxHashSet};
use std::any::{Any, TypeId};

/// Instance aggregated under a multi provider key, along with the cast function for that key.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct AggregatedInstance {
    pub instance: BeanInstanceAnyPtr,

    #[derivative(Debug = "ignore")]
    pub cast: CastFunction,

    /// Address of the underlying object, used to detect duplicates.
    pub identity: usize,
}

impl AggregatedInstance {
    /// Wraps an instance of a concrete bean.
    pub fn from_bean(instance: BeanInstanceAnyPtr, cast: CastFunction) -> Self {
        let identity = BeanInstancePtr::as_ptr(&instance) as *const () as usize;
        Self {
            instance,
            cast,
            identity,
        }
    }

    /// Wraps an instance returned from a multi provider function.
    pub fn from_provided<T: ?Sized + Send + Sync + 'static>(instance: BeanInstancePtr<T>) -> Self {
        let identity = BeanInstancePtr::as_ptr(&instance) as *const () as usize;
        Self {
            instance: BeanInstancePtr::new(instance) as BeanInstanceAnyPtr,
            cast: cast_provided::<T>,
            identity,
        }
    }
}

/// [CastFunction] for instances stored as `BeanInstancePtr<BeanInstancePtr<T>>`, which is how
/// provider results are kept when `T` is unsized.
pub fn cast_provided<T: ?Sized + Send + Sync + 'static>(
    instance: BeanInstanceAnyPtr,
) -> Result<Box<dyn Any>, BeanInstanceAnyPtr> {
    instance
        .downcast::<BeanInstancePtr<T>>()
        .map(|p| Box::new(BeanInstancePtr::clone(&*p)) as Box<dyn Any>)
}

/// Registry of created beans.
#[derive(Clone, Debug, Default)]
pub struct BeanRegistry {
    instances: FxHashMap<TypeId, (BeanInstanceAnyPtr, CastFunction)>,
    aggregates: FxHashMap<TypeId, Vec<AggregatedInstance>>,
    preregistered: FxHashSet<TypeId>,
}

impl BeanRegistry {
    #[inline]
    pub fn instance(&self, id: TypeId) -> Option<(BeanInstanceAnyPtr, CastFunction)> {
        self.instances
            .get(&id)
            .map(|(instance, cast)| (instance.clone(), *cast))
    }

    /// Stores an instance unless one already exists for given type. Returns the stored instance.
    pub fn store_instance(
        &mut self,
        id: TypeId,
        instance: BeanInstanceAnyPtr,
        cast: CastFunction,
    ) -> (BeanInstanceAnyPtr, CastFunction) {
        let (instance, cast) = self
            .instances
            .entry(id)
            .or_insert((instance, cast));
        (instance.clone(), *cast)
    }

    /// Stores an instance supplied before initialization. Such instances take part in interface
    /// resolution before any bean gets created.
    pub fn store_preregistered(
        &mut self,
        id: TypeId,
        instance: BeanInstanceAnyPtr,
        cast: CastFunction,
    ) -> (BeanInstanceAnyPtr, CastFunction) {
        self.preregistered.insert(id);
        self.store_instance(id, instance, cast)
    }

    #[inline]
    pub fn is_preregistered(&self, id: TypeId) -> bool {
        self.preregistered.contains(&id)
    }

    /// Returns the instance for an interface, if exactly one of given implementations was
    /// pre-registered.
    pub fn preregistered_implementation(
        &self,
        implementations: &[BeanAlias],
    ) -> Option<(BeanInstanceAnyPtr, CastFunction)> {
        let mut preregistered = implementations
            .iter()
            .filter(|alias| self.is_preregistered(alias.target.id));

        match (preregistered.next(), preregistered.next()) {
            (Some(alias), None) => self
                .instance(alias.target.id)
                .map(|(instance, _)| (instance, alias.cast)),
            _ => None,
        }
    }

    #[inline]
    pub fn contains(&self, id: TypeId) -> bool {
        self.instances.contains_key(&id)
    }

    /// Returns instances aggregated under given key, if the list was built.
    #[inline]
    pub fn aggregated(&self, key: TypeId) -> Option<&[AggregatedInstance]> {
        self.aggregates.get(&key).map(Vec::as_slice)
    }

    /// Appends an instance to the list for given key, skipping instances already present.
    pub fn aggregate(&mut self, key: TypeId, instance: AggregatedInstance) {
        let instances = self.aggregates.entry(key).or_default();
        if !instances
            .iter()
            .any(|existing| existing.identity == instance.identity)
        {
            instances.push(instance);
        }
    }

    /// Makes sure a (possibly empty) list exists for given key.
    pub fn touch_aggregate(&mut self, key: TypeId) {
        self.aggregates.entry(key).or_default();
    }

    /// Returns the number of distinct stored instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
