//! Core functionality for creating [Bean](crate::bean::Bean) instances.
//!
//! The factory drives a single initialization pass. Beans are created on demand while resolving
//! dependencies, so the order of the bulk pass only decides which independent beans come first.
//! Every created instance is kept in a [BeanRegistry], which is handed over to the
//! [IocContainer](crate::container::IocContainer) at the end.

use crate::annotation::BeanAnnotationRegistry;
use crate::conditional::ValidBeanSet;
use crate::config::ConfigurationLoader;
use crate::error::{BeanDefinitionError, BeanInstanceProviderError, IocError};
use crate::instance_provider::{
    BeanInstanceAnyPtr, BeanInstanceProvider, BeanType, CastFunction, TypedBeanInstanceProvider,
};
use crate::property::ConfigurationFiles;
use crate::registry::{AggregatedInstance, BeanRegistry};
use crate::scanner::{BeanAlias, ScanResult};
use fxhash::FxHashSet;
use itertools::Itertools;
use std::iter::once;
use tracing::debug;

/// Generic factory for beans. Uses definitions from a [ScanResult] to create and store instances
/// in a [BeanRegistry].
pub struct BeanFactory {
    scan: ScanResult,
    annotations: BeanAnnotationRegistry,
    registry: BeanRegistry,
    configuration: ConfigurationFiles,
    host: Option<BeanInstanceAnyPtr>,
    valid_beans: ValidBeanSet,
    types_under_construction: Vec<BeanType>,
    consumed_multi_providers: FxHashSet<usize>,
}

impl BeanFactory {
    /// Creates a new factory. The `registry` can contain pre-registered instances. Until
    /// [BeanFactory::filter_candidates] is called, conditions are not evaluated.
    pub fn new(
        scan: ScanResult,
        annotations: BeanAnnotationRegistry,
        registry: BeanRegistry,
        host: Option<BeanInstanceAnyPtr>,
    ) -> Self {
        let valid_beans = ValidBeanSet::unfiltered(&scan, &annotations);
        Self {
            scan,
            annotations,
            registry,
            configuration: Default::default(),
            host,
            valid_beans,
            types_under_construction: Default::default(),
            consumed_multi_providers: Default::default(),
        }
    }

    /// Resolves the [ConfigurationLoader] and loads configuration with it. Conditions depend on
    /// configuration, so the loader and its dependencies are resolved without filtering.
    pub fn load_configuration(&mut self) -> Result<(), IocError> {
        match self.primary_instance_option::<dyn ConfigurationLoader + Send + Sync>()? {
            Some(loader) => {
                self.configuration = loader.configuration_files()?;
                debug!("Loaded {} configuration files.", self.configuration.len());
            }
            None => debug!("No configuration loader available."),
        }

        Ok(())
    }

    /// Evaluates conditions against loaded configuration.
    pub fn filter_candidates(&mut self) {
        self.valid_beans =
            ValidBeanSet::filtered(&self.scan, &self.annotations, &self.configuration);
    }

    /// Returns the current number of valid bean types.
    pub fn valid_bean_count(&self) -> usize {
        self.valid_beans.len()
    }

    /// Creates every valid bean and builds every multi provider list.
    pub fn instantiate_valid_beans(&mut self) -> Result<(), BeanInstanceProviderError> {
        let bean_types = self.valid_beans.iter().copied().collect_vec();
        for bean_type in bean_types {
            self.instantiate(bean_type)?;
        }

        for key in self.multi_provider_keys() {
            self.resolve_multi(key)?;
        }

        Ok(())
    }

    /// Runs all after load hooks.
    pub fn run_after_load_hooks(&mut self) -> Result<(), BeanInstanceProviderError> {
        let hooks = self.scan.after_load_hooks().to_vec();
        for hook in hooks {
            debug!("Running after load hook {}.", hook.name);
            (hook.run)(self)?;
        }

        Ok(())
    }

    /// Finishes initialization, returning the scan, created instances and configuration.
    pub fn into_parts(self) -> (ScanResult, BeanRegistry, ConfigurationFiles) {
        (self.scan, self.registry, self.configuration)
    }

    fn multi_provider_keys(&self) -> Vec<BeanType> {
        let annotation_keys = self
            .annotations
            .names()
            .into_iter()
            .filter_map(|name| self.annotations.get(name))
            .filter_map(|annotation| annotation.multi_provider);

        let definition_keys = self
            .valid_beans
            .iter()
            .flat_map(|bean_type| self.scan.candidates_for(bean_type.id))
            .flat_map(|candidate| candidate.definition.multi_providers.iter().copied());

        self.scan
            .multi_provider_outputs()
            .into_iter()
            .chain(annotation_keys)
            .chain(definition_keys)
            .unique()
            .collect_vec()
    }

    fn instantiate(
        &mut self,
        bean_type: BeanType,
    ) -> Result<(BeanInstanceAnyPtr, CastFunction), BeanInstanceProviderError> {
        if bean_type.interface {
            self.resolve_interface(bean_type)
        } else {
            self.create_bean(bean_type)
        }
    }

    fn is_eligible(&self, alias: &BeanAlias) -> bool {
        self.valid_beans.contains(alias.target.id) || self.registry.contains(alias.target.id)
    }

    fn resolve_interface(
        &mut self,
        interface: BeanType,
    ) -> Result<(BeanInstanceAnyPtr, CastFunction), BeanInstanceProviderError> {
        if let Some(instance) = self.registry.instance(interface.id) {
            return Ok(instance);
        }

        if let Some(instance) = self
            .registry
            .preregistered_implementation(self.scan.implementations(interface.id))
        {
            return Ok(instance);
        }

        if let Some(instance) = self.provide(interface)? {
            return Ok(instance);
        }

        let implementations = self.scan.implementations(interface.id);
        if implementations.is_empty() {
            return Err(BeanInstanceProviderError::MissingBean(
                interface.name.to_string(),
            ));
        }

        let (unconditional, on_missing): (Vec<_>, Vec<_>) = implementations
            .iter()
            .filter(|alias| self.is_eligible(alias))
            .cloned()
            .partition(|alias| !self.scan.is_on_missing_bean(alias.target.id));

        let alias = match (unconditional.as_slice(), on_missing.as_slice()) {
            ([alias], _) | ([], [alias]) => alias.clone(),
            ([], []) => {
                return Err(BeanInstanceProviderError::MissingBean(
                    interface.name.to_string(),
                ))
            }
            ([], candidates) | (candidates, _) => {
                return Err(BeanInstanceProviderError::AmbiguousBean {
                    interface: interface.name.to_string(),
                    candidates: candidates.iter().map(|alias| alias.target.name).join(", "),
                })
            }
        };

        debug!("Resolved {} to {}.", interface.name, alias.target.name);

        self.instantiate(alias.target)
            .map(|(instance, _)| (instance, alias.cast))
    }

    fn provide(
        &mut self,
        bean_type: BeanType,
    ) -> Result<Option<(BeanInstanceAnyPtr, CastFunction)>, BeanInstanceProviderError> {
        let provider = match self.scan.providers_for(bean_type.id) {
            [] => return Ok(None),
            [provider] => provider.clone(),
            providers => {
                debug!(
                    "Found providers for {}: {}",
                    bean_type.name,
                    providers.iter().map(|provider| provider.name).join(", ")
                );
                return Err(BeanInstanceProviderError::AmbiguousProvider(
                    bean_type.name.to_string(),
                ));
            }
        };

        self.enter(bean_type)?;
        debug!("Creating {} with provider {}.", bean_type.name, provider.name);
        let instance = (provider.constructor)(self);
        self.leave();

        Ok(Some(self.registry.store_instance(
            bean_type.id,
            instance?,
            provider.cast,
        )))
    }

    fn create_bean(
        &mut self,
        bean_type: BeanType,
    ) -> Result<(BeanInstanceAnyPtr, CastFunction), BeanInstanceProviderError> {
        if let Some(instance) = self.registry.instance(bean_type.id) {
            return Ok(instance);
        }

        if let Some(instance) = self.provide(bean_type)? {
            return Ok(instance);
        }

        let definition = match self.scan.candidates_for(bean_type.id) {
            [] => {
                return Err(BeanDefinitionError::MissingBeanAnnotation(
                    bean_type.name.to_string(),
                )
                .into())
            }
            [candidate] => candidate.definition.clone(),
            _ => {
                return Err(
                    BeanDefinitionError::MultipleConstructors(bean_type.name.to_string()).into(),
                )
            }
        };

        let annotation = self
            .annotations
            .get(definition.annotation)
            .copied()
            .ok_or_else(|| {
                BeanDefinitionError::MissingBeanAnnotation(bean_type.name.to_string())
            })?;

        if !self.valid_beans.contains(bean_type.id) {
            return Err(BeanInstanceProviderError::InvalidBean(
                bean_type.name.to_string(),
            ));
        }

        self.enter(bean_type)?;
        debug!("Creating bean {}.", bean_type.name);
        let instance = (definition.constructor)(self);
        self.leave();

        let (instance, cast) = self
            .registry
            .store_instance(bean_type.id, instance?, definition.cast);

        for key in definition
            .multi_providers
            .iter()
            .copied()
            .chain(annotation.multi_provider)
            .unique()
        {
            let alias_cast = self
                .scan
                .alias(key.id, bean_type.id)
                .map(|alias| alias.cast)
                .ok_or_else(|| BeanDefinitionError::MultiProviderNotImplemented {
                    bean: bean_type.name.to_string(),
                    key: key.name.to_string(),
                })?;

            self.registry.aggregate(
                key.id,
                AggregatedInstance::from_bean(instance.clone(), alias_cast),
            );
        }

        Ok((instance, cast))
    }

    fn resolve_multi(
        &mut self,
        key: BeanType,
    ) -> Result<Vec<(BeanInstanceAnyPtr, CastFunction)>, BeanInstanceProviderError> {
        // concrete keys are entered when their bean gets created
        if key.interface {
            self.enter(key)?;
        }

        let result = self.build_aggregate(key);

        if key.interface {
            self.leave();
        }

        result?;

        Ok(self
            .registry
            .aggregated(key.id)
            .map(|instances| {
                instances
                    .iter()
                    .map(|instance| (instance.instance.clone(), instance.cast))
                    .collect_vec()
            })
            .unwrap_or_default())
    }

    fn build_aggregate(&mut self, key: BeanType) -> Result<(), BeanInstanceProviderError> {
        self.registry.touch_aggregate(key.id);

        if !key.interface && self.valid_beans.contains(key.id) {
            let (instance, cast) = self.create_bean(key)?;
            self.registry
                .aggregate(key.id, AggregatedInstance::from_bean(instance, cast));
        }

        let implementations = self
            .scan
            .implementations(key.id)
            .iter()
            .filter(|alias| self.is_eligible(alias))
            .cloned()
            .collect_vec();

        for alias in implementations {
            let (instance, _) = self.instantiate(alias.target)?;
            self.registry
                .aggregate(key.id, AggregatedInstance::from_bean(instance, alias.cast));
        }

        let providers = self
            .scan
            .multi_providers_for(key.id)
            .filter(|(index, _)| !self.consumed_multi_providers.contains(index))
            .map(|(index, provider)| (index, provider.clone()))
            .collect_vec();

        for (index, provider) in providers {
            self.consumed_multi_providers.insert(index);

            debug!("Invoking multi provider {} for {}.", provider.name, key.name);
            for instance in (provider.constructor)(self)? {
                self.registry.aggregate(key.id, instance);
            }
        }

        Ok(())
    }

    fn enter(&mut self, bean_type: BeanType) -> Result<(), BeanInstanceProviderError> {
        if let Some(position) = self
            .types_under_construction
            .iter()
            .position(|under_construction| *under_construction == bean_type)
        {
            return Err(BeanInstanceProviderError::CircularDependency(
                self.types_under_construction[position..]
                    .iter()
                    .chain(once(&bean_type))
                    .map(|bean_type| bean_type.name)
                    .join(" -> "),
            ));
        }

        self.types_under_construction.push(bean_type);
        Ok(())
    }

    fn leave(&mut self) {
        self.types_under_construction.pop();
    }
}

impl BeanInstanceProvider for BeanFactory {
    fn primary_instance(
        &mut self,
        bean_type: BeanType,
    ) -> Result<(BeanInstanceAnyPtr, CastFunction), BeanInstanceProviderError> {
        self.instantiate(bean_type)
    }

    fn instances(
        &mut self,
        bean_type: BeanType,
    ) -> Result<Vec<(BeanInstanceAnyPtr, CastFunction)>, BeanInstanceProviderError> {
        self.resolve_multi(bean_type)
    }

    #[inline]
    fn host(&self) -> Option<BeanInstanceAnyPtr> {
        self.host.clone()
    }

    #[inline]
    fn configuration(&self) -> &ConfigurationFiles {
        &self.configuration
    }
}

#[cfg(test)]
//noinspection DuplicatedCode
mod tests {
    use crate::annotation::{BeanAnnotation, BeanAnnotationRegistry, IOC_BEAN};
    use crate::bean::{cast, cast_alias, construct, Bean, BeanDowncast, Injectable};
    use crate::conditional::BeanConditions;
    use crate::error::{BeanDefinitionError, BeanInstanceProviderError};
    use crate::factory::BeanFactory;
    use crate::instance_provider::{
        BeanInstanceAnyPtr, BeanInstanceProvider, BeanInstancePtr, BeanType,
        TypedBeanInstanceProvider,
    };
    use crate::provider::{provided_instance, provided_instances};
    use crate::registry::{cast_provided, BeanRegistry};
    use crate::scanner::{
        BeanAlias, BeanDefinition, MultiProviderDefinition, ProviderDefinition, ScanResult,
        ScanResultBuilder,
    };

    trait Handler: Send + Sync {
        fn id(&self) -> &'static str;
    }

    impl std::fmt::Debug for dyn Handler + Send + Sync {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("dyn Handler")
        }
    }

    impl Injectable for dyn Handler + Send + Sync {
        const INTERFACE: bool = true;
    }

    macro_rules! handler {
        ($ty:ident, $id:literal) => {
            #[derive(Debug)]
            struct $ty;

            impl Injectable for $ty {}

            impl BeanDowncast<$ty> for $ty {
                fn downcast(
                    source: BeanInstanceAnyPtr,
                ) -> Result<BeanInstancePtr<Self>, BeanInstanceAnyPtr> {
                    source.downcast()
                }
            }

            impl BeanDowncast<$ty> for dyn Handler + Send + Sync {
                fn downcast(
                    source: BeanInstanceAnyPtr,
                ) -> Result<BeanInstancePtr<Self>, BeanInstanceAnyPtr> {
                    source.downcast::<$ty>().map(|p| p as BeanInstancePtr<Self>)
                }
            }

            impl Bean for $ty {
                fn create(
                    _instance_provider: &mut dyn BeanInstanceProvider,
                ) -> Result<Self, BeanInstanceProviderError> {
                    Ok($ty)
                }
            }

            impl Handler for $ty {
                fn id(&self) -> &'static str {
                    $id
                }
            }
        };
    }

    handler!(FirstHandler, "first");
    handler!(SecondHandler, "second");

    #[derive(Debug)]
    struct Cyclic;

    impl Injectable for Cyclic {}

    impl BeanDowncast<Cyclic> for Cyclic {
        fn downcast(
            source: BeanInstanceAnyPtr,
        ) -> Result<BeanInstancePtr<Self>, BeanInstanceAnyPtr> {
            source.downcast()
        }
    }

    impl Bean for Cyclic {
        fn create(
            instance_provider: &mut dyn BeanInstanceProvider,
        ) -> Result<Self, BeanInstanceProviderError> {
            instance_provider.primary_instance_typed::<Cyclic>()?;
            Ok(Cyclic)
        }
    }

    fn definition<T: Bean>(conditions: BeanConditions) -> BeanDefinition {
        BeanDefinition {
            bean_type: BeanType::of::<T>(),
            module_path: module_path!(),
            annotation: IOC_BEAN,
            priority: false,
            multi_providers: vec![],
            conditions,
            constructor: construct::<T>,
            cast: cast::<T>,
        }
    }

    fn alias<T: Bean>() -> BeanAlias
    where
        dyn Handler + Send + Sync: BeanDowncast<T>,
    {
        BeanAlias {
            interface: BeanType::of::<dyn Handler + Send + Sync>(),
            target: BeanType::of::<T>(),
            module_path: module_path!(),
            cast: cast_alias::<dyn Handler + Send + Sync, T>,
        }
    }

    fn annotations() -> BeanAnnotationRegistry {
        BeanAnnotationRegistry::from_annotations([BeanAnnotation {
            name: IOC_BEAN,
            priority: false,
            multi_provider: None,
        }])
        .unwrap()
    }

    fn handlers() -> ScanResultBuilder {
        ScanResult::builder()
            .with_bean(definition::<FirstHandler>(BeanConditions::default()))
            .with_bean(definition::<SecondHandler>(BeanConditions::default()))
            .with_alias(alias::<FirstHandler>())
            .with_alias(alias::<SecondHandler>())
    }

    fn factory(scan: ScanResultBuilder) -> BeanFactory {
        let mut factory = BeanFactory::new(
            scan.build().unwrap(),
            annotations(),
            BeanRegistry::default(),
            None,
        );
        factory.filter_candidates();
        factory
    }

    fn provided_handler(
        _instance_provider: &mut dyn BeanInstanceProvider,
    ) -> Result<BeanInstanceAnyPtr, BeanInstanceProviderError> {
        provided_instance(BeanInstancePtr::new(SecondHandler) as BeanInstancePtr<dyn Handler + Send + Sync>)
    }

    fn provider() -> ProviderDefinition {
        ProviderDefinition {
            output: BeanType::of::<dyn Handler + Send + Sync>(),
            name: "provided_handler",
            module_path: module_path!(),
            constructor: provided_handler,
            cast: cast_provided::<dyn Handler + Send + Sync>,
        }
    }

    #[test]
    fn should_return_same_instance() {
        let mut factory = factory(handlers());

        let first = factory.primary_instance_typed::<FirstHandler>().unwrap();
        let second = factory.primary_instance_typed::<FirstHandler>().unwrap();

        assert!(BeanInstancePtr::ptr_eq(&first, &second));
    }

    #[test]
    fn should_detect_ambiguous_implementations() {
        let mut factory = factory(handlers());

        assert!(matches!(
            factory
                .primary_instance_typed::<dyn Handler + Send + Sync>()
                .unwrap_err(),
            BeanInstanceProviderError::AmbiguousBean { .. }
        ));
    }

    #[test]
    fn should_prefer_unconditional_implementation() {
        let mut factory = factory(
            ScanResult::builder()
                .with_bean(definition::<FirstHandler>(BeanConditions {
                    on_missing_bean: true,
                    ..Default::default()
                }))
                .with_bean(definition::<SecondHandler>(BeanConditions::default()))
                .with_alias(alias::<FirstHandler>())
                .with_alias(alias::<SecondHandler>()),
        );

        assert_eq!(
            factory
                .primary_instance_typed::<dyn Handler + Send + Sync>()
                .unwrap()
                .id(),
            "second"
        );
    }

    #[test]
    fn should_fall_back_to_on_missing_implementation() {
        let mut factory = factory(
            ScanResult::builder()
                .with_bean(definition::<FirstHandler>(BeanConditions {
                    on_missing_bean: true,
                    ..Default::default()
                }))
                .with_alias(alias::<FirstHandler>()),
        );

        assert_eq!(
            factory
                .primary_instance_typed::<dyn Handler + Send + Sync>()
                .unwrap()
                .id(),
            "first"
        );
    }

    #[test]
    fn should_report_missing_implementation() {
        let mut factory = factory(ScanResult::builder());

        assert!(matches!(
            factory
                .primary_instance_typed::<dyn Handler + Send + Sync>()
                .unwrap_err(),
            BeanInstanceProviderError::MissingBean(_)
        ));
        assert!(factory
            .primary_instance_option::<dyn Handler + Send + Sync>()
            .unwrap()
            .is_none());
    }

    #[test]
    fn should_report_missing_annotation() {
        let mut factory = factory(ScanResult::builder());

        assert!(matches!(
            factory.primary_instance_typed::<FirstHandler>().unwrap_err(),
            BeanInstanceProviderError::Definition(BeanDefinitionError::MissingBeanAnnotation(_))
        ));
    }

    #[test]
    fn should_report_multiple_constructors() {
        let mut factory = factory(
            ScanResult::builder()
                .with_bean(definition::<FirstHandler>(BeanConditions::default()))
                .with_bean(definition::<FirstHandler>(BeanConditions::default())),
        );

        assert!(matches!(
            factory.primary_instance_typed::<FirstHandler>().unwrap_err(),
            BeanInstanceProviderError::Definition(BeanDefinitionError::MultipleConstructors(_))
        ));
    }

    #[test]
    fn should_prefer_provider() {
        let mut factory = factory(handlers().with_provider(provider()));

        let handler = factory
            .primary_instance_typed::<dyn Handler + Send + Sync>()
            .unwrap();
        assert_eq!(handler.id(), "second");

        let again = factory
            .primary_instance_typed::<dyn Handler + Send + Sync>()
            .unwrap();
        assert!(BeanInstancePtr::ptr_eq(&handler, &again));
    }

    #[test]
    fn should_detect_ambiguous_providers() {
        let mut factory = factory(
            ScanResult::builder()
                .with_provider(provider())
                .with_provider(provider()),
        );

        assert!(matches!(
            factory
                .primary_instance_typed::<dyn Handler + Send + Sync>()
                .unwrap_err(),
            BeanInstanceProviderError::AmbiguousProvider(_)
        ));
    }

    #[test]
    fn should_detect_cycles() {
        let mut factory =
            factory(ScanResult::builder().with_bean(definition::<Cyclic>(BeanConditions::default())));

        let error = factory.primary_instance_typed::<Cyclic>().unwrap_err();
        assert!(matches!(
            &error,
            BeanInstanceProviderError::CircularDependency(chain) if chain.contains(" -> ")
        ));

        // the failed construction must not leave a stale entry behind
        assert!(matches!(
            factory.primary_instance_typed::<Cyclic>().unwrap_err(),
            BeanInstanceProviderError::CircularDependency(_)
        ));
    }

    fn provided_handlers(
        _instance_provider: &mut dyn BeanInstanceProvider,
    ) -> Result<Vec<crate::registry::AggregatedInstance>, BeanInstanceProviderError> {
        provided_instances(vec![
            BeanInstancePtr::new(FirstHandler) as BeanInstancePtr<dyn Handler + Send + Sync>,
            BeanInstancePtr::new(SecondHandler) as BeanInstancePtr<dyn Handler + Send + Sync>,
        ])
    }

    #[test]
    fn should_aggregate_implementations_before_provided_instances() {
        let mut factory = factory(handlers().with_multi_provider(MultiProviderDefinition {
            output: BeanType::of::<dyn Handler + Send + Sync>(),
            name: "provided_handlers",
            module_path: module_path!(),
            constructor: provided_handlers,
        }));

        let handlers = factory
            .instances_typed::<dyn Handler + Send + Sync>()
            .unwrap();
        assert_eq!(
            handlers.iter().map(|handler| handler.id()).collect::<Vec<_>>(),
            vec!["first", "second", "first", "second"]
        );

        // providers are consumed once
        assert_eq!(
            factory
                .instances_typed::<dyn Handler + Send + Sync>()
                .unwrap()
                .len(),
            4
        );
    }

    #[test]
    fn should_report_untagged_multi_provider_bean() {
        let mut definition = definition::<FirstHandler>(BeanConditions::default());
        definition.multi_providers = vec![BeanType::of::<dyn Handler + Send + Sync>()];

        let mut factory = factory(ScanResult::builder().with_bean(definition));

        assert!(matches!(
            factory.primary_instance_typed::<FirstHandler>().unwrap_err(),
            BeanInstanceProviderError::Definition(
                BeanDefinitionError::MultiProviderNotImplemented { .. }
            )
        ));
    }
}
