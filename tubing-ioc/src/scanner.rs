//! Functionality related to discovering bean definitions. Every bean, interface implementation,
//! provider and after load hook registers itself in a static table, either with derive macros or
//! manually using the [internal] registerers. Scanning collects the registrations made inside a
//! given root package and indexes them for the resolution engine.

use crate::conditional::{BeanConditions, BeanDefinitionRegistryFacade, PropertyCondition};
use crate::error::{BeanDefinitionError, BeanInstanceProviderError};
use crate::instance_provider::{BeanInstanceAnyPtr, BeanInstanceProvider, BeanType, CastFunction};
use crate::registry::AggregatedInstance;
use crate::scanner::internal::{
    AfterLoadRegisterer, BeanAliasRegisterer, BeanDefinitionRegisterer,
    MultiProviderRegisterer, ProviderRegisterer,
};
use derivative::Derivative;
use fxhash::FxHashMap;
use itertools::Itertools;
use std::any::TypeId;

const CONTAINER_PACKAGE: &str = "tubing_ioc";

/// Type-erased constructor of beans and provider results.
pub type Constructor = fn(
    instance_provider: &mut dyn BeanInstanceProvider,
) -> Result<BeanInstanceAnyPtr, BeanInstanceProviderError>;

/// Type-erased multi provider function.
pub type MultiConstructor = fn(
    instance_provider: &mut dyn BeanInstanceProvider,
) -> Result<Vec<AggregatedInstance>, BeanInstanceProviderError>;

/// Type-erased after load hook.
pub type AfterLoadFunction =
    fn(instance_provider: &mut dyn BeanInstanceProvider) -> Result<(), BeanInstanceProviderError>;

/// Definition of a bean type.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct BeanDefinition {
    pub bean_type: BeanType,

    /// Module where the definition was registered. Used to match root packages.
    pub module_path: &'static str,

    /// Name of the bean annotation marking this type.
    pub annotation: &'static str,

    /// Instantiate before non-priority beans. Annotations can also carry priority.
    pub priority: bool,

    /// Interfaces under which instances of this bean get aggregated, in addition to the one
    /// carried by the annotation.
    pub multi_providers: Vec<BeanType>,

    pub conditions: BeanConditions,

    /// Constructor method for type-erased instances.
    #[derivative(Debug = "ignore")]
    pub constructor: Constructor,

    /// Cast function for the concrete type. Please see the documentation for [CastFunction] for
    /// details on usage.
    #[derivative(Debug = "ignore")]
    pub cast: CastFunction,
}

/// Registration of an interface implemented by a bean.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct BeanAlias {
    pub interface: BeanType,
    pub target: BeanType,
    pub module_path: &'static str,

    #[derivative(Debug = "ignore")]
    pub cast: CastFunction,
}

/// Function providing a single bean.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct ProviderDefinition {
    pub output: BeanType,
    pub name: &'static str,
    pub module_path: &'static str,

    #[derivative(Debug = "ignore")]
    pub constructor: Constructor,

    #[derivative(Debug = "ignore")]
    pub cast: CastFunction,
}

/// Function providing multiple beans aggregated under a single key.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct MultiProviderDefinition {
    pub output: BeanType,
    pub name: &'static str,
    pub module_path: &'static str,

    #[derivative(Debug = "ignore")]
    pub constructor: MultiConstructor,
}

/// Function run once after all valid beans are created.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct AfterLoadHook {
    pub name: &'static str,
    pub module_path: &'static str,

    #[derivative(Debug = "ignore")]
    pub run: AfterLoadFunction,
}

/// Bean definition with its property condition parsed.
#[derive(Clone, Debug)]
pub struct BeanCandidate {
    pub definition: BeanDefinition,
    pub property_condition: Option<PropertyCondition>,
}

impl BeanCandidate {
    pub fn new(definition: BeanDefinition) -> Result<Self, BeanDefinitionError> {
        let property_condition = definition
            .conditions
            .on_property
            .map(|expression| {
                PropertyCondition::parse(expression).map_err(|message| {
                    BeanDefinitionError::InvalidCondition {
                        bean: definition.bean_type.name.to_string(),
                        expression: expression.to_string(),
                        message,
                    }
                })
            })
            .transpose()?;

        Ok(Self {
            definition,
            property_condition,
        })
    }
}

/// Indexed registrations from a scan.
#[derive(Clone, Debug, Default)]
pub struct ScanResult {
    candidates: FxHashMap<TypeId, Vec<BeanCandidate>>,
    implementations: FxHashMap<TypeId, Vec<BeanAlias>>,
    interfaces: FxHashMap<TypeId, Vec<BeanType>>,
    providers: FxHashMap<TypeId, Vec<ProviderDefinition>>,
    multi_providers: Vec<MultiProviderDefinition>,
    after_load_hooks: Vec<AfterLoadHook>,
}

impl ScanResult {
    /// Collects all static registrations made in `root_package` (a module path prefix) or its
    /// submodules. An empty root package matches everything. Registrations of this crate are
    /// always included.
    pub fn scan(root_package: &str) -> Result<Self, BeanDefinitionError> {
        let mut builder = Self::builder();

        builder.beans = inventory::iter::<BeanDefinitionRegisterer>
            .into_iter()
            .map(|registerer| (registerer.register)())
            .filter(|definition| is_in_package(definition.module_path, root_package))
            .collect_vec();
        builder.aliases = inventory::iter::<BeanAliasRegisterer>
            .into_iter()
            .map(|registerer| (registerer.register)())
            .filter(|alias| is_in_package(alias.module_path, root_package))
            .collect_vec();
        builder.providers = inventory::iter::<ProviderRegisterer>
            .into_iter()
            .map(|registerer| (registerer.register)())
            .filter(|provider| is_in_package(provider.module_path, root_package))
            .collect_vec();
        builder.multi_providers = inventory::iter::<MultiProviderRegisterer>
            .into_iter()
            .map(|registerer| (registerer.register)())
            .filter(|provider| is_in_package(provider.module_path, root_package))
            .collect_vec();
        builder.after_load_hooks = inventory::iter::<AfterLoadRegisterer>
            .into_iter()
            .map(|registerer| (registerer.register)())
            .filter(|hook| is_in_package(hook.module_path, root_package))
            .collect_vec();

        builder.build()
    }

    /// Creates a builder for manually assembled scan results.
    pub fn builder() -> ScanResultBuilder {
        ScanResultBuilder::default()
    }

    /// Returns all candidates, sorted by type name.
    pub fn candidates(&self) -> Vec<&BeanCandidate> {
        self.candidates
            .values()
            .flatten()
            .sorted_by_key(|candidate| candidate.definition.bean_type.name)
            .collect_vec()
    }

    /// Returns candidates marked with given annotation, sorted by type name.
    pub fn candidates_with_annotation(&self, annotation: &str) -> Vec<&BeanCandidate> {
        self.candidates()
            .into_iter()
            .filter(|candidate| candidate.definition.annotation == annotation)
            .collect_vec()
    }

    /// Returns all definitions for given type. More than one means the type has multiple
    /// constructors.
    pub fn candidates_for(&self, id: TypeId) -> &[BeanCandidate] {
        self.candidates.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns implementations of given interface, sorted by implementing type name.
    pub fn implementations(&self, interface: TypeId) -> &[BeanAlias] {
        self.implementations
            .get(&interface)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns the registration of `target` implementing `interface`.
    pub fn alias(&self, interface: TypeId, target: TypeId) -> Option<&BeanAlias> {
        self.implementations(interface)
            .iter()
            .find(|alias| alias.target.id == target)
    }

    /// Returns interfaces implemented by given bean type.
    pub fn interfaces_of(&self, target: TypeId) -> &[BeanType] {
        self.interfaces.get(&target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns providers with given output type.
    pub fn providers_for(&self, output: TypeId) -> &[ProviderDefinition] {
        self.providers.get(&output).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns multi providers for given key along with their index, which identifies them
    /// during a single initialization.
    pub fn multi_providers_for(
        &self,
        output: TypeId,
    ) -> impl Iterator<Item = (usize, &MultiProviderDefinition)> {
        self.multi_providers
            .iter()
            .enumerate()
            .filter(move |(_, provider)| provider.output.id == output)
    }

    /// Returns keys of all multi providers, sorted by name.
    pub fn multi_provider_outputs(&self) -> Vec<BeanType> {
        self.multi_providers
            .iter()
            .map(|provider| provider.output)
            .unique()
            .sorted_by_key(|output| output.name)
            .collect_vec()
    }

    /// Checks if given type should only be used when no other implementation exists.
    pub fn is_on_missing_bean(&self, target: TypeId) -> bool {
        self.candidates_for(target)
            .iter()
            .any(|candidate| candidate.definition.conditions.on_missing_bean)
    }

    /// Returns output types of all providers, sorted by name.
    pub fn provider_outputs(&self) -> Vec<BeanType> {
        self.providers
            .values()
            .filter_map(|providers| providers.first())
            .map(|provider| provider.output)
            .sorted_by_key(|output| output.name)
            .collect_vec()
    }

    /// Returns after load hooks, sorted by module and function name.
    pub fn after_load_hooks(&self) -> &[AfterLoadHook] {
        &self.after_load_hooks
    }

    /// Returns the total number of registrations.
    pub fn len(&self) -> usize {
        self.candidates.values().map(Vec::len).sum::<usize>()
            + self.implementations.values().map(Vec::len).sum::<usize>()
            + self.providers.values().map(Vec::len).sum::<usize>()
            + self.multi_providers.len()
            + self.after_load_hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BeanDefinitionRegistryFacade for ScanResult {
    fn is_registered(&self, target: TypeId) -> bool {
        self.candidates.contains_key(&target)
            || self.implementations.contains_key(&target)
            || self.providers.contains_key(&target)
    }
}

/// Builder for [ScanResult] instances with manually provided definitions.
#[derive(Clone, Debug, Default)]
pub struct ScanResultBuilder {
    beans: Vec<BeanDefinition>,
    aliases: Vec<BeanAlias>,
    providers: Vec<ProviderDefinition>,
    multi_providers: Vec<MultiProviderDefinition>,
    after_load_hooks: Vec<AfterLoadHook>,
}

impl ScanResultBuilder {
    pub fn with_bean(mut self, definition: BeanDefinition) -> Self {
        self.beans.push(definition);
        self
    }

    pub fn with_alias(mut self, alias: BeanAlias) -> Self {
        self.aliases.push(alias);
        self
    }

    pub fn with_provider(mut self, provider: ProviderDefinition) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_multi_provider(mut self, provider: MultiProviderDefinition) -> Self {
        self.multi_providers.push(provider);
        self
    }

    pub fn with_after_load_hook(mut self, hook: AfterLoadHook) -> Self {
        self.after_load_hooks.push(hook);
        self
    }

    /// Indexes all definitions. Fails if any property condition cannot be parsed.
    pub fn build(self) -> Result<ScanResult, BeanDefinitionError> {
        let mut candidates: FxHashMap<TypeId, Vec<BeanCandidate>> = FxHashMap::default();
        for definition in self.beans {
            let candidate = BeanCandidate::new(definition)?;
            candidates
                .entry(candidate.definition.bean_type.id)
                .or_default()
                .push(candidate);
        }

        let mut implementations: FxHashMap<TypeId, Vec<BeanAlias>> = FxHashMap::default();
        let mut interfaces: FxHashMap<TypeId, Vec<BeanType>> = FxHashMap::default();
        for alias in self
            .aliases
            .into_iter()
            .sorted_by_key(|alias| (alias.target.name, alias.interface.name))
        {
            let entry = interfaces.entry(alias.target.id).or_default();
            if !entry.contains(&alias.interface) {
                entry.push(alias.interface);
            }

            let entry = implementations.entry(alias.interface.id).or_default();
            if !entry.iter().any(|existing| existing.target == alias.target) {
                entry.push(alias);
            }
        }

        let mut providers: FxHashMap<TypeId, Vec<ProviderDefinition>> = FxHashMap::default();
        for provider in self
            .providers
            .into_iter()
            .sorted_by_key(|provider| (provider.module_path, provider.name))
        {
            providers.entry(provider.output.id).or_default().push(provider);
        }

        Ok(ScanResult {
            candidates,
            implementations,
            interfaces,
            providers,
            multi_providers: self
                .multi_providers
                .into_iter()
                .sorted_by_key(|provider| (provider.module_path, provider.name))
                .collect_vec(),
            after_load_hooks: self
                .after_load_hooks
                .into_iter()
                .sorted_by_key(|hook| (hook.module_path, hook.name))
                .collect_vec(),
        })
    }
}

fn is_in_package(module_path: &str, root_package: &str) -> bool {
    let matches = |root: &str| {
        module_path == root
            || module_path
                .strip_prefix(root)
                .map(|rest| rest.starts_with("::"))
                .unwrap_or(false)
    };

    root_package.is_empty() || matches(root_package) || matches(CONTAINER_PACKAGE)
}

#[doc(hidden)]
pub mod internal {
    use crate::scanner::{
        AfterLoadHook, BeanAlias, BeanDefinition, MultiProviderDefinition, ProviderDefinition,
    };
    use inventory::collect;
    pub use inventory::submit;

    pub struct BeanDefinitionRegisterer {
        pub register: fn() -> BeanDefinition,
    }

    pub struct BeanAliasRegisterer {
        pub register: fn() -> BeanAlias,
    }

    pub struct ProviderRegisterer {
        pub register: fn() -> ProviderDefinition,
    }

    pub struct MultiProviderRegisterer {
        pub register: fn() -> MultiProviderDefinition,
    }

    pub struct AfterLoadRegisterer {
        pub register: fn() -> AfterLoadHook,
    }

    collect!(BeanDefinitionRegisterer);
    collect!(BeanAliasRegisterer);
    collect!(ProviderRegisterer);
    collect!(MultiProviderRegisterer);
    collect!(AfterLoadRegisterer);
}
