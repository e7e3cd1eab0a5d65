use crate::instance_provider::ErrorPtr;
use thiserror::Error;

/// Errors related to reading configuration sources.
#[derive(Error, Clone, Debug)]
pub enum ConfigurationError {
    #[error("Cannot load configuration file '{file_id}': {error}")]
    Load { file_id: String, error: ErrorPtr },
    #[error("Configuration loader failed: {0}")]
    Loader(ErrorPtr),
}

/// Errors related to bean definitions discovered during scanning.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum BeanDefinitionError {
    #[error("Cannot instantiate bean with type {0}. Only one constructor should be defined")]
    MultipleConstructors(String),
    #[error("Cannot instantiate bean. No bean annotation present. [{0}]")]
    MissingBeanAnnotation(String),
    #[error("Bean annotation {0} is registered more than once")]
    DuplicateBeanAnnotation(String),
    #[error("Invalid condition '{expression}' on bean {bean}: {message}")]
    InvalidCondition {
        bean: String,
        expression: String,
        message: String,
    },
    #[error("Bean {bean} is registered as multi provider for {key}, but does not implement it")]
    MultiProviderNotImplemented { bean: String, key: String },
}

/// Errors related to creating and retrieving beans.
#[derive(Error, Clone, Debug)]
pub enum BeanInstanceProviderError {
    #[error("Multiple beans found with interface {interface}: [{candidates}]. At most one bean should be defined")]
    AmbiguousBean {
        interface: String,
        candidates: String,
    },
    #[error("Multiple bean providers found for {0}. At most one provider should be defined")]
    AmbiguousProvider(String),
    #[error("Cannot instantiate bean with interface {0}. No types implementing this interface")]
    MissingBean(String),
    #[error("Cannot instantiate bean. No valid bean found for: [{0}]")]
    InvalidBean(String),
    #[error(
        "Missing required property '{identifier}' for {target}{}",
        .message.as_ref().map(|message| format!(": {message}")).unwrap_or_default()
    )]
    MissingProperty {
        target: String,
        identifier: String,
        message: Option<String>,
    },
    #[error("Cannot convert property '{identifier}' for {target}: {message}")]
    InvalidProperty {
        target: String,
        identifier: String,
        message: String,
    },
    #[error("Cannot instantiate bean with type {type_name}: {error}")]
    Instantiation { type_name: String, error: ErrorPtr },
    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),
    #[error("Tried to downcast bean to incompatible type: {0}")]
    IncompatibleBean(String),
    #[error("Host handle is not of the requested type: {0}")]
    IncompatibleHost(String),
    #[error("No host handle available to inject as {0}")]
    MissingHost(String),
    #[error(transparent)]
    Definition(#[from] BeanDefinitionError),
}

/// Fatal container initialization error.
#[derive(Error, Clone, Debug)]
pub enum IocError {
    #[error("Tubing could not load the IOC container: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Tubing could not load the IOC container: {0}")]
    Definition(#[from] BeanDefinitionError),
    #[error("Tubing could not load the IOC container: {0}")]
    Resolution(#[from] BeanInstanceProviderError),
}
