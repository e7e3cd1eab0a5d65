// note: this example assumes you've analyzed the previous ones

use config::{Config, Value};
use std::sync::Arc;
use tubing_ioc::config::{ConfigurationLoader, StaticConfigurationLoader};
use tubing_ioc::container::IocContainer;
use tubing_ioc::instance_provider::{BeanInstancePtr, ErrorPtr};
use tubing_ioc::property::{ConfigTransformer, ConfigurationFiles};
use tubing_ioc::Bean;

// transformers turn raw configuration values into field values
#[derive(Default)]
struct Uppercase;

impl ConfigTransformer for Uppercase {
    type Output = String;

    fn map_config(&self, value: Value) -> Result<Self::Output, ErrorPtr> {
        value
            .into_string()
            .map(|value| value.to_uppercase())
            .map_err(|error| Arc::new(error) as ErrorPtr)
    }
}

#[derive(Bean)]
struct MessageService {
    // values are read from the "config" file by default
    #[bean(property = "messages.prefix")]
    prefix: String,

    // other files are addressed with a "file:" prefix; missing required values fail loading
    #[bean(
        property = "messages:welcome",
        required,
        error = "Define a welcome message in messages.yml"
    )]
    welcome: String,

    // missing optional values keep the default
    #[bean(property = "messages.broadcast", transform = "Uppercase")]
    broadcast: String,

    // fields which are not beans or properties can be created by a function
    #[bean(default = "default_retries")]
    retries: u32,
}

fn default_retries() -> u32 {
    3
}

//noinspection DuplicatedCode
fn configuration() -> Result<ConfigurationFiles, config::ConfigError> {
    // a real plugin would usually use FileConfigurationLoader, reading files from its data folder
    let config = Config::builder()
        .set_override("messages.prefix", "[Server]")?
        .set_override("messages.broadcast", "restart in 5 minutes")?
        .build()?;
    let messages = Config::builder()
        .set_override("welcome", "Hello %messages.prefix%")?
        .build()?;

    Ok(ConfigurationFiles::default()
        .with_file("config", config)
        .with_file("messages", messages))
}

fn main() {
    let loader = StaticConfigurationLoader::new(configuration().expect("invalid configuration"));

    let container = IocContainer::builder()
        .with_root_package(module_path!())
        .with_host(BeanInstancePtr::new(()))
        .with_configuration_loader(
            BeanInstancePtr::new(loader) as BeanInstancePtr<dyn ConfigurationLoader + Send + Sync>
        )
        .build()
        .expect("error initializing container");

    let service = container
        .get::<MessageService>()
        .expect("error retrieving MessageService");

    // prints "[Server] Hello [Server]", since %identifier% tokens are substituted
    println!("{} {}", service.prefix, service.welcome);
    // prints "RESTART IN 5 MINUTES (3 retries)"
    println!("{} ({} retries)", service.broadcast, service.retries);
}
