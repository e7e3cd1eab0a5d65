// note: this example assumes you've analyzed the previous ones

use config::Config;
use tubing_ioc::conditional::Context;
use tubing_ioc::config::{ConfigurationLoader, StaticConfigurationLoader};
use tubing_ioc::container::IocContainer;
use tubing_ioc::instance_provider::BeanInstancePtr;
use tubing_ioc::property::ConfigurationFiles;
use tubing_ioc::Bean;

// beans can be enabled by configuration, using simple expressions
#[derive(Bean)]
#[bean(conditional_on_property = "features.teleport = true")]
struct TeleportCommand;

// multiple checks can be combined with &&, || and !
#[derive(Bean)]
#[bean(conditional_on_property = "isEnabled(features.chat) && isNotEmpty(chat.channel)")]
struct ChatCommand;

// sometimes beans may want to be conditionally registered, based on some runtime logic
// in such cases, a condition function can be specified
#[derive(Bean)]
#[bean(condition = "is_debug_enabled")]
struct DebugCommand;

fn is_debug_enabled(context: &dyn Context) -> bool {
    context
        .configuration()
        .property::<bool>("debug", "is_debug_enabled")
        .ok()
        .flatten()
        .unwrap_or(false)
}

//noinspection DuplicatedCode
fn main() {
    let config = Config::builder()
        .set_override("features.teleport", true)
        .and_then(|builder| builder.set_override("features.chat", true))
        .and_then(|builder| builder.build())
        .expect("invalid configuration");
    let loader =
        StaticConfigurationLoader::new(ConfigurationFiles::default().with_file("config", config));

    let container = IocContainer::builder()
        .with_root_package(module_path!())
        .with_host(BeanInstancePtr::new(()))
        .with_configuration_loader(
            BeanInstancePtr::new(loader) as BeanInstancePtr<dyn ConfigurationLoader + Send + Sync>
        )
        .build()
        .expect("error initializing container");

    // prints "teleport: true, chat: false, debug: false"
    println!(
        "teleport: {}, chat: {}, debug: {}",
        container.contains::<TeleportCommand>(),
        container.contains::<ChatCommand>(),
        container.contains::<DebugCommand>()
    );
}
