// note: this example assumes you've analyzed the previous ones

use std::convert::Infallible;
use tubing_ioc::bean::Injectable;
use tubing_ioc::container::IocContainer;
use tubing_ioc::instance_provider::BeanInstancePtr;
use tubing_ioc::{after_load, bean_multi_provider, bean_provider, injectable, Bean};

// this is what a plugin host might look like
struct Server {
    name: String,
}

// types retrieved from the container need to be injectable
impl Injectable for Server {}

struct ServerName(String);

impl Injectable for ServerName {}

#[injectable]
trait Command {
    fn name(&self) -> String;
}

struct NamedCommand(String);

impl Command for NamedCommand {
    fn name(&self) -> String {
        self.0.clone()
    }
}

// providers create beans of types which can't derive Bean themselves, like ones from other crates
// or ones needing some setup; parameters are injected just like bean fields
#[bean_provider]
fn server_name(#[bean(host)] server: BeanInstancePtr<Server>) -> BeanInstancePtr<ServerName> {
    BeanInstancePtr::new(ServerName(server.name.clone()))
}

// multi providers contribute any number of beans to a list
#[bean_multi_provider]
fn commands(
    server_name: BeanInstancePtr<ServerName>,
) -> Vec<BeanInstancePtr<dyn Command + Send + Sync>> {
    vec![
        BeanInstancePtr::new(NamedCommand(format!("{}:spawn", server_name.0))),
        BeanInstancePtr::new(NamedCommand(format!("{}:kick", server_name.0))),
    ]
}

#[derive(Bean)]
struct CommandRegistry {
    commands: Vec<BeanInstancePtr<dyn Command + Send + Sync>>,
}

// after load hooks run once, when all beans are created; returning an error fails initialization
#[after_load]
fn register_commands(registry: BeanInstancePtr<CommandRegistry>) -> Result<(), Infallible> {
    for command in &registry.commands {
        println!("Registered command {}", command.name());
    }

    Ok(())
}

fn main() {
    let server = BeanInstancePtr::new(Server {
        name: "lobby".to_string(),
    });

    // prints "Registered command lobby:spawn" and "Registered command lobby:kick"
    let container =
        IocContainer::initialize(module_path!(), server).expect("error initializing container");

    // the host handle is available as a bean too
    let server = container.get::<Server>().expect("error retrieving Server");
    let commands = container
        .get_list::<dyn Command + Send + Sync>()
        .expect("error retrieving commands");

    // prints "lobby has 2 commands"
    println!("{} has {} commands", server.name, commands.len());
}
