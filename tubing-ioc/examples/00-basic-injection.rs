use tubing_ioc::container::IocContainer;
use tubing_ioc::instance_provider::BeanInstancePtr;
use tubing_ioc::{bean_alias, injectable, Bean};

// this is an interface we would like to inject into our beans
#[injectable]
trait Greeter {
    fn greet(&self, player: &str);
}

// this is a bean implementing the above interface
#[derive(Bean)]
struct ChatGreeter;

// we're telling the container to provide ChatGreeter when asked for dyn Greeter
#[bean_alias]
impl Greeter for ChatGreeter {
    fn greet(&self, player: &str) {
        println!("Welcome, {player}!");
    }
}

// this is another bean, but with a dependency
#[derive(Bean)]
struct JoinListener {
    // the container will inject the only bean implementing dyn Greeter
    greeter: BeanInstancePtr<dyn Greeter + Send + Sync>,
    // alternatively, you can inject the concrete type
    // greeter: BeanInstancePtr<ChatGreeter>,
}

impl JoinListener {
    fn on_join(&self, player: &str) {
        self.greeter.greet(player);
    }
}

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    // the host handle is whatever the plugin host gives us; a unit is enough here
    // all beans found under the given module path are created right away, exactly once
    let container = IocContainer::initialize(module_path!(), BeanInstancePtr::new(()))
        .expect("error initializing container");

    let listener = container
        .get::<JoinListener>()
        .expect("error retrieving JoinListener");

    // prints "Welcome, Steve!"
    listener.on_join("Steve");
}
