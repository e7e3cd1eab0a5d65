use std::sync::atomic::{AtomicUsize, Ordering};
use tubing::plugin::{PluginDescriptor, TubingPlugin};
use tubing_ioc::bean::Injectable;
use tubing_ioc::instance_provider::BeanInstancePtr;
use tubing_ioc::{after_load, Bean};

// this is the handle a plugin host gives to its plugins
struct Server {
    players: AtomicUsize,
}

#[derive(Bean)]
struct PlayerCounter {
    #[bean(host)]
    server: BeanInstancePtr<Server>,
}

impl Injectable for Server {}

impl PlayerCounter {
    fn count(&self) -> usize {
        self.server.players.load(Ordering::SeqCst)
    }
}

// runs every time the plugin gets enabled
#[after_load]
fn announce(counter: BeanInstancePtr<PlayerCounter>) {
    println!("{} players online", counter.count());
}

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    let server = BeanInstancePtr::new(Server {
        players: AtomicUsize::new(3),
    });

    // plugin settings are read from tubing.json in the data directory and TUBING_ environment
    // variables; logging can be configured with RUST_LOG
    let mut plugin = TubingPlugin::new(
        PluginDescriptor::new(
            "example".to_string(),
            module_path!().to_string(),
            ".".into(),
        ),
        server.clone(),
    );

    // prints "3 players online"
    plugin.enable().expect("error enabling plugin");

    server.players.store(5, Ordering::SeqCst);

    // reloading creates all beans again; prints "5 players online"
    plugin.reload().expect("error reloading plugin");

    let counter = plugin
        .get::<PlayerCounter>()
        .expect("error retrieving PlayerCounter");
    assert_eq!(counter.count(), 5);

    plugin.disable();
}
