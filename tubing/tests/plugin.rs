use healthy::Greeter;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::{tempdir, TempDir};
use tubing::plugin::{PluginDescriptor, PluginError, TubingPlugin};
use tubing::settings::SETTINGS_FILE;
use tubing_ioc::error::{BeanInstanceProviderError, IocError};
use tubing_ioc::instance_provider::BeanInstancePtr;

struct Server {
    enables: AtomicUsize,
}

mod healthy {
    use super::Server;
    use std::sync::atomic::Ordering;
    use tubing_ioc::instance_provider::BeanInstancePtr;
    use tubing_ioc::{after_load, Bean};

    #[derive(Bean)]
    pub(super) struct Greeter {
        #[bean(host)]
        pub(super) server: BeanInstancePtr<Server>,
    }

    #[after_load]
    fn count_enables(greeter: BeanInstancePtr<Greeter>) {
        greeter.server.enables.fetch_add(1, Ordering::SeqCst);
    }
}

mod broken {
    use tubing_ioc::instance_provider::BeanInstancePtr;
    use tubing_ioc::Bean;

    #[derive(Bean)]
    struct Cyclic {
        _this: BeanInstancePtr<Cyclic>,
    }
}

fn plugin(root_package: &str) -> (TubingPlugin<Server>, BeanInstancePtr<Server>, TempDir) {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join(SETTINGS_FILE),
        r#"{"install_tracing_logger": false}"#,
    )
    .unwrap();

    let server = BeanInstancePtr::new(Server {
        enables: AtomicUsize::new(0),
    });

    let plugin = TubingPlugin::new(
        PluginDescriptor::new(
            "test".to_string(),
            root_package.to_string(),
            dir.path().to_path_buf(),
        ),
        server.clone(),
    );

    (plugin, server, dir)
}

#[test]
fn should_inject_host_into_beans() {
    let (mut plugin, server, _dir) = plugin("plugin::healthy");
    plugin.enable().unwrap();

    let greeter = plugin.get::<Greeter>().unwrap();
    assert!(BeanInstancePtr::ptr_eq(&greeter.server, &server));
    assert_eq!(server.enables.load(Ordering::SeqCst), 1);
}

#[test]
fn should_ignore_repeated_enable() {
    let (mut plugin, server, _dir) = plugin("plugin::healthy");
    plugin.enable().unwrap();
    plugin.enable().unwrap();

    assert_eq!(server.enables.load(Ordering::SeqCst), 1);
}

#[test]
fn should_recreate_beans_on_reload() {
    let (mut plugin, server, _dir) = plugin("plugin::healthy");
    plugin.enable().unwrap();
    let first = plugin.get::<Greeter>().unwrap();

    plugin.reload().unwrap();
    let second = plugin.get::<Greeter>().unwrap();

    assert!(!BeanInstancePtr::ptr_eq(&first, &second));
    assert_eq!(server.enables.load(Ordering::SeqCst), 2);
}

#[test]
fn should_stay_disabled_on_failure() {
    let (mut plugin, _, _dir) = plugin("plugin::broken");

    assert!(matches!(
        plugin.enable().unwrap_err(),
        PluginError::Container(IocError::Resolution(
            BeanInstanceProviderError::CircularDependency(_)
        ))
    ));
    assert!(!plugin.is_enabled());
}
