// note: this example assumes you've analyzed the previous one

use tubing_ioc::container::IocContainer;
use tubing_ioc::instance_provider::BeanInstancePtr;
use tubing_ioc::{bean_alias, injectable, Bean};

#[injectable]
trait Storage {
    fn name(&self) -> &'static str;
}

// this bean is only used when nothing else implements dyn Storage, which makes it a good
// fallback for plugins that allow replacing parts of their behavior
#[derive(Bean)]
#[bean(conditional_on_missing_bean)]
struct MemoryStorage;

#[bean_alias]
impl Storage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }
}

// comment out this bean and the memory storage will be used instead
#[derive(Bean)]
struct FileStorage;

#[bean_alias]
impl Storage for FileStorage {
    fn name(&self) -> &'static str {
        "file"
    }
}

// all implementations of an interface can be injected with a Vec, while Option tolerates the
// lack of any implementation
#[derive(Bean)]
struct StorageReport {
    storage: Option<BeanInstancePtr<dyn Storage + Send + Sync>>,
}

//noinspection DuplicatedCode
fn main() {
    let container = IocContainer::initialize(module_path!(), BeanInstancePtr::new(()))
        .expect("error initializing container");

    let report = container
        .get::<StorageReport>()
        .expect("error retrieving StorageReport");

    // prints "Using file storage"
    if let Some(storage) = &report.storage {
        println!("Using {} storage", storage.name());
    }

    // the fallback was never created
    assert!(!container.contains::<MemoryStorage>());
}
