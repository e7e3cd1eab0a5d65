//! Inversion of control container for plugin hosts.
//!
//! Types annotated as beans are registered at link time and created exactly once when the
//! [IocContainer](container::IocContainer) initializes. Beans receive other beans, configuration
//! values and the plugin host handle through their fields, while providers and after load hooks
//! receive them as function parameters.
//!
//! ```
//! use tubing_ioc::container::IocContainer;
//! use tubing_ioc::instance_provider::BeanInstancePtr;
//! use tubing_ioc::{after_load, bean_alias, injectable, Bean};
//!
//! #[injectable]
//! trait Storage {
//!     fn name(&self) -> &str;
//! }
//!
//! #[derive(Bean)]
//! struct MemoryStorage;
//!
//! #[bean_alias]
//! impl Storage for MemoryStorage {
//!     fn name(&self) -> &str {
//!         "memory"
//!     }
//! }
//!
//! #[derive(Bean)]
//! struct PlayerService {
//!     storage: BeanInstancePtr<dyn Storage + Send + Sync>,
//! }
//!
//! #[after_load]
//! fn print_storage(service: BeanInstancePtr<PlayerService>) {
//!     println!("Using {} storage", service.storage.name());
//! }
//!
//! let container = IocContainer::initialize(module_path!(), BeanInstancePtr::new(())).unwrap();
//! assert_eq!(container.get::<PlayerService>().unwrap().storage.name(), "memory");
//! ```
//!
//! Please see the documentation of individual modules for details.

pub mod annotation;
pub mod bean;
pub mod conditional;
pub mod config;
pub mod container;
pub mod error;
pub mod factory;
pub mod instance_provider;
pub mod property;
pub mod provider;
pub mod registry;
pub mod scanner;

#[cfg(feature = "derive")]
pub use tubing_ioc_derive::{
    after_load, bean_alias, bean_multi_provider, bean_provider, injectable, Bean,
};
