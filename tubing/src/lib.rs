//! Plugin bootstrapping based on the [tubing_ioc] container.
//!
//! A plugin hands its host handle and root package to a [TubingPlugin](plugin::TubingPlugin),
//! which creates the container when the plugin gets enabled and drops it when disabled. The
//! plugin also installs a tracing logger, unless turned off in [settings].

pub mod plugin;
pub mod settings;
