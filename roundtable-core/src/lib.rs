pub mod config;
pub mod core_identity;
pub mod core_invite;
pub mod core_rbac;
pub mod core_server;
pub mod core_store;
pub mod core_timeline;
pub mod logging;

pub use config::Config;
pub use core_store::ChatStore;
pub use logging::{init_logging, LogLevel};
