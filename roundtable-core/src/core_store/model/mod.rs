/*
    Model subsystem - Data structures for entities
*/

pub mod types;
pub mod user;
pub mod server;
pub mod member;
pub mod message;

pub use types::*;
pub use user::*;
pub use server::*;
pub use member::*;
pub use message::*;
