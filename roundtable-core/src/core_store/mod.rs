/*
    core_store - Persistent state layer

    The authoritative state layer for the chat service. Handles:
    - Data models (users, servers, members, messages, roles)
    - Versioned schema migrations
    - SQLite persistence behind a connection pool
*/

pub mod error;
pub mod migrations;
pub mod model;
pub mod sql_store;

// Re-export commonly used types
pub use error::StoreError;
pub use model::{
    ClientId, Member, MemberId, Message, MessageId, Role, Server, ServerId, Timestamp, User,
    UserId,
};
pub use sql_store::ChatStore;
