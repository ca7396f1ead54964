pub mod archive;
pub mod cleanup;
pub mod client;
pub mod commands;
pub mod confirm;
pub mod error;
pub mod finalize;
pub mod http;
pub mod license;
pub mod locks;
pub mod oplog;
pub mod registry;
pub mod rescan;
pub mod resolver;
pub mod runtime;
pub mod staging;
