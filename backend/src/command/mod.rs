//! Command module
//!
//! Workspace commands and their storage.

pub mod dao;
pub mod models;

pub use dao::{CommandDao, SqliteCommandDao};
pub use models::{Command, CommandDescriptor, CommandUpdate, NewCommand, Visibility};
