//! Cloud IDE platform API backend library
//!
//! This library exposes modules for testing and external use.
//! The main binary is in `src/main.rs`.

pub mod account;
pub mod api;
pub mod auth;
pub mod client;
pub mod command;
pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod links;
/// Application state management
///
/// Holds the DAOs and the subscription service registry shared by handlers.
pub mod state;
pub mod workspace;
