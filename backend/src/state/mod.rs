// State management module
// Handles shared application state used by the HTTP handlers

pub mod app_state;

pub use app_state::AppState;
