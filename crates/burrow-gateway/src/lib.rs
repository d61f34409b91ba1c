//! HTTP front end for the Burrow short-link store.

pub mod app;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod model;
pub mod state;

pub use app::App;
pub use state::AppState;
