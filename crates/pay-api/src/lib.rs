//! # Offsite Pay API
//!
//! HTTP surface for the offsite payment gateway integration: a
//! checkout endpoint that issues signed redirects, the asynchronous
//! webhook the gateway posts notifications to, and the synchronous
//! browser-return page.

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
