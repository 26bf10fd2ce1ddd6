//! Execution runtime control for edgekit.
//!
//! The edge runtime reads the shared secret file only at startup, so every
//! secret mutation is followed by a [`RuntimeController::restart`]. Function
//! deploys need no restart; the runtime watches the functions directory.

pub mod controller;
pub mod error;

pub use controller::{
    CommandController, DEFAULT_RESTART_TIMEOUT, NoopController, RuntimeController, StubController,
};
pub use error::RestartError;
