//! Shared secret store for edgekit.
//!
//! Every deployed edge function reads the same `.env` file from the
//! functions directory. [`SecretStore`] edits that file and restarts the
//! runtime after each change; [`envfile`] is the codec it reads and writes with.

pub mod envfile;
pub mod store;

pub use envfile::EnvMap;
pub use store::{
    DeleteOutcome, MaskedSecret, SecretStore, SetAction, SetOutcome, mask_value,
    validate_secret_key,
};
