//! Speakerbob domain entities and the catalog that persists them.
//!
//! # Key Types
//!
//! - [`Sound`] / [`Group`] -- playable clips and ordered macros of clips
//! - [`User`] / [`Token`] -- accounts and the credentials issued to them
//! - [`Catalog`] -- one [`speakerbob_provider::Provider`] per entity over a
//!   shared [`speakerbob_store::DurableStore`]

pub mod auth;
pub mod catalog;
pub mod error;
pub mod sound;

pub use auth::{Principal, Token, TokenType, User};
pub use catalog::{hidden_sound_ttl, Catalog, SCHEMA_VERSION};
pub use error::{ModelError, ModelResult};
pub use sound::{Group, Sound};

use uuid::Uuid;

/// A fresh record id: a time-ordered UUID as 32 lowercase hex characters.
pub fn new_id() -> String {
    Uuid::now_v7().simple().to_string()
}
