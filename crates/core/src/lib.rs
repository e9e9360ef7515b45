//! Shared domain types and pure logic for the fitbooth try-on kiosk.
//!
//! Nothing in this crate performs I/O. It holds the types passed between
//! the capture, compositing, and try-on crates, the input validation that
//! runs before any network call, storage naming rules, and the mapping from
//! error text to user-facing notices.

pub mod config;
pub mod error;
pub mod naming;
pub mod notice;
pub mod types;
pub mod validation;

pub use error::{ConfigError, CoreError, ValidationError};
pub use types::{ClothType, EncodedImage, TryOnResult};
