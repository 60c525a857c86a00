//! twig-types: Message tree data model
//!
//! This crate defines the node, message, and identifier types shared by the
//! conversation engine and its callers, along with the common error type.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
