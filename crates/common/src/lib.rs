//! Common types for the tubewatch workspace

mod error;

pub use error::{Error, Result};
