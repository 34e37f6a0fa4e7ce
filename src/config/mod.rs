//! Configuration model for namedsem.
//!
//! This module defines the Config struct that is read from a YAML file given
//! with `--config` or `$NAMEDSEM_CONFIG`. Unknown fields are ignored, every
//! field has a default, and values are validated after parsing.

mod model;
mod operations;


// Re-export public API
pub use model::{CONFIG_ENV, Config};
pub use operations::parse_tags;
