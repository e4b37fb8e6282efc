//! Utility functions for modelkit.
//!
//! - [`text`]: String helpers used for attribute keys and member names.

pub mod text;
