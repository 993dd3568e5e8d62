//! Shared utilities used across the `pingpong` crate: the error taxonomy and
//! logging initialisation.

pub mod error;
pub mod logging;
