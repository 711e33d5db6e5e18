//! Release model.
//!
//! This module defines the release value passed through every workflow,
//! value overrides on it, and the codec used to persist it.

mod types;
mod values;
mod codec;

pub use self::codec::{ReleaseCodec, RELEASE_EXTENSION};
pub use self::types::{ChartRef, Release};
