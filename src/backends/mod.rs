//! Segmentation engine implementations
//!
//! - `StaticMaskEngine`: answers with an externally supplied or generated mask
//! - `test_utils::MockEngine`: test double with manual result release

pub mod static_mask;

// Test utilities for engine testing
#[cfg(test)]
pub mod test_utils;

pub use self::static_mask::{MaskProvider, StaticMaskEngine};
