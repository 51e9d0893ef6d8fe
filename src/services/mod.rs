//! Service layer
//!
//! Source loading and output encoding live here, separate from the
//! segmentation and compositing logic.

pub mod format;
pub mod io;

pub use format::{EncodedBlob, OutputEncoder, OutputMime};
pub use io::SourceLoader;
