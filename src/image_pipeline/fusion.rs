//! HDR fusion module
//!
//! This module provides exposure-stack handling: saturation-aware frame
//! selection and exposure-weighted accumulation into a high-precision
//! buffer.

mod accumulator;
mod selector;
mod stack;


pub use accumulator::{fuse, fuse_stack};
pub use selector::{DEFAULT_SATURATION_THRESHOLD, select_last_usable_frame};
pub use stack::ExposureStack;
