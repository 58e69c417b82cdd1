//! Helpers shared by the unit tests.
//!
//! The image writer lives in [`builder`] so the integration tests can include the same
//! file.


pub use builder::*;
