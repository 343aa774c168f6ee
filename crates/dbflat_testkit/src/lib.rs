//! # DBFlat Testkit
//!
//! Test utilities for DBFlat.
//!
//! This crate provides:
//! - Property-based test generators using proptest
//! - Application-type fixtures for schema evolution tests
//! - Byte-exact test vectors for the record format
//! - Fuzz testing harnesses
//!
//! ## Usage
//!
//! ```rust
//! use dbflat_testkit::prelude::*;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #![proptest_config(PropertyBudget::smoke().proptest_config())]
//!
//!     #[test]
//!     fn decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..64)) {
//!         fuzz_decode_any(&data);
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
pub use vectors::*;
