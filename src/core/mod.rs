//! Core types shared by every SPU module.
//!
//! Currently this is the error taxonomy: [`SpuError`] for typed failures,
//! [`ErrorClass`] for deciding whether a run may continue, and [`ErrorContext`]
//! for reporting failures to the operator.

pub mod error;

pub use error::{ErrorClass, ErrorContext, SpuError, user_friendly_error};
