//! Core types for WEFT (Watch, Edit, Fold, Transcribe).
//!
//! This crate provides the identifier and error-convention types shared
//! by every layer of the WEFT architecture:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  weft-cli     : binary, tracing setup               │
//! ├─────────────────────────────────────────────────────┤
//! │  weft-engine  : parser, systems, directives, watch  │
//! ├─────────────────────────────────────────────────────┤
//! │  weft-store   : World (entities/components), Mailbox│
//! ├─────────────────────────────────────────────────────┤
//! │  weft-types   : Entity, ErrorCode  ◄── HERE         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Entity Identity
//!
//! Every block of the generator document is represented by an
//! [`Entity`]: a slot index into a bounded pool plus a generation
//! counter. The generation counter makes recycled slots distinguishable
//! from their previous occupants, so a stale handle can never silently
//! read a newer block's components.
//!
//! # Error Handling
//!
//! All WEFT error types implement [`ErrorCode`] for machine-readable
//! codes and recoverability information:
//!
//! ```
//! use weft_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//! }
//!
//! impl ErrorCode for MyError {
//!     fn code(&self) -> &'static str {
//!         "MY_TRANSIENT"
//!     }
//!     fn is_recoverable(&self) -> bool {
//!         true
//!     }
//! }
//!
//! assert_eq!(MyError::Transient.code(), "MY_TRANSIENT");
//! ```

mod entity;
mod error;

pub use entity::{Entity, MAX_ENTITIES};
pub use error::{assert_error_code, assert_error_codes, ErrorCode};
