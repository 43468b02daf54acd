//! Core types for Weft.

pub mod annotation;
pub mod event;
pub mod frame;
pub mod state;
pub mod transcript;
pub mod usage;

pub use annotation::*;
pub use event::*;
pub use frame::*;
pub use state::*;
pub use transcript::*;
pub use usage::*;
