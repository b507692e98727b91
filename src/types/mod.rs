//! Core types for toolcode.

pub mod attachment;
pub mod generation;
pub mod message;
pub mod stream;

pub use attachment::*;
pub use generation::*;
pub use message::*;
pub use stream::*;
