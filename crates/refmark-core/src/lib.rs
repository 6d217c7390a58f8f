//! refmark-core: Document intermediate representation for chat messages.
//!
//! This crate provides the tree types the pipeline stages pass between
//! each other, the per-render reference index that citation markers are
//! resolved against, and the traits external collaborators implement.

mod document;
mod error;
mod fidelity;
mod node;
mod properties;
mod reference;
mod traits;

pub use document::*;
pub use error::*;
pub use fidelity::*;
pub use node::*;
pub use properties::*;
pub use reference::*;
pub use traits::*;
