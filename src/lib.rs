//! Ordered map backed by a left-leaning red-black tree, with subtree
//! sizes kept on every node.

mod depth;
mod error;
mod llrb;

pub use crate::depth::Depth;
pub use crate::error::Error;
pub use crate::llrb::{Iter, Llrb, Stats};
