//! The conversation tree.
//!
//! - [`path`] - Pure path resolution over the node map
//! - [`store`] - [`TreeStore`], the single owner of tree mutations
//! - [`branch_index`] - Branches anchored in a node's content

pub mod branch_index;
pub mod path;
pub mod store;

pub use branch_index::BranchEntry;
pub use store::{AddedMessage, TreeStore};
