//! Grammars assembled from small combinators and interpreted directly.
//!
//! A [`Grammar`] is an arena of nodes. Nodes are created through its builder
//! methods and referred to by [`NodeHandle`]; self-referential rules go through
//! a placeholder from [`Grammar::create_recursion`] that is resolved once the
//! rule exists. Parsing walks the node graph with ordered choice and greedy,
//! non-backtracking repetition and produces a [`Value`] tree.

mod check;
mod error;
mod grammar;
mod handle;
mod interpret;
mod node;
mod value;

pub use error::{ActionError, Expected, GrammarError, ParseError};
pub use grammar::{Grammar, Recursion, ResolveError};
pub use handle::{NodeHandle, SlotHandle};
pub use interpret::{Match, ParseOptions};
pub use node::{Action, Node};
pub use value::Value;
