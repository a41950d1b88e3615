//! JSON expressed as a `textdef` grammar.
//!
//! Mostly useful as a worked example and as an acceptance test for the
//! combinators, [`JsonGrammar::parse`] is not meant to compete with a real JSON
//! parser.

mod decode;
mod grammar;
mod json;

pub use grammar::JsonGrammar;
pub use json::Json;
