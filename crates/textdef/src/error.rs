use std::{borrow::Cow, error, fmt, sync::Arc};

use crate::handle::{NodeHandle, SlotHandle};

/// Message returned by a failing semantic action.
pub type ActionError = Cow<'static, str>;

/// Errors found while building or checking a grammar, never while parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarError {
    /// A range bound was not exactly one character.
    RangeBound(String),
    /// Range bounds are in the wrong order.
    RangeOrder { from: char, to: char },
    /// The placeholder was resolved to itself.
    SelfRecursion(SlotHandle),
    /// The handle does not belong to this grammar.
    UnknownNode(NodeHandle),
    /// The placeholder was never resolved.
    Unresolved(SlotHandle),
    /// The placeholder can reach itself without consuming any input.
    LeftRecursion(SlotHandle),
}

impl error::Error for GrammarError {}
impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarError::RangeBound(bound) => {
                write!(f, "Range bound must be a single character, got {bound:?}")
            }
            GrammarError::RangeOrder { from, to } => {
                write!(f, "Range start {from:?} is greater than its end {to:?}")
            }
            GrammarError::SelfRecursion(slot) => {
                write!(f, "Recursion {slot} cannot be resolved to itself")
            }
            GrammarError::UnknownNode(node) => {
                write!(f, "Node {node} does not belong to this grammar")
            }
            GrammarError::Unresolved(slot) => write!(f, "Recursion {slot} was never resolved"),
            GrammarError::LeftRecursion(slot) => write!(f, "Detected left recursion through {slot}"),
        }
    }
}

/// What a leaf node wanted to see.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expected {
    Literal(Arc<str>),
    Range { from: char, to: char },
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Literal(a) => write!(f, "{a:?}"),
            Expected::Range { from, to } => write!(f, "{from:?}..={to:?}"),
        }
    }
}

/// Failure of a parse attempt, all positions are byte offsets into the input.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseError {
    /// A literal or range did not match. `found` is `None` at the end of input.
    Mismatch {
        position: usize,
        expected: Expected,
        found: Option<String>,
    },
    /// Every alternative of a choice failed, errors are in alternative order.
    ChoiceExhausted {
        position: usize,
        alternatives: Vec<ParseError>,
    },
    /// The forbidden pattern of an exclusion matched.
    ExclusionViolated { position: usize },
    /// A semantic action rejected its input.
    Transform { position: usize, message: ActionError },
    /// Failure below a capture, tagged with its label. Fatal errors are never wrapped.
    Captured {
        label: Arc<str>,
        error: Box<ParseError>,
    },
    /// A recursion placeholder was reached before it was resolved.
    UnresolvedRecursion { position: usize, slot: SlotHandle },
    /// Grammar nesting went deeper than the configured limit.
    DepthExceeded { position: usize, limit: u32 },
    /// The grammar matched, but not the whole input.
    Incomplete { consumed: usize, remaining: String },
}

impl ParseError {
    pub fn position(&self) -> usize {
        match *self {
            ParseError::Mismatch { position, .. }
            | ParseError::ChoiceExhausted { position, .. }
            | ParseError::ExclusionViolated { position }
            | ParseError::Transform { position, .. }
            | ParseError::UnresolvedRecursion { position, .. }
            | ParseError::DepthExceeded { position, .. } => position,
            ParseError::Incomplete { consumed, .. } => consumed,
            ParseError::Captured { ref error, .. } => error.position(),
        }
    }
    /// Fatal errors describe a broken grammar rather than a non-matching
    /// input, choices and repeats pass them through untouched.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ParseError::UnresolvedRecursion { .. } | ParseError::DepthExceeded { .. }
        )
    }
    /// The error furthest into the input, descending into choices.
    ///
    /// Captures are kept so that the result still names the alternative.
    pub fn deepest(&self) -> &ParseError {
        match self {
            ParseError::Captured { error, .. } => match &**error {
                ParseError::ChoiceExhausted { .. } | ParseError::Captured { .. } => {
                    error.deepest()
                }
                _ => self,
            },
            ParseError::ChoiceExhausted { alternatives, .. } => alternatives
                .iter()
                .map(ParseError::deepest)
                .fold(None, |best: Option<&ParseError>, next| match best {
                    Some(best) if best.position() >= next.position() => Some(best),
                    _ => Some(next),
                })
                .unwrap_or(self),
            _ => self,
        }
    }
}

impl error::Error for ParseError {}
impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Mismatch {
                position,
                expected,
                found,
            } => {
                write!(f, "Expected {expected} at {position}, ")?;
                match found {
                    Some(found) => write!(f, "found {found:?}"),
                    None => write!(f, "found end of input"),
                }
            }
            ParseError::ChoiceExhausted {
                position,
                alternatives,
            } => {
                write!(f, "No alternative matched at {position}")?;
                for alternative in alternatives {
                    write!(f, "\n  {}", alternative.to_string().replace('\n', "\n  "))?;
                }
                Ok(())
            }
            ParseError::ExclusionViolated { position } => {
                write!(f, "Excluded pattern matched at {position}")
            }
            ParseError::Transform { position, message } => {
                write!(f, "Action failed at {position}: {message}")
            }
            ParseError::Captured { label, error } => write!(f, "({label}) {error}"),
            ParseError::UnresolvedRecursion { position, slot } => {
                write!(f, "Recursion {slot} reached at {position} before being resolved")
            }
            ParseError::DepthExceeded { position, limit } => {
                write!(f, "Nesting limit of {limit} exceeded at {position}")
            }
            ParseError::Incomplete {
                consumed,
                remaining,
            } => {
                write!(f, "Parsing stopped at {consumed}, cannot parse {remaining:?}")
            }
        }
    }
}

#[test]
fn test_deepest_error() {
    let near = ParseError::ExclusionViolated { position: 1 };
    let far = ParseError::Mismatch {
        position: 4,
        expected: Expected::Literal("x".into()),
        found: None,
    };
    let error = ParseError::ChoiceExhausted {
        position: 0,
        alternatives: vec![
            near.clone(),
            ParseError::ChoiceExhausted {
                position: 2,
                alternatives: vec![far.clone()],
            },
        ],
    };

    assert_eq!(error.deepest(), &far);
    assert_eq!(near.deepest(), &near);
    assert_eq!(far.to_string(), "Expected \"x\" at 4, found end of input");
}

#[test]
fn test_captured_error() {
    let inner = ParseError::Transform {
        position: 3,
        message: "bad digit".into(),
    };
    let captured = ParseError::Captured {
        label: "number".into(),
        error: Box::new(inner.clone()),
    };

    assert_eq!(captured.position(), 3);
    assert!(!captured.is_fatal());
    assert_eq!(captured.deepest(), &captured);
    assert_eq!(captured.to_string(), "(number) Action failed at 3: bad digit");

    let nested = ParseError::Captured {
        label: "array".into(),
        error: Box::new(ParseError::ChoiceExhausted {
            position: 1,
            alternatives: vec![captured.clone()],
        }),
    };
    assert_eq!(nested.deepest(), &captured);
}
