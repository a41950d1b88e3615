use std::sync::Arc;

use crate::{
    error::{Expected, ParseError},
    grammar::Grammar,
    handle::NodeHandle,
    node::Node,
    value::Value,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum number of recursion placeholders that may be entered at once
    /// before giving up with [`ParseError::DepthExceeded`].
    pub max_depth: u32,
}

impl ParseOptions {
    pub const DEFAULT_MAX_DEPTH: u32 = 256;

    pub fn new() -> ParseOptions {
        ParseOptions::default()
    }
    pub fn with_max_depth(mut self, max_depth: u32) -> ParseOptions {
        self.max_depth = max_depth;
        self
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }
}

/// Successful attempt, `len` is the number of bytes consumed.
#[derive(Clone, Debug, PartialEq)]
pub struct Match {
    pub value: Value,
    pub len: usize,
}

// Stack that must be left before entering a recursion target, and the size of
// a fresh segment when there is less. Non-recursive nesting between two
// placeholders is bounded by the grammar itself.
const RED_ZONE: usize = 128 * 1024;
const STACK_SEGMENT: usize = 1024 * 1024;

struct Interpreter<'a> {
    grammar: &'a Grammar,
    input: &'a str,
    max_depth: u32,
    depth: u32,
}

impl<'a> Interpreter<'a> {
    fn new(grammar: &'a Grammar, input: &'a str, options: &ParseOptions) -> Interpreter<'a> {
        Interpreter {
            grammar,
            input,
            max_depth: options.max_depth,
            depth: 0,
        }
    }

    /// Enters a recursion target, the only place where nesting is unbounded.
    fn attempt_recursive(
        &mut self,
        target: NodeHandle,
        pos: usize,
    ) -> Result<(Value, usize), ParseError> {
        if self.depth >= self.max_depth {
            return Err(ParseError::DepthExceeded {
                position: pos,
                limit: self.max_depth,
            });
        }

        self.depth += 1;
        let result = stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, || self.attempt(target, pos));
        self.depth -= 1;

        result
    }

    /// Matches `handle` at byte offset `pos`, returning the value and the end offset.
    fn attempt(&mut self, handle: NodeHandle, pos: usize) -> Result<(Value, usize), ParseError> {
        let grammar = self.grammar;
        let input = self.input;
        let rest = &input[pos..];

        match &grammar[handle] {
            Node::Literal(literal) => {
                if rest.starts_with(&**literal) {
                    return Ok((Value::Text(literal.to_string()), pos + literal.len()));
                }
                let found = match rest.is_empty() {
                    true => None,
                    false => Some(rest.chars().take(literal.chars().count()).collect()),
                };
                Err(ParseError::Mismatch {
                    position: pos,
                    expected: Expected::Literal(literal.clone()),
                    found,
                })
            }
            &Node::Range { from, to } => match rest.chars().next() {
                Some(c) if from <= c && c <= to => Ok((Value::Text(c.into()), pos + c.len_utf8())),
                found => Err(ParseError::Mismatch {
                    position: pos,
                    expected: Expected::Range { from, to },
                    found: found.map(String::from),
                }),
            },
            Node::Sequence(children) => {
                let mut values = Vec::with_capacity(children.len());
                let mut end = pos;
                for &child in children.iter() {
                    let (value, next) = self.attempt(child, end)?;
                    values.push(value);
                    end = next;
                }
                Ok((Value::Seq(values), end))
            }
            Node::Choice(alternatives) => {
                let mut errors = Vec::new();
                for &alternative in alternatives.iter() {
                    match self.attempt(alternative, pos) {
                        Ok(ok) => return Ok(ok),
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => errors.push(e),
                    }
                }
                log::trace!("no alternative of {handle} matched at {pos}");
                Err(ParseError::ChoiceExhausted {
                    position: pos,
                    alternatives: errors,
                })
            }
            &Node::Repeat(child) => {
                let mut values = Vec::new();
                let mut end = pos;
                loop {
                    match self.attempt(child, end) {
                        // an empty match would repeat forever
                        Ok((_, next)) if next == end => break,
                        Ok((value, next)) => {
                            values.push(value);
                            end = next;
                        }
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(_) => break,
                    }
                }
                Ok((Value::List(values), end))
            }
            &Node::Exclude { base, forbidden } => {
                let result = self.attempt(base, pos)?;
                match self.attempt(forbidden, pos) {
                    Ok(_) => Err(ParseError::ExclusionViolated { position: pos }),
                    Err(e) if e.is_fatal() => Err(e),
                    Err(_) => Ok(result),
                }
            }
            Node::Capture { label, node } => {
                let (value, end) = self
                    .attempt(*node, pos)
                    .map_err(|e| captured(label, e))?;
                let value = Value::Capture {
                    label: label.clone(),
                    value: Box::new(value),
                };
                Ok((value, end))
            }
            &Node::Recursion(slot) => match grammar.get_slot(slot) {
                Some(target) => self.attempt_recursive(target, pos),
                None => {
                    log::trace!("{handle} reached unresolved {slot}");
                    Err(ParseError::UnresolvedRecursion {
                        position: pos,
                        slot,
                    })
                }
            },
            Node::Action { node, action } => {
                let (value, end) = self.attempt(*node, pos)?;
                match (**action)(value) {
                    Ok(value) => Ok((value, end)),
                    Err(message) => Err(ParseError::Transform {
                        position: pos,
                        message,
                    }),
                }
            }
            Node::None => Ok((Value::Null, pos)),
        }
    }
}

/// Fatal errors stay bare so that they can be matched on directly.
fn captured(label: &Arc<str>, error: ParseError) -> ParseError {
    match error.is_fatal() {
        true => error,
        false => ParseError::Captured {
            label: label.clone(),
            error: Box::new(error),
        },
    }
}

impl Grammar {
    /// Matches `handle` against a prefix of `input`.
    pub fn attempt(&self, handle: NodeHandle, input: &str) -> Result<Match, ParseError> {
        self.attempt_with(handle, input, &ParseOptions::default())
    }
    pub fn attempt_with(
        &self,
        handle: NodeHandle,
        input: &str,
        options: &ParseOptions,
    ) -> Result<Match, ParseError> {
        let mut interpreter = Interpreter::new(self, input, options);
        let (value, len) = interpreter.attempt(handle, 0)?;
        Ok(Match { value, len })
    }
    /// Matches `handle` against the whole of `input`.
    pub fn parse(&self, handle: NodeHandle, input: &str) -> Result<Value, ParseError> {
        self.parse_with(handle, input, &ParseOptions::default())
    }
    pub fn parse_with(
        &self,
        handle: NodeHandle,
        input: &str,
        options: &ParseOptions,
    ) -> Result<Value, ParseError> {
        let result = self
            .attempt_with(handle, input, options)
            .and_then(|Match { value, len }| match len == input.len() {
                true => Ok(value),
                false => Err(ParseError::Incomplete {
                    consumed: len,
                    remaining: input[len..].to_owned(),
                }),
            });

        match &result {
            Ok(_) => log::debug!("parsed {} bytes with {handle}", input.len()),
            Err(e) => log::debug!("parsing with {handle} failed at {}", e.position()),
        }

        result
    }
    /// Same rule as [`Grammar::parse`], without the error.
    pub fn validate(&self, handle: NodeHandle, input: &str) -> bool {
        self.validate_with(handle, input, &ParseOptions::default())
    }
    pub fn validate_with(&self, handle: NodeHandle, input: &str, options: &ParseOptions) -> bool {
        match self.attempt_with(handle, input, options) {
            Ok(Match { len, .. }) => len == input.len(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Match, ParseOptions};
    use crate::{
        error::{Expected, ParseError},
        grammar::Grammar,
        value::Value,
    };

    fn text(s: &str) -> Value {
        Value::Text(s.to_owned())
    }

    #[test]
    fn literal_requires_full_consumption() {
        let mut g = Grammar::new();
        for literal in ["a", "hello", "ünï"] {
            let node = g.literal(literal);
            assert_eq!(g.parse(node, literal), Ok(text(literal)));

            let longer = format!("{literal}x");
            assert_eq!(
                g.parse(node, &longer),
                Err(ParseError::Incomplete {
                    consumed: literal.len(),
                    remaining: "x".into()
                })
            );
            assert!(!g.validate(node, &longer));
        }
    }

    #[test]
    fn literal_mismatch_reports_context() {
        let mut g = Grammar::new();
        let node = g.literal("true");

        assert_eq!(
            g.parse(node, "tree"),
            Err(ParseError::Mismatch {
                position: 0,
                expected: Expected::Literal("true".into()),
                found: Some("tree".into()),
            })
        );
        assert_eq!(
            g.parse(node, ""),
            Err(ParseError::Mismatch {
                position: 0,
                expected: Expected::Literal("true".into()),
                found: None,
            })
        );
    }

    #[test]
    fn range_membership() {
        let mut g = Grammar::new();
        let node = g.range("c", "f").unwrap();

        for c in 'a'..='h' {
            let inside = ('c'..='f').contains(&c);
            assert_eq!(g.validate(node, &c.to_string()), inside, "{c}");
        }
        assert!(!g.validate(node, ""));
        assert!(!g.validate(node, "cd"));

        let wide = g.range("\u{20}", "\u{10ffff}").unwrap();
        assert_eq!(g.parse(wide, "😀"), Ok(text("😀")));
        assert!(!g.validate(wide, "\n"));
    }

    #[test]
    fn choice_commits_to_first_match() {
        let mut g = Grammar::new();
        let short = g.literal("a");
        let long = g.literal("ab");
        let choice = g.choice([short, long]);

        assert_eq!(
            g.attempt(choice, "ab"),
            Ok(Match {
                value: text("a"),
                len: 1
            })
        );
        // the shorter alternative wins even though it cannot finish the input
        assert!(!g.validate(choice, "ab"));

        let reversed = g.choice([long, short]);
        assert!(g.validate(reversed, "ab"));
    }

    #[test]
    fn choice_collects_every_failure() {
        let mut g = Grammar::new();
        let choice = g.literal_choice(["x", "y"]);

        let Err(ParseError::ChoiceExhausted {
            position,
            alternatives,
        }) = g.parse(choice, "z")
        else {
            panic!("expected exhausted choice");
        };
        assert_eq!(position, 0);
        assert_eq!(alternatives.len(), 2);
        assert!(matches!(
            &alternatives[1],
            ParseError::Mismatch { expected: Expected::Literal(l), .. } if &**l == "y"
        ));
    }

    #[test]
    fn repeat_is_greedy() {
        let mut g = Grammar::new();
        let digit = g.range("0", "9").unwrap();
        let digits = g.repeat(digit);

        assert_eq!(
            g.attempt(digits, "123abc"),
            Ok(Match {
                value: Value::List(vec![text("1"), text("2"), text("3")]),
                len: 3
            })
        );
        assert_eq!(g.parse(digits, ""), Ok(Value::List(vec![])));
    }

    #[test]
    fn repeat_never_gives_back_input() {
        let mut g = Grammar::new();
        let a = g.literal("a");
        let many = g.repeat(a);
        let seq = g.sequence([many, a]);

        // the repeat eats every "a", the trailing literal has nothing left
        assert!(!g.validate(seq, "aaa"));
    }

    #[test]
    fn repeat_stops_on_empty_match() {
        let mut g = Grammar::new();
        let a = g.literal("a");
        let maybe = g.optional(a);
        let many = g.repeat(maybe);

        assert_eq!(
            g.attempt(many, "aab"),
            Ok(Match {
                value: Value::List(vec![text("a"), text("a")]),
                len: 2
            })
        );
    }

    #[test]
    fn repeat_at_least_once() {
        let mut g = Grammar::new();
        let digit = g.range("0", "9").unwrap();
        let digits = g.repeat_at_least_once(digit);

        assert!(!g.validate(digits, ""));
        assert_eq!(
            g.parse(digits, "42"),
            Ok(Value::Seq(vec![text("4"), Value::List(vec![text("2")])]))
        );
    }

    #[test]
    fn exclusion_is_a_negative_check() {
        let mut g = Grammar::new();
        let any = g.range("\u{20}", "\u{10ffff}").unwrap();
        let special = g.literal_choice(["\"", "\\"]);
        let plain = g.exclude(any, special);

        assert_eq!(g.parse(plain, "a"), Ok(text("a")));
        assert_eq!(g.parse(plain, "é"), Ok(text("é")));
        assert_eq!(
            g.parse(plain, "\""),
            Err(ParseError::ExclusionViolated { position: 0 })
        );
        assert!(!g.validate(plain, "\\"));
        assert!(!g.validate(plain, "\t"));
    }

    #[test]
    fn capture_and_none() {
        let mut g = Grammar::new();
        let minus = g.literal("-");
        let sign = g.optional(minus);
        let one = g.literal("1");
        let number = g.sequence([sign, one]);
        let number = g.capture("number", number);

        let (label, value) = g.parse(number, "1").unwrap().into_capture().unwrap();
        assert_eq!(&*label, "number");
        assert_eq!(value, Value::Seq(vec![Value::Null, text("1")]));
    }

    #[test]
    fn action_transforms_and_fails() {
        let mut g = Grammar::new();
        let digit = g.range("0", "9").unwrap();
        let odd = g.action(digit, |value| {
            let digit = value.as_str().and_then(|s| s.parse::<u8>().ok());
            match digit {
                Some(d) if d % 2 == 1 => Ok(Value::Number(d as f64)),
                _ => Err("even digit".into()),
            }
        });

        assert_eq!(g.parse(odd, "7"), Ok(Value::Number(7.0)));
        assert_eq!(
            g.parse(odd, "4"),
            Err(ParseError::Transform {
                position: 0,
                message: "even digit".into()
            })
        );
    }

    #[test]
    fn recursion_nests() {
        let mut g = Grammar::new();
        let (list, rec) = g.create_recursion();
        let open = g.literal("[");
        let close = g.literal("]");
        let comma = g.literal(",");
        let items = g.repeat_alternating(list, comma);
        let items = g.optional(items);
        let body = g.sequence([open, items, close]);
        rec.resolve(&mut g, body).unwrap();

        assert!(g.validate(list, "[]"));
        assert!(g.validate(list, "[[[[]]],[]]"));
        assert!(!g.validate(list, "[[]"));
        assert!(!g.validate(list, "[],"));
    }

    #[test]
    fn unresolved_recursion_is_fatal() {
        let mut g = Grammar::new();
        let (missing, rec) = g.create_recursion();
        let fallback = g.literal("x");
        let choice = g.choice([missing, fallback]);
        let many = g.repeat(choice);

        let err = g.parse(many, "x").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnresolvedRecursion {
                position: 0,
                slot: rec.slot()
            }
        );
        assert!(err.is_fatal());
        assert!(!g.validate(choice, "x"));

        rec.resolve(&mut g, fallback).unwrap();
        assert!(g.validate(many, "xx"));
    }

    #[test]
    fn depth_limit() {
        let mut g = Grammar::new();
        let (list, rec) = g.create_recursion();
        let open = g.literal("[");
        let close = g.literal("]");
        let inner = g.optional(list);
        let body = g.sequence([open, inner, close]);
        rec.resolve(&mut g, body).unwrap();

        let nested = format!("{}{}", "[".repeat(50), "]".repeat(50));
        assert!(g.validate(list, &nested));

        let options = ParseOptions::new().with_max_depth(20);
        let err = g.parse_with(list, &nested, &options).unwrap_err();
        assert!(matches!(err, ParseError::DepthExceeded { limit: 20, .. }));
    }

    #[test]
    fn grammar_is_shared_between_threads() {
        let mut g = Grammar::new();
        let digit = g.range("0", "9").unwrap();
        let digits = g.repeat_at_least_once(digit);

        std::thread::scope(|s| {
            for input in ["1", "22", "333"] {
                let g = &g;
                s.spawn(move || assert!(g.validate(digits, input)));
            }
        });
    }

    #[test]
    fn depth_limit_holds_on_default_stack() {
        let mut g = Grammar::new();
        let (list, rec) = g.create_recursion();
        let open = g.literal("[");
        let close = g.literal("]");
        let inner = g.optional(list);
        let body = g.sequence([open, inner, close]);
        rec.resolve(&mut g, body).unwrap();

        // the innermost level still tries to enter the placeholder once more
        let levels = ParseOptions::DEFAULT_MAX_DEPTH as usize - 1;
        let fits = format!("{}{}", "[".repeat(levels), "]".repeat(levels));
        let deep = format!("{}{}", "[".repeat(10_000), "]".repeat(10_000));

        // spawned threads get the default stack size, smaller than the main thread's
        let result = std::thread::spawn(move || {
            let fits = g.parse(list, &fits).is_ok();
            let deep = g.parse(list, &deep).unwrap_err();
            (fits, deep)
        })
        .join()
        .unwrap();

        assert!(result.0);
        assert!(matches!(
            result.1,
            ParseError::DepthExceeded { limit: ParseOptions::DEFAULT_MAX_DEPTH, .. }
        ));
    }

    #[test]
    fn choice_recovers_from_failed_action() {
        let mut g = Grammar::new();
        let digit = g.range("0", "9").unwrap();
        let rejecting = g.action(digit, |_| Err("rejected".into()));
        let fallback = g.range("0", "9").unwrap();
        let choice = g.choice([rejecting, fallback]);

        assert_eq!(g.parse(choice, "5"), Ok(text("5")));

        let only = g.choice([rejecting]);
        let Err(ParseError::ChoiceExhausted { alternatives, .. }) = g.parse(only, "5") else {
            panic!("expected exhausted choice");
        };
        assert_eq!(
            alternatives,
            vec![ParseError::Transform {
                position: 0,
                message: "rejected".into()
            }]
        );
    }

    #[test]
    fn capture_labels_failures() {
        let mut g = Grammar::new();
        let one = g.literal("1");
        let number = g.capture("number", one);

        let err = g.parse(number, "x").unwrap_err();
        assert_eq!(err.position(), 0);
        let ParseError::Captured { label, error } = &err else {
            panic!("expected a captured error");
        };
        assert_eq!(&**label, "number");
        assert!(matches!(**error, ParseError::Mismatch { .. }));
        assert!(err.to_string().starts_with("(number) Expected \"1\""));

        // fatal errors are not wrapped
        let (missing, _rec) = g.create_recursion();
        let broken = g.capture("broken", missing);
        assert!(matches!(
            g.parse(broken, "x"),
            Err(ParseError::UnresolvedRecursion { .. })
        ));
    }
}
