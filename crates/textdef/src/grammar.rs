use std::{ops::Index, sync::Arc};

use cranelift_entity::PrimaryMap;

use crate::{
    error::{ActionError, GrammarError},
    handle::{NodeHandle, SlotHandle},
    node::Node,
    value::Value,
};

/// Arena holding every node of a grammar.
///
/// Builder methods push a node and hand back its [`NodeHandle`]. A node can
/// only refer to nodes that already exist, cycles are introduced through
/// [`Grammar::create_recursion`] and closed with [`Recursion::resolve`].
#[derive(Default)]
pub struct Grammar {
    nodes: PrimaryMap<NodeHandle, Node>,
    slots: PrimaryMap<SlotHandle, Option<NodeHandle>>,
}

/// Resolver of a recursion placeholder, see [`Grammar::create_recursion`].
///
/// Not `Clone`, so a placeholder can be resolved at most once.
#[must_use = "a recursion placeholder fails every parse until it is resolved"]
#[derive(Debug)]
pub struct Recursion {
    slot: SlotHandle,
}

impl Recursion {
    pub fn slot(&self) -> SlotHandle {
        self.slot
    }
    /// Points the placeholder at `target` and returns `target`.
    ///
    /// On failure the token comes back inside the error so that the
    /// placeholder can still be resolved to something else.
    pub fn resolve(
        self,
        grammar: &mut Grammar,
        target: NodeHandle,
    ) -> Result<NodeHandle, ResolveError> {
        let error = match grammar.nodes.get(target) {
            None => Some(GrammarError::UnknownNode(target)),
            Some(&Node::Recursion(slot)) if slot == self.slot => {
                Some(GrammarError::SelfRecursion(slot))
            }
            Some(_) => None,
        };
        if let Some(error) = error {
            return Err(ResolveError {
                error,
                recursion: self,
            });
        }

        debug_assert!(grammar.slots[self.slot].is_none());
        grammar.slots[self.slot] = Some(target);
        log::debug!("resolved {} to {target}", self.slot);

        Ok(target)
    }
}

/// Failed [`Recursion::resolve`], still holding the unresolved token.
#[derive(Debug)]
pub struct ResolveError {
    pub error: GrammarError,
    pub recursion: Recursion,
}

impl std::error::Error for ResolveError {}
impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.error, f)
    }
}

impl From<ResolveError> for GrammarError {
    fn from(value: ResolveError) -> Self {
        value.error
    }
}

impl Grammar {
    pub fn new() -> Grammar {
        Grammar::default()
    }
    fn push(&mut self, node: Node) -> NodeHandle {
        self.nodes.push(node)
    }

    pub fn literal(&mut self, literal: impl Into<Arc<str>>) -> NodeHandle {
        self.push(Node::Literal(literal.into()))
    }
    /// Choice between several literals, tried in the given order.
    pub fn literal_choice<I>(&mut self, literals: I) -> NodeHandle
    where
        I: IntoIterator,
        I::Item: Into<Arc<str>>,
    {
        let alternatives = literals
            .into_iter()
            .map(|literal| self.literal(literal))
            .collect::<Vec<_>>();
        self.choice(alternatives)
    }
    /// Inclusive character range, each bound must be exactly one character.
    pub fn range(&mut self, from: &str, to: &str) -> Result<NodeHandle, GrammarError> {
        let from = single_char(from)?;
        let to = single_char(to)?;
        self.char_range(from, to)
    }
    pub fn char_range(&mut self, from: char, to: char) -> Result<NodeHandle, GrammarError> {
        if from > to {
            return Err(GrammarError::RangeOrder { from, to });
        }
        Ok(self.push(Node::Range { from, to }))
    }
    pub fn sequence(&mut self, nodes: impl IntoIterator<Item = NodeHandle>) -> NodeHandle {
        self.push(Node::Sequence(nodes.into_iter().collect()))
    }
    pub fn choice(&mut self, nodes: impl IntoIterator<Item = NodeHandle>) -> NodeHandle {
        self.push(Node::Choice(nodes.into_iter().collect()))
    }
    /// Matches nothing and produces [`Value::Null`].
    pub fn none(&mut self) -> NodeHandle {
        self.push(Node::None)
    }
    pub fn optional(&mut self, node: NodeHandle) -> NodeHandle {
        let none = self.none();
        self.choice([node, none])
    }
    pub fn repeat(&mut self, node: NodeHandle) -> NodeHandle {
        self.push(Node::Repeat(node))
    }
    /// `node` followed by `repeat(node)`, the result is a two element sequence.
    pub fn repeat_at_least_once(&mut self, node: NodeHandle) -> NodeHandle {
        let rest = self.repeat(node);
        self.sequence([node, rest])
    }
    pub fn repeat_exact(&mut self, node: NodeHandle, count: usize) -> NodeHandle {
        self.sequence(std::iter::repeat(node).take(count))
    }
    /// `first (second first)*`, for separated lists.
    pub fn repeat_alternating(&mut self, first: NodeHandle, second: NodeHandle) -> NodeHandle {
        let pair = self.sequence([second, first]);
        let rest = self.repeat(pair);
        self.sequence([first, rest])
    }
    pub fn capture(&mut self, label: impl Into<Arc<str>>, node: NodeHandle) -> NodeHandle {
        self.push(Node::Capture {
            label: label.into(),
            node,
        })
    }
    /// Matches `base` unless `forbidden` also matches at the same position.
    pub fn exclude(&mut self, base: NodeHandle, forbidden: NodeHandle) -> NodeHandle {
        self.push(Node::Exclude { base, forbidden })
    }
    /// Creates a placeholder that can be used before the node it stands for exists.
    ///
    /// The placeholder must be resolved before any parse reaches it.
    pub fn create_recursion(&mut self) -> (NodeHandle, Recursion) {
        let slot = self.slots.push(None);
        let node = self.push(Node::Recursion(slot));
        (node, Recursion { slot })
    }
    pub fn action<F>(&mut self, node: NodeHandle, action: F) -> NodeHandle
    where
        F: Fn(Value) -> Result<Value, ActionError> + Send + Sync + 'static,
    {
        self.push(Node::Action {
            node,
            action: Arc::new(action),
        })
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }
    /// Target of a recursion slot, `None` until it is resolved.
    pub fn get_slot(&self, slot: SlotHandle) -> Option<NodeHandle> {
        self.slots.get(slot).copied().flatten()
    }
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
    pub fn iter(&self) -> cranelift_entity::Iter<'_, NodeHandle, Node> {
        self.nodes.iter()
    }
    pub fn iter_slots(&self) -> cranelift_entity::Iter<'_, SlotHandle, Option<NodeHandle>> {
        self.slots.iter()
    }

    /// Writes the tree below `handle`, recursion placeholders are not followed.
    pub fn display_into(
        &self,
        handle: NodeHandle,
        buf: &mut dyn std::fmt::Write,
    ) -> std::fmt::Result {
        self.display_into_indent(handle, buf, 0)
    }
    fn display_into_indent(
        &self,
        handle: NodeHandle,
        buf: &mut dyn std::fmt::Write,
        indent: u32,
    ) -> std::fmt::Result {
        for _ in 0..indent {
            write!(buf, "  ")?;
        }
        let node = &self.nodes[handle];
        node.display_into(buf)?;
        if let Node::Recursion(slot) = *node {
            match self.get_slot(slot) {
                Some(target) => write!(buf, " -> {target}")?,
                None => write!(buf, " unresolved")?,
            }
        }
        write!(buf, "\n")?;

        let mut result = Ok(());
        node.visit_children(|child| {
            if result.is_ok() {
                result = self.display_into_indent(child, &mut *buf, indent + 1);
            }
        });
        result
    }
    pub fn display(&self, handle: NodeHandle) -> String {
        let mut buf = String::new();
        _ = self.display_into(handle, &mut buf);
        buf
    }
}

impl Index<NodeHandle> for Grammar {
    type Output = Node;
    fn index(&self, index: NodeHandle) -> &Self::Output {
        &self.nodes[index]
    }
}

fn single_char(bound: &str) -> Result<char, GrammarError> {
    let mut chars = bound.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(GrammarError::RangeBound(bound.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::Grammar;
    use crate::{error::GrammarError, node::Node};

    #[test]
    fn range_bounds_are_validated() {
        let mut g = Grammar::new();
        assert!(g.range("a", "z").is_ok());
        assert!(g.range("👍", "👍").is_ok());
        assert_eq!(g.range("ab", "z"), Err(GrammarError::RangeBound("ab".into())));
        assert_eq!(g.range("a", ""), Err(GrammarError::RangeBound("".into())));
        assert_eq!(
            g.range("z", "a"),
            Err(GrammarError::RangeOrder { from: 'z', to: 'a' })
        );
    }

    #[test]
    fn derived_constructors() {
        let mut g = Grammar::new();
        let a = g.literal("a");
        let b = g.literal("b");

        let exact = g.repeat_exact(a, 3);
        assert!(matches!(g.get(exact), Some(Node::Sequence(children)) if children[..] == [a, a, a]));

        let alternating = g.repeat_alternating(a, b);
        let Some(Node::Sequence(children)) = g.get(alternating) else {
            panic!("expected a sequence");
        };
        assert_eq!(children[0], a);
        let Some(Node::Repeat(pair)) = g.get(children[1]) else {
            panic!("expected a repeat");
        };
        assert!(matches!(g.get(*pair), Some(Node::Sequence(pair)) if pair[..] == [b, a]));

        let optional = g.optional(a);
        let Some(Node::Choice(alternatives)) = g.get(optional) else {
            panic!("expected a choice");
        };
        assert_eq!(alternatives[0], a);
        assert!(matches!(g.get(alternatives[1]), Some(Node::None)));
    }

    #[test]
    fn recursion_cannot_point_at_itself() {
        let mut g = Grammar::new();
        let (node, rec) = g.create_recursion();
        let slot = rec.slot();

        let err = rec.resolve(&mut g, node).unwrap_err();
        assert_eq!(err.error, GrammarError::SelfRecursion(slot));
        assert_eq!(g.get_slot(slot), None);

        // the token survives the failure
        let a = g.literal("a");
        err.recursion.resolve(&mut g, a).unwrap();
        assert_eq!(g.get_slot(slot), Some(a));
    }

    #[test]
    fn recursion_rejects_foreign_handles() {
        let mut other = Grammar::new();
        for _ in 0..10 {
            other.literal("x");
        }
        let foreign = other.literal("y");

        let mut g = Grammar::new();
        let (_, rec) = g.create_recursion();
        let slot = rec.slot();

        let err = rec.resolve(&mut g, foreign).unwrap_err();
        assert_eq!(err.error, GrammarError::UnknownNode(foreign));
        assert_eq!(g.get_slot(slot), None);
        assert_eq!(GrammarError::from(err), GrammarError::UnknownNode(foreign));
    }

    #[test]
    fn display_stops_at_recursion() {
        let mut g = Grammar::new();
        let (list, rec) = g.create_recursion();
        let open = g.literal("[");
        let close = g.literal("]");
        let inner = g.repeat(list);
        let body = g.sequence([open, inner, close]);
        let body = g.capture("list", body);
        rec.resolve(&mut g, body).unwrap();

        let expected = "\
Capture(list)
  Sequence
    Literal(\"[\")
    Repeat
      Recursion(slot0) -> node5
    Literal(\"]\")
";
        assert_eq!(g.display(body), expected);
    }
}
