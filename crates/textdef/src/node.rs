use std::{fmt::Debug, sync::Arc};

use crate::{
    error::ActionError,
    handle::{NodeHandle, SlotHandle},
    value::Value,
};

/// Semantic action, turns the raw result of a node into a domain value.
pub type Action = Arc<dyn Fn(Value) -> Result<Value, ActionError> + Send + Sync>;

#[derive(Clone)]
pub enum Node {
    Literal(Arc<str>),
    Range { from: char, to: char },
    Sequence(Box<[NodeHandle]>),
    Choice(Box<[NodeHandle]>),
    Repeat(NodeHandle),
    Exclude {
        base: NodeHandle,
        forbidden: NodeHandle,
    },
    Capture {
        label: Arc<str>,
        node: NodeHandle,
    },
    Recursion(SlotHandle),
    Action { node: NodeHandle, action: Action },
    None,
}

impl Node {
    /// Calls `f` with every direct child in evaluation order.
    ///
    /// Recursion targets live in the slot table and are not visited.
    pub fn visit_children(&self, mut f: impl FnMut(NodeHandle)) {
        match self {
            Node::Sequence(a) | Node::Choice(a) => a.iter().copied().for_each(f),
            Node::Repeat(a) => f(*a),
            Node::Exclude { base, forbidden } => {
                f(*base);
                f(*forbidden);
            }
            Node::Capture { node, .. } | Node::Action { node, .. } => f(*node),
            Node::Literal(_) | Node::Range { .. } | Node::Recursion(_) | Node::None => {}
        }
    }
    pub fn display_into(&self, buf: &mut dyn std::fmt::Write) -> std::fmt::Result {
        match self {
            Node::Literal(a) => write!(buf, "Literal({a:?})"),
            Node::Range { from, to } => write!(buf, "Range({from:?}..={to:?})"),
            Node::Sequence(_) => write!(buf, "Sequence"),
            Node::Choice(_) => write!(buf, "Choice"),
            Node::Repeat(_) => write!(buf, "Repeat"),
            Node::Exclude { .. } => write!(buf, "Exclude"),
            Node::Capture { label, .. } => write!(buf, "Capture({label})"),
            Node::Recursion(slot) => write!(buf, "Recursion({slot})"),
            Node::Action { .. } => write!(buf, "Action"),
            Node::None => write!(buf, "None"),
        }
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Sequence(a) => f.debug_tuple("Sequence").field(a).finish(),
            Node::Choice(a) => f.debug_tuple("Choice").field(a).finish(),
            Node::Repeat(a) => f.debug_tuple("Repeat").field(a).finish(),
            Node::Exclude { base, forbidden } => f
                .debug_struct("Exclude")
                .field("base", base)
                .field("forbidden", forbidden)
                .finish(),
            Node::Capture { label, node } => f
                .debug_struct("Capture")
                .field("label", label)
                .field("node", node)
                .finish(),
            Node::Action { node, .. } => f.debug_tuple("Action").field(node).finish(),
            _ => self.display_into(f),
        }
    }
}
