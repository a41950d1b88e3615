use cranelift_entity::{EntitySet, SecondaryMap};

use crate::{
    error::GrammarError,
    grammar::Grammar,
    handle::{NodeHandle, SlotHandle},
    node::Node,
};

impl Grammar {
    /// Looks for placeholders that were never resolved and for left recursion.
    ///
    /// Neither is rejected while building because a grammar is allowed to be
    /// incomplete until it is used.
    pub fn check(&self) -> Result<(), Vec<GrammarError>> {
        let mut errors = Vec::new();

        for (slot, target) in self.iter_slots() {
            if target.is_none() {
                errors.push(GrammarError::Unresolved(slot));
            }
        }

        let nullable = compute_nullable(self);
        check_left_recursion(self, &nullable, &mut errors);

        match errors.is_empty() {
            true => Ok(()),
            false => Err(errors),
        }
    }
}

/// Whether each node can succeed without consuming input.
fn compute_nullable(grammar: &Grammar) -> SecondaryMap<NodeHandle, bool> {
    let mut nullable = SecondaryMap::new();

    // recursion makes this a fixpoint, a node only ever flips false -> true
    let mut changed = true;
    while changed {
        changed = false;
        for (handle, node) in grammar.iter() {
            if nullable[handle] {
                continue;
            }
            let is_nullable = match node {
                Node::Literal(a) => a.is_empty(),
                Node::Range { .. } => false,
                Node::Sequence(children) => children.iter().all(|&c| nullable[c]),
                Node::Choice(children) => children.iter().any(|&c| nullable[c]),
                Node::Repeat(_) | Node::None => true,
                &Node::Exclude { base, .. } => nullable[base],
                &Node::Capture { node, .. } | &Node::Action { node, .. } => nullable[node],
                &Node::Recursion(slot) => match grammar.get_slot(slot) {
                    Some(target) => nullable[target],
                    None => false,
                },
            };
            if is_nullable {
                nullable[handle] = true;
                changed = true;
            }
        }
    }

    nullable
}

/// Nodes that may be attempted at the same position as `node` itself.
fn prefix_children(
    grammar: &Grammar,
    node: &Node,
    nullable: &SecondaryMap<NodeHandle, bool>,
    out: &mut Vec<NodeHandle>,
) {
    match node {
        Node::Sequence(children) => {
            for &child in children.iter() {
                out.push(child);
                if !nullable[child] {
                    break;
                }
            }
        }
        &Node::Recursion(slot) => out.extend(grammar.get_slot(slot)),
        _ => node.visit_children(|child| out.push(child)),
    }
}

fn check_left_recursion(
    grammar: &Grammar,
    nullable: &SecondaryMap<NodeHandle, bool>,
    errors: &mut Vec<GrammarError>,
) {
    let mut visited = EntitySet::new();
    let mut reported = EntitySet::<SlotHandle>::new();
    let mut path = Vec::new();

    for (handle, _) in grammar.iter() {
        find_prefix_cycles(
            handle,
            grammar,
            nullable,
            &mut visited,
            &mut path,
            &mut reported,
            errors,
        );
    }
}

fn find_prefix_cycles(
    handle: NodeHandle,

    grammar: &Grammar,
    nullable: &SecondaryMap<NodeHandle, bool>,

    visited: &mut EntitySet<NodeHandle>,
    path: &mut Vec<NodeHandle>,
    reported: &mut EntitySet<SlotHandle>,

    errors: &mut Vec<GrammarError>,
) {
    if let Some(start) = path.iter().position(|&h| h == handle) {
        //      /handle
        // A -> B -> C -> D
        //      ↑________|
        // every cycle has to pass through a placeholder, children are always older than parents
        let slot = path[start..].iter().find_map(|&h| match grammar[h] {
            Node::Recursion(slot) => Some(slot),
            _ => None,
        });
        if let Some(slot) = slot {
            if !reported.contains(slot) {
                reported.insert(slot);
                errors.push(GrammarError::LeftRecursion(slot));
            }
        }
        return;
    }

    if visited.contains(handle) {
        return;
    }
    visited.insert(handle);
    path.push(handle);

    let mut children = Vec::new();
    prefix_children(grammar, &grammar[handle], nullable, &mut children);
    for child in children {
        find_prefix_cycles(child, grammar, nullable, visited, path, reported, errors);
    }

    path.pop();
}

#[cfg(test)]
mod tests {
    use crate::{error::GrammarError, grammar::Grammar};

    #[test]
    fn complete_grammar_passes() {
        let mut g = Grammar::new();
        let (list, rec) = g.create_recursion();
        let open = g.literal("(");
        let close = g.literal(")");
        let inner = g.repeat(list);
        let body = g.sequence([open, inner, close]);
        rec.resolve(&mut g, body).unwrap();

        assert_eq!(g.check(), Ok(()));
    }

    #[test]
    fn reports_unresolved() {
        let mut g = Grammar::new();
        let (_, first) = g.create_recursion();
        let (_, second) = g.create_recursion();
        let a = g.literal("a");
        second.resolve(&mut g, a).unwrap();

        assert_eq!(g.check(), Err(vec![GrammarError::Unresolved(first.slot())]));
    }

    #[test]
    fn reports_left_recursion() {
        // expr = expr "+" "1" | "1"
        let mut g = Grammar::new();
        let (expr, rec) = g.create_recursion();
        let slot = rec.slot();
        let plus = g.literal("+");
        let one = g.literal("1");
        let sum = g.sequence([expr, plus, one]);
        let body = g.choice([sum, one]);
        rec.resolve(&mut g, body).unwrap();

        assert_eq!(g.check(), Err(vec![GrammarError::LeftRecursion(slot)]));
    }

    #[test]
    fn left_recursion_behind_nullable_prefix() {
        // rule = " "* rule | "x"
        let mut g = Grammar::new();
        let (rule, rec) = g.create_recursion();
        let slot = rec.slot();
        let space = g.literal(" ");
        let spaces = g.repeat(space);
        let x = g.literal("x");
        let nested = g.sequence([spaces, rule]);
        let body = g.choice([nested, x]);
        rec.resolve(&mut g, body).unwrap();

        assert_eq!(g.check(), Err(vec![GrammarError::LeftRecursion(slot)]));
    }
}
