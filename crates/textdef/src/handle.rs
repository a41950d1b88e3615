use cranelift_entity::entity_impl;

/// Index of a node inside the [`Grammar`](crate::Grammar) that created it.
///
/// Handles are only meaningful for their own grammar, using one with
/// another grammar either panics or refers to an unrelated node.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeHandle(u32);

entity_impl! { NodeHandle, "node" }

/// Index of the target cell behind a recursion placeholder.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotHandle(u32);

entity_impl! { SlotHandle, "slot" }

#[test]
fn test_handle_display() {
    use cranelift_entity::EntityRef;

    assert_eq!(NodeHandle::new(3).to_string(), "node3");
    assert_eq!(SlotHandle::new(0).to_string(), "slot0");
    assert_eq!(NodeHandle::from_u32(7).index(), 7);
}
