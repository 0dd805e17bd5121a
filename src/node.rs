use crate::index::{IndexType, NodeIndex};

/// Node of the red-black tree
#[derive(Debug)]
pub struct Node<V, Ix> {
    /// Left child, `NodeIndex::nil()` when absent
    pub left: NodeIndex<Ix>,
    /// Right child, `NodeIndex::nil()` when absent
    pub right: NodeIndex<Ix>,
    /// Parent, the header for the root
    pub parent: NodeIndex<Ix>,
    /// Color of the node
    pub color: Color,

    /// Value of the node, `None` only for the header
    pub value: Option<V>,
}

impl<V, Ix> Node<V, Ix>
where
    Ix: IndexType,
{
    /// A detached red node holding `value`.
    pub fn new(value: V) -> Self {
        Node {
            left: NodeIndex::nil(),
            right: NodeIndex::nil(),
            parent: NodeIndex::nil(),
            color: Color::Red,
            value: Some(value),
        }
    }

    /// The header of an empty tree: no root, min and max pointing at itself.
    pub fn header() -> Self {
        Node {
            left: NodeIndex::header(),
            right: NodeIndex::header(),
            parent: NodeIndex::nil(),
            color: Color::Red,
            value: None,
        }
    }
}

// Convenient getter/setter methods
impl<V, Ix> Node<V, Ix>
where
    Ix: IndexType,
{
    pub fn color(&self) -> Color {
        self.color
    }

    pub fn left(&self) -> NodeIndex<Ix> {
        self.left
    }

    pub fn right(&self) -> NodeIndex<Ix> {
        self.right
    }

    pub fn parent(&self) -> NodeIndex<Ix> {
        self.parent
    }

    pub fn is_black(&self) -> bool {
        matches!(self.color, Color::Black)
    }

    pub fn is_red(&self) -> bool {
        matches!(self.color, Color::Red)
    }

    /// # Panics
    ///
    /// Panics on the header or on a node whose value was moved out.
    pub fn value(&self) -> &V {
        match &self.value {
            Some(value) => value,
            None => panic!("node holds no value"),
        }
    }

    pub fn set_color(color: Color) -> impl FnOnce(&mut Node<V, Ix>) {
        move |node: &mut Node<V, Ix>| {
            node.color = color;
        }
    }

    pub fn set_left(left: NodeIndex<Ix>) -> impl FnOnce(&mut Node<V, Ix>) {
        move |node: &mut Node<V, Ix>| {
            node.left = left;
        }
    }

    pub fn set_right(right: NodeIndex<Ix>) -> impl FnOnce(&mut Node<V, Ix>) {
        move |node: &mut Node<V, Ix>| {
            node.right = right;
        }
    }

    pub fn set_parent(parent: NodeIndex<Ix>) -> impl FnOnce(&mut Node<V, Ix>) {
        move |node: &mut Node<V, Ix>| {
            node.parent = parent;
        }
    }
}

/// The color of the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// Red node
    Red,
    /// Black node
    Black,
}
