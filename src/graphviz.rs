//! DOT rendering of the tree shape, for debugging rebalancing.

use std::fmt::Debug;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::index::{IndexType, NodeIndex};
use crate::node::Node;
use crate::tree::RbTree;

impl<V, KoV, C, Ix> RbTree<V, KoV, C, Ix>
where
    V: Debug,
    Ix: IndexType,
{
    /// Write the tree as a graphviz digraph to `path`, labelling nodes with
    /// their values.
    pub fn draw<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        self.write_dot(&mut file, true)?;
        file.flush()
    }

    /// Write the tree as a graphviz digraph to `path`, labelling nodes with
    /// their slot numbers only.
    pub fn draw_without_value<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        self.write_dot(&mut file, false)?;
        file.flush()
    }

    /// Render the digraph into any writer.
    pub fn write_dot<W: Write>(&self, out: &mut W, with_value: bool) -> io::Result<()> {
        writeln!(out, "digraph {{")?;
        // begin at root node
        self.draw_node(self.root(), out, with_value)?;
        writeln!(out, "}}")
    }

    fn draw_node<W: Write>(&self, x: NodeIndex<Ix>, out: &mut W, with_value: bool) -> io::Result<()> {
        if x.is_nil() {
            return Ok(());
        }
        let color = if self.node_ref(x, Node::is_red) {
            "red"
        } else {
            "black"
        };
        let label = if with_value {
            format!("{:?}", self.node_ref(x, Node::value)).replace('"', "\\\"")
        } else {
            x.index().to_string()
        };
        writeln!(out, "    n{} [label=\"{label}\", color={color}];", x.index())?;

        for child in [self.node_ref(x, Node::left), self.node_ref(x, Node::right)] {
            if !child.is_nil() {
                writeln!(out, "    n{} -> n{};", x.index(), child.index())?;
                self.draw_node(child, out, with_value)?;
            }
        }
        Ok(())
    }
}
