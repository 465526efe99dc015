//! Bounding-volume tree over zone objects.
//!
//! ```text
//! node  u32 flags (bit 0: leaf), 8 x vec3 corners, 4 x u32 child offsets,
//!       u32 count, u32 list_offset (u16 object indices, leaves only)
//! ```

use datkit_common::ByteCursor;

use crate::section::SectionHeader;
use crate::{Error, FxHashMap, Result};

const FLAG_LEAF: u32 = 0x01;
const NODE_SIZE: usize = 124;
const CORNERS_SIZE: usize = 8 * 12;
const MAX_CHILDREN: usize = 4;
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpaceNode {
    pub leaf: bool,
    /// Indices of child nodes in the tree's arena.
    pub children: Vec<usize>,
    /// Zone object indices. Empty for interior nodes.
    pub objects: Vec<u16>,
}

/// An immutable tree of [`SpaceNode`]s rooted at index 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceTree {
    nodes: Vec<SpaceNode>,
}

impl SpaceTree {
    pub fn root(&self) -> &SpaceNode {
        &self.nodes[0]
    }

    pub fn node(&self, index: usize) -> Option<&SpaceNode> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[SpaceNode] {
        &self.nodes
    }

    /// Visit every node reachable from the root, depth-first, parents
    /// before children. Shared subtrees are visited once.
    pub fn visit(&self, mut f: impl FnMut(usize, &SpaceNode)) {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![0usize];

        while let Some(index) = stack.pop() {
            if std::mem::replace(&mut seen[index], true) {
                continue;
            }
            let node = &self.nodes[index];
            f(index, node);
            stack.extend(node.children.iter().rev());
        }
    }

    /// Leaf nodes reachable from the root.
    pub fn leaves(&self) -> Vec<&SpaceNode> {
        let mut out = Vec::new();
        self.visit(|i, node| {
            if node.leaf {
                out.push(&self.nodes[i]);
            }
        });
        out
    }

    /// Every object index held by a reachable leaf, sorted and deduplicated.
    pub fn leaf_objects(&self) -> Vec<u16> {
        let mut objects: Vec<u16> = self
            .leaves()
            .into_iter()
            .flat_map(|leaf| leaf.objects.iter().copied())
            .collect();
        objects.sort_unstable();
        objects.dedup();
        objects
    }
}

struct TreeDecoder<'c, 'a> {
    cursor: &'c mut ByteCursor<'a>,
    header: &'c SectionHeader,
    limit: usize,
    object_count: usize,
    nodes: Vec<SpaceNode>,
    /// Offset to node index; `None` while the node is being decoded.
    visited: FxHashMap<u32, Option<usize>>,
}

impl TreeDecoder<'_, '_> {
    fn node(&mut self, offset: u32, depth: usize) -> Result<usize> {
        let position = self.header.at(offset);
        match self.visited.get(&offset) {
            Some(Some(index)) => return Ok(*index),
            Some(None) => return Err(Error::unexpected("space tree", "node is its own ancestor", position)),
            None => {}
        }
        if depth > MAX_DEPTH {
            return Err(Error::unexpected("space tree", "nesting too deep", position));
        }

        let start = self.header.table(self.limit, "space tree node", offset, 1, NODE_SIZE)?;
        self.visited.insert(offset, None);

        let (flags, child_offsets, count, list_offset) = self.cursor.peek(start, |c| {
            let flags = c.read_u32();
            c.advance(CORNERS_SIZE);
            let children: [u32; MAX_CHILDREN] = std::array::from_fn(|_| c.read_u32());
            (flags, children, c.read_u32() as usize, c.read_u32())
        });
        let leaf = flags & FLAG_LEAF != 0;

        let index = self.nodes.len();
        self.nodes.push(SpaceNode {
            leaf,
            ..SpaceNode::default()
        });

        let mut children = Vec::new();
        for child in child_offsets.into_iter().filter(|&o| o != 0) {
            children.push(self.node(child, depth + 1)?);
        }

        let mut objects = Vec::new();
        if leaf && count > 0 {
            let list = self
                .header
                .table(self.limit, "space tree objects", list_offset, count, 2)?;
            let raw: Vec<u16> = self
                .cursor
                .peek(list, |c| (0..count).map(|_| c.read_u16()).collect());
            for object in raw {
                if usize::from(object) < self.object_count {
                    objects.push(object);
                } else {
                    tracing::warn!(
                        zone = %self.header.tag(),
                        object,
                        "space tree leaf references a missing object, dropped"
                    );
                }
            }
        }

        self.nodes[index].children = children;
        self.nodes[index].objects = objects;
        self.visited.insert(offset, Some(index));
        Ok(index)
    }
}

/// Decode the tree rooted at body offset `offset`.
pub(crate) fn decode(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    offset: u32,
    object_count: usize,
) -> Result<SpaceTree> {
    let limit = cursor.len();
    let mut decoder = TreeDecoder {
        cursor,
        header,
        limit,
        object_count,
        nodes: Vec::new(),
        visited: FxHashMap::default(),
    };
    decoder.node(offset, 0)?;
    Ok(SpaceTree {
        nodes: decoder.nodes,
    })
}
