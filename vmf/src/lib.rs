pub mod block;
pub mod parser;
pub mod value;
pub mod writer;

use crate::block::{Block, BlockKind};

/// A parsed map document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Top-level blocks in file order.
    pub blocks: Vec<Block>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl Document {
    /// Index of the world block, when the document has one.
    pub fn world_index(&self) -> Option<usize> {
        self.blocks.iter().position(|b| b.kind == BlockKind::World)
    }

    pub fn world(&self) -> Option<&Block> {
        self.world_index().map(|i| &self.blocks[i])
    }

    /// Largest `id` anywhere in the document.
    pub fn max_id(&self) -> i64 {
        self.blocks.iter().map(Block::max_id).max().unwrap_or(0)
    }

    /// Largest `nodeid` anywhere in the document.
    pub fn max_node_id(&self) -> i64 {
        self.blocks.iter().map(Block::max_node_id).max().unwrap_or(0)
    }
}
