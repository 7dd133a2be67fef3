use std::borrow::Cow;
use std::io::{self, Write};

use crate::Document;
use crate::block::Block;

/// Serialize a full document in the canonical tab-indented layout.
pub fn write_document<W: Write>(document: &Document, writer: &mut W) -> io::Result<()> {
    for block in &document.blocks {
        write_block(block, writer, 0)?;
    }
    Ok(())
}

/// Serialize one block and its subtree at the given indent depth.
pub fn write_block<W: Write>(block: &Block, writer: &mut W, depth: usize) -> io::Result<()> {
    let indent = "\t".repeat(depth);
    writeln!(writer, "{}{}", indent, block.kind.keyword())?;
    writeln!(writer, "{}{{", indent)?;
    for property in &block.properties {
        writeln!(
            writer,
            "{}\t\"{}\" \"{}\"",
            indent,
            escape(&property.key),
            escape(&property.value.to_string()),
        )?;
    }
    for child in &block.children {
        write_block(child, writer, depth + 1)?;
    }
    writeln!(writer, "{}}}", indent)
}

fn escape(text: &str) -> Cow<'_, str> {
    if text.contains('"') || text.contains('\\') {
        Cow::Owned(text.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        Cow::Borrowed(text)
    }
}
