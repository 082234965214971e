//! # Chunks
//!
//! Every chunk in a replay starts with the same header:
//!
//! ```plain
//! Offset | Size | Field
//! -------|------|----------------------------------------
//! 0x00   |  8   | tag, ascii (eg: FOLDINFO, DATAINFO)
//! 0x08   |  4   | version
//! 0x0c   |  4   | body length
//! 0x10   |  4   | name length
//! 0x14   |  8   | reserved
//! 0x1c   |  n   | name, ascii, only when name length > 0
//! ```
//!
//! The body follows the header. A tag starting with `FOLD` is a container whose body is nothing
//! but child chunks, so the body length of a container is the sum of the spans (header and body)
//! of its children. Any other tag is a leaf with a payload specific to the tag and version.
//!
//! The parsed chunks are kept in a [`ChunkTree`], an arena in byte order where each node points at
//! its parent. The name redaction walks these edges to know which length fields account for a
//! given byte.

use crate::core_parser::CoreParser;
use crate::errors::ParseError;
use std::fmt;

/// Size of a chunk header without the optional name
pub const HEADER_SIZE: usize = 28;

/// Offset of the body length field from the start of the chunk header
pub const BODY_LEN_OFFSET: usize = 12;

const CONTAINER_PREFIX: &[u8; 4] = b"FOLD";

/// The eight character type of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChunkTag(pub [u8; 8]);

impl ChunkTag {
    pub const PLAYER_INFO: ChunkTag = ChunkTag(*b"DATAINFO");
    pub const MATCH_SETTINGS: ChunkTag = ChunkTag(*b"DATABASE");
    pub const MAP_DESCRIPTOR: ChunkTag = ChunkTag(*b"DATASDSC");
    pub const INFO_FOLDER: ChunkTag = ChunkTag(*b"FOLDINFO");

    pub fn is_container(&self) -> bool {
        self.0.starts_with(CONTAINER_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        // Tags are validated as ascii before construction
        std::str::from_utf8(&self.0).unwrap_or("????????")
    }
}

impl fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of a chunk within a [`ChunkTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub usize);

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ChunkId({})", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkNode {
    pub tag: ChunkTag,
    pub version: u32,
    pub body_len: u32,
    pub name: Option<String>,

    /// Absolute offset of the first byte of the tag
    pub header_offset: usize,

    /// Absolute offset of the first byte after the header and name
    pub body_offset: usize,

    pub parent: Option<ChunkId>,
}

impl ChunkNode {
    /// Absolute offset of the body length field
    pub fn len_field_offset(&self) -> usize {
        self.header_offset + BODY_LEN_OFFSET
    }

    /// Absolute offset one past the last byte of the body
    pub fn end(&self) -> usize {
        self.body_offset + self.body_len as usize
    }

    /// Bytes the chunk occupies in its parent: header, name, and body
    pub fn span(&self) -> usize {
        self.end() - self.header_offset
    }

    pub fn is_container(&self) -> bool {
        self.tag.is_container()
    }
}

/// The decoded header of a chunk, prior to its body being parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHeader {
    pub tag: ChunkTag,
    pub version: u32,
    pub body_len: u32,
    pub name: Option<String>,
    pub header_offset: usize,
}

impl ChunkHeader {
    pub fn parse(rlp: &mut CoreParser) -> Result<ChunkHeader, ParseError> {
        let header_offset = rlp.bytes_read();
        let raw = rlp.take_data(8)?;
        if !raw.is_ascii() {
            return Err(ParseError::BadTag(raw.to_vec()));
        }

        let mut tag = [0u8; 8];
        tag.copy_from_slice(raw);
        let version = rlp.read_u32()?;
        let body_len = rlp.read_u32()?;
        let name_len = rlp.read_u32()?;
        rlp.skip(8)?;

        // The name is only decorative, so a name in a foreign encoding is dropped
        let name = match name_len {
            0 => None,
            n => rlp.read_ascii(n as usize)?,
        };

        Ok(ChunkHeader {
            tag: ChunkTag(tag),
            version,
            body_len,
            name,
            header_offset,
        })
    }
}

/// Arena of every chunk in a replay in the order they appear
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkTree {
    nodes: Vec<ChunkNode>,
}

impl ChunkTree {
    pub fn new() -> Self {
        ChunkTree { nodes: Vec::new() }
    }

    pub fn push(&mut self, node: ChunkNode) -> ChunkId {
        self.nodes.push(node);
        ChunkId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: ChunkId) -> &ChunkNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChunkId, &ChunkNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (ChunkId(i), n))
    }

    /// Chunks of a given type in byte order
    pub fn with_tag(&self, tag: ChunkTag) -> impl Iterator<Item = (ChunkId, &ChunkNode)> {
        self.iter().filter(move |(_, n)| n.tag == tag)
    }

    pub fn children(&self, id: ChunkId) -> impl Iterator<Item = (ChunkId, &ChunkNode)> {
        self.iter().filter(move |(_, n)| n.parent == Some(id))
    }

    /// The parent of the chunk, its grandparent, and so on up to a top level chunk
    pub fn ancestors(&self, id: ChunkId) -> impl Iterator<Item = (ChunkId, &ChunkNode)> {
        let mut current = self.get(id).parent;
        std::iter::from_fn(move || {
            let id = current?;
            let node = self.get(id);
            current = node.parent;
            Some((id, node))
        })
    }

    /// Checks that the body length of every container is exactly accounted for by its children
    /// and that the children are laid out back to back.
    pub fn validate(&self) -> Result<(), ParseError> {
        for (id, node) in self.iter().filter(|(_, n)| n.is_container()) {
            let mut expected = node.body_offset;
            for (_, child) in self.children(id) {
                if child.header_offset != expected {
                    return Err(ParseError::BodyMismatch {
                        tag: node.tag.to_string(),
                        offset: node.header_offset,
                        declared: node.body_len,
                        actual: child.header_offset - node.body_offset,
                    });
                }
                expected += child.span();
            }

            let actual = expected - node.body_offset;
            if actual != node.body_len as usize {
                return Err(ParseError::BodyMismatch {
                    tag: node.tag.to_string(),
                    offset: node.header_offset,
                    declared: node.body_len,
                    actual,
                });
            }
        }

        Ok(())
    }
}
