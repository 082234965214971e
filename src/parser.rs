//! # Parsing
//!
//! A Company of Heroes replay is a little endian binary file. The number 100 would be represented
//! as the four byte sequence:
//!
//! ```plain
//! 0x64 0x00 0x00 0x00
//! ```
//!
//! A replay is split into a header and two chunky streams.
//!
//! ## Header
//!
//! The file version, the signature `COH__REC`, and the time the match was played as a null
//! terminated utf-16 string formatted according to the locale of the recording machine. The
//! header is padded out to 76 bytes.
//!
//! ## Chunky streams
//!
//! Each stream begins with the magic `Relic Chunky` and the length of its own header. The first
//! stream holds a single chunk that is only of interest for its length, which gets us to the
//! second stream. The second stream holds two chunks, the first of which is the info folder
//! containing the match settings, the map descriptor, and the players.
//!
//! See the [`chunk`](crate::chunk) module for how chunks nest. Leaf chunks are decoded based on
//! their tag and version; an unknown leaf is skipped over by its body length, as is a leaf where
//! a decoder consumed fewer bytes than the body holds.
//!
//! What follows the second stream (the game ticks and chat) isn't decoded.

use crate::chunk::{ChunkHeader, ChunkId, ChunkNode, ChunkTree};
use crate::core_parser::CoreParser;
use crate::date::decode_date;
use crate::errors::{LeafError, ParseError};
use crate::header::{parse_chunky_header, parse_file_header, section};
use crate::models::*;
use crate::parsing_utils::{decode_ascii, decode_utf16_lossy};
use phf::phf_map;

/// Chunks in the first chunky stream
const FIRST_STREAM_CHUNKS: usize = 1;

/// Chunks in the second chunky stream
const SECOND_STREAM_CHUNKS: usize = 2;

/// Containers nested deeper than this are treated as garbage
const MAX_DEPTH: usize = 32;

/// Marks a match played for victory points
const VP_GAME_MAGIC: u32 = 0x6038_72a3;

/// Base victory point count, doubled per step of the encoded exponent
const VP_BASE: u32 = 250;

/// Korean replays of 2v2 automatches carry this instead of a legible match type
const GARBLED_AUTOMATCH: &str = "\u{c0de}\u{0bad}\u{0101}\u{4204}\u{4cc5}\u{0103}\u{1000}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeafKind {
    MapDescriptor,
    MatchSettings,
    PlayerInfo,
}

impl LeafKind {
    /// The only version of the chunk that the decoder understands
    fn version(self) -> u32 {
        match self {
            LeafKind::MapDescriptor => 2004,
            LeafKind::MatchSettings => 11,
            LeafKind::PlayerInfo => 6,
        }
    }
}

static LEAF_DECODERS: phf::Map<&'static str, LeafKind> = phf_map! {
    "DATASDSC" => LeafKind::MapDescriptor,
    "DATABASE" => LeafKind::MatchSettings,
    "DATAINFO" => LeafKind::PlayerInfo,
};

/// Determines what happens when a known leaf chunk fails to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafPolicy {
    /// Record the failure on the replay and move on to the next chunk. Fields decoded before the
    /// failure are kept. This is the default.
    Lenient,

    /// Fail the whole parse
    Strict,
}

/// The main entry point to parsing replays. Allows one to customize parsing options.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserBuilder<'a> {
    data: &'a [u8],
    leaf_policy: Option<LeafPolicy>,
}

impl<'a> ParserBuilder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ParserBuilder {
            data,
            leaf_policy: None,
        }
    }

    pub fn lenient_leaves(mut self) -> ParserBuilder<'a> {
        self.leaf_policy = Some(LeafPolicy::Lenient);
        self
    }

    pub fn strict_leaves(mut self) -> ParserBuilder<'a> {
        self.leaf_policy = Some(LeafPolicy::Strict);
        self
    }

    pub fn with_leaf_policy(mut self, policy: LeafPolicy) -> ParserBuilder<'a> {
        self.leaf_policy = Some(policy);
        self
    }

    pub fn parse(self) -> Result<Replay, ParseError> {
        let parser = Parser::new(self.data, self.leaf_policy.unwrap_or(LeafPolicy::Lenient));
        parser.parse()
    }
}

/// Walks the container structure without decoding any leaves
pub(crate) fn scan_chunks(data: &[u8]) -> Result<ChunkTree, ParseError> {
    let mut parser = Parser::new(data, LeafPolicy::Lenient);
    parser.decode_leaves = false;
    parser.parse().map(|replay| replay.chunks)
}

/// Holds the current state of parsing a replay
#[derive(Debug, Clone, PartialEq)]
pub struct Parser<'a> {
    core: CoreParser<'a>,
    leaf_policy: LeafPolicy,
    decode_leaves: bool,
    replay: Replay,
}

impl<'a> Parser<'a> {
    fn new(data: &'a [u8], leaf_policy: LeafPolicy) -> Self {
        Parser {
            core: CoreParser::new(data),
            leaf_policy,
            decode_leaves: true,
            replay: Replay::default(),
        }
    }

    fn parse(mut self) -> Result<Replay, ParseError> {
        let header = parse_file_header(&mut self.core)?;
        self.replay.file_version = header.file_version;
        if self.decode_leaves {
            self.replay.local_date = header.local_date_string.as_deref().and_then(decode_date);
        }
        self.replay.local_date_string = header.local_date_string;

        let first = parse_chunky_header(&mut self.core)?;
        self.replay.chunky_version = first.version;
        self.parse_stream(FIRST_STREAM_CHUNKS)?;

        let second = parse_chunky_header(&mut self.core)?;
        tracing::debug!(
            first = first.offset,
            second = second.offset,
            version = second.version,
            "located chunky streams"
        );
        self.parse_stream(SECOND_STREAM_CHUNKS)?;

        Ok(self.replay)
    }

    fn parse_stream(&mut self, chunks: usize) -> Result<(), ParseError> {
        for _ in 0..chunks {
            let limit = self.core.len();
            self.parse_chunk(None, 0, limit)?;
        }
        Ok(())
    }

    /// Parses a chunk and all of its descendants, which must end at or before `limit`
    fn parse_chunk(
        &mut self,
        parent: Option<ChunkId>,
        depth: usize,
        limit: usize,
    ) -> Result<ChunkId, ParseError> {
        let header = ChunkHeader::parse(&mut self.core)
            .map_err(|e| section("chunk header", &self.core, e))?;

        let body_offset = self.core.position();
        let end = body_offset + header.body_len as usize;
        if end > limit {
            return Err(match parent {
                Some(_) => ParseError::ChildOverrun {
                    tag: header.tag.to_string(),
                    offset: header.header_offset,
                    end: limit,
                },
                None => ParseError::ChunkTooLarge {
                    tag: header.tag.to_string(),
                    offset: header.header_offset,
                    len: header.body_len,
                    available: limit.saturating_sub(body_offset),
                },
            });
        }

        tracing::trace!(
            tag = %header.tag,
            version = header.version,
            offset = header.header_offset,
            len = header.body_len,
            "chunk"
        );

        let id = self.replay.chunks.push(ChunkNode {
            tag: header.tag,
            version: header.version,
            body_len: header.body_len,
            name: header.name.clone(),
            header_offset: header.header_offset,
            body_offset,
            parent,
        });

        if header.tag.is_container() {
            if depth >= MAX_DEPTH {
                return Err(ParseError::TooDeep(MAX_DEPTH));
            }

            while self.core.position() < end {
                self.parse_chunk(Some(id), depth + 1, end)?;
            }
        } else {
            let mut body = self.core.scope(header.body_len as usize)?;
            if self.decode_leaves {
                self.decode_leaf(&header, &mut body)?;
            }
        }

        Ok(id)
    }

    fn decode_leaf(&mut self, header: &ChunkHeader, body: &mut CoreParser) -> Result<(), ParseError> {
        let kind = match LEAF_DECODERS.get(header.tag.as_str()) {
            Some(&kind) if kind.version() == header.version => kind,
            Some(&kind) => {
                tracing::debug!(
                    tag = %header.tag,
                    version = header.version,
                    expected = kind.version(),
                    "skipping leaf of unsupported version"
                );
                return Ok(());
            }
            None => return Ok(()),
        };

        let res = match kind {
            LeafKind::MapDescriptor => map_descriptor(body, &mut self.replay),
            LeafKind::MatchSettings => match_settings(body, &mut self.replay),
            LeafKind::PlayerInfo => player_info(body, &mut self.replay),
        };

        match (res, self.leaf_policy) {
            (Ok(()), _) => Ok(()),
            (Err(source), LeafPolicy::Strict) => Err(ParseError::Leaf {
                tag: header.tag.to_string(),
                version: header.version,
                offset: header.header_offset,
                source,
            }),
            (Err(error), LeafPolicy::Lenient) => {
                tracing::warn!(
                    tag = %header.tag,
                    offset = header.header_offset,
                    error = %error,
                    "failed to decode leaf chunk"
                );
                self.replay.issues.push(LeafIssue {
                    tag: header.tag.to_string(),
                    version: header.version,
                    offset: header.header_offset,
                    error,
                });
                Ok(())
            }
        }
    }
}

/// `DATASDSC`: the mod and map the match was played on
fn map_descriptor(rlp: &mut CoreParser, replay: &mut Replay) -> Result<(), LeafError> {
    rlp.skip_u32s(1)?;
    replay.unknown_date = rlp.read_wide_prefixed()?;
    rlp.skip_u32s(3)?;
    replay.mod_name = rlp.read_ascii_prefixed()?;
    replay.map_file_name = rlp.read_ascii_prefixed()?;
    rlp.skip_u32s(5)?;
    replay.map_name = rlp.read_wide_prefixed()?;

    // Some replays repeat a field here, others leave it empty
    let repeated = rlp.read_u32()?;
    if repeated != 0 {
        rlp.read_wide(repeated as usize)?;
    }

    replay.map_description = rlp.read_wide_prefixed()?;
    rlp.skip_u32s(1)?;
    replay.map_width = Some(rlp.read_u32()?);
    replay.map_height = Some(rlp.read_u32()?);
    rlp.skip_u32s(3)?;
    Ok(())
}

/// `DATABASE`: the settings the match was created with
fn match_settings(rlp: &mut CoreParser, replay: &mut Replay) -> Result<(), LeafError> {
    rlp.skip(16)?;
    replay.random_start = Some(rlp.read_u32()? == 0);
    rlp.skip_u32s(1)?;
    replay.high_resources = Some(rlp.read_u32()? == 1);
    rlp.skip_u32s(1)?;
    replay.vp_count = Some(victory_points(rlp.read_u32()?)?);
    rlp.skip(5)?;
    replay.replay_name = rlp.read_wide_prefixed()?;
    rlp.skip(8)?;
    replay.vp_game = Some(rlp.read_u32()? == VP_GAME_MAGIC);
    rlp.skip(23)?;

    // minor version
    rlp.read_ascii_prefixed()?;
    rlp.skip(4)?;

    // major version
    rlp.read_ascii_prefixed()?;
    rlp.skip(8)?;

    if rlp.read_u32()? == 2 {
        rlp.read_ascii_prefixed()?;
        replay.game_version = rlp.read_ascii_prefixed()?;
    }

    rlp.read_ascii_prefixed()?;
    replay.match_type = rlp.take_prefixed(1).map(match_type)?;
    Ok(())
}

/// `DATAINFO`: one seat of the match
fn player_info(rlp: &mut CoreParser, replay: &mut Replay) -> Result<(), LeafError> {
    let name = rlp.read_wide_prefixed()?;
    let slot = SlotKind::from_byte(rlp.read_u8()?)?;
    rlp.skip(3)?;
    let team = rlp.read_u8()?;
    rlp.skip(3)?;
    let faction = rlp.read_ascii_prefixed()?;

    if team > 1 {
        tracing::warn!(team, "unexpected team id");
    }

    replay.players.push(Player {
        name,
        faction,
        team,
        slot,
    });

    rlp.skip(8)?;
    Ok(())
}

/// Victory points are encoded as the exponent of a multiplier of 250
pub fn victory_points(exponent: u32) -> Result<u32, LeafError> {
    1u32.checked_shl(exponent)
        .and_then(|x| x.checked_mul(VP_BASE))
        .ok_or(LeafError::VictoryPointsOverflow(exponent))
}

/// The match type is ascii, except for when it is a known encoding artifact of the automatch
/// label.
fn match_type(data: &[u8]) -> Option<String> {
    match decode_ascii(data) {
        Some(s) => Some(s),
        None if decode_utf16_lossy(data).contains(GARBLED_AUTOMATCH) => {
            Some(String::from("automatch"))
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkTag;
    use crate::parsing_utils::encode_wide;

    #[test]
    fn victory_point_exponents() {
        assert_eq!(victory_points(0), Ok(250));
        assert_eq!(victory_points(1), Ok(500));
        assert_eq!(victory_points(2), Ok(1000));
        assert_eq!(victory_points(24), Ok(4_194_304_000));
        assert_eq!(victory_points(30), Err(LeafError::VictoryPointsOverflow(30)));
        assert_eq!(victory_points(40), Err(LeafError::VictoryPointsOverflow(40)));
    }

    #[test]
    fn match_type_normalization() {
        assert_eq!(match_type(b"basic_match"), Some(String::from("basic_match")));

        let mut garbled = encode_wide(GARBLED_AUTOMATCH);
        garbled.extend_from_slice(&encode_wide("2v2"));
        assert_eq!(match_type(&garbled), Some(String::from("automatch")));

        assert_eq!(match_type(&[0xff, 0xfe]), None);
    }

    #[test]
    fn player_info_decodes() {
        let mut data = crate::parsing_utils::encode_wide_prefixed("Bob");
        data.extend_from_slice(&[2, 0, 0, 0, 1, 0, 0, 0]);
        data.extend_from_slice(&6u32.to_le_bytes());
        data.extend_from_slice(b"allies");
        data.extend_from_slice(&[0u8; 8]);

        let mut replay = Replay::default();
        let mut parser = CoreParser::new(&data[..]);
        player_info(&mut parser, &mut replay).unwrap();
        assert_eq!(parser.remaining(), 0);
        assert_eq!(
            replay.players,
            vec![Player {
                name: Some(String::from("Bob")),
                faction: Some(String::from("allies")),
                team: 1,
                slot: SlotKind::RemoteHuman,
            }]
        );
    }

    #[test]
    fn player_info_unknown_slot() {
        let mut data = crate::parsing_utils::encode_wide_prefixed("Bob");
        data.extend_from_slice(&[3, 0, 0, 0, 1, 0, 0, 0]);

        let mut replay = Replay::default();
        let mut parser = CoreParser::new(&data[..]);
        let err = player_info(&mut parser, &mut replay).unwrap_err();
        assert_eq!(err, LeafError::UnknownSlotKind(3));
        assert!(replay.players.is_empty());
    }

    #[test]
    fn parse_empty() {
        assert!(ParserBuilder::new(&[]).parse().is_err());
    }

    #[test]
    fn leaf_decoders_are_keyed_by_tag() {
        assert_eq!(
            LEAF_DECODERS.get(ChunkTag::PLAYER_INFO.as_str()),
            Some(&LeafKind::PlayerInfo)
        );
        assert_eq!(
            LEAF_DECODERS.get(ChunkTag::MATCH_SETTINGS.as_str()),
            Some(&LeafKind::MatchSettings)
        );
        assert_eq!(
            LEAF_DECODERS.get(ChunkTag::MAP_DESCRIPTOR.as_str()),
            Some(&LeafKind::MapDescriptor)
        );
        assert_eq!(LEAF_DECODERS.get("DATADATA"), None);
    }
}
