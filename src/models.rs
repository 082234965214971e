/// # Models
///
/// Here lies the data structures that a replay is decoded into. Only serialization is
/// implemented: the JSON output is a report, it isn't meant to be read back.
use crate::chunk::ChunkTree;
use crate::errors::LeafError;
use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fmt;

/// The structure that a replay is parsed into. Fields are `None` when the chunk holding them is
/// absent or failed to decode.
#[derive(Serialize, PartialEq, Debug, Clone, Default)]
pub struct Replay {
    pub file_version: u32,
    pub chunky_version: u32,

    /// The timestamp as written by the recording machine, in its locale
    pub local_date_string: Option<String>,
    pub local_date: Option<NaiveDateTime>,

    /// A second timestamp found in the map descriptor. Its meaning is unknown.
    pub unknown_date: Option<String>,

    pub random_start: Option<bool>,
    pub high_resources: Option<bool>,
    pub vp_count: Option<u32>,
    pub vp_game: Option<bool>,
    pub match_type: Option<String>,
    pub replay_name: Option<String>,
    pub game_version: Option<String>,
    pub mod_name: Option<String>,
    pub map_name: Option<String>,
    pub map_file_name: Option<String>,
    pub map_description: Option<String>,
    pub map_width: Option<u32>,
    pub map_height: Option<u32>,

    /// Players in the order their chunks appear in the replay
    pub players: Vec<Player>,

    /// Leaf chunks that could not be fully decoded. An empty list means the replay decoded
    /// cleanly.
    pub issues: Vec<LeafIssue>,

    #[serde(skip)]
    pub chunks: ChunkTree,
}

impl Replay {
    /// True when every known leaf chunk decoded without issue
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }
}

/// A seat in the match as described by a player info chunk
#[derive(Serialize, PartialEq, Eq, Debug, Clone)]
pub struct Player {
    pub name: Option<String>,
    pub faction: Option<String>,
    pub team: u8,
    pub slot: SlotKind,
}

/// Who occupies a seat
#[derive(Serialize, PartialEq, Eq, Debug, Clone, Copy)]
pub enum SlotKind {
    Human,
    Ai,
    RemoteHuman,
    Empty,
}

impl SlotKind {
    pub fn from_byte(b: u8) -> Result<SlotKind, LeafError> {
        match b {
            0 => Ok(SlotKind::Human),
            1 => Ok(SlotKind::Ai),
            2 => Ok(SlotKind::RemoteHuman),
            5 => Ok(SlotKind::Empty),
            x => Err(LeafError::UnknownSlotKind(x)),
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            SlotKind::Human => "human",
            SlotKind::Ai => "ai",
            SlotKind::RemoteHuman => "remote human",
            SlotKind::Empty => "empty",
        };
        f.write_str(s)
    }
}

/// A leaf chunk that failed to decode. The replay is still usable, but may be missing the fields
/// the chunk would have provided.
#[derive(Serialize, PartialEq, Eq, Debug, Clone)]
pub struct LeafIssue {
    pub tag: String,
    pub version: u32,
    pub offset: usize,
    #[serde(serialize_with = "display_it")]
    pub error: LeafError,
}

/// For the times when the `Display` string is more appropriate than the default serialization
/// strategy
fn display_it<T, S>(data: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: fmt::Display,
    S: Serializer,
{
    serializer.collect_str(data)
}
