//! # chunkyrec
//!
//! chunkyrec is a parser for Company of Heroes replays (`.rec`), which are written in Relic's
//! chunky container format. Besides extracting the match settings, map, and players, chunkyrec can
//! anonymize a replay by renaming every player to `Player N` while keeping each length that
//! accounts for the renamed bytes consistent.
//!
//! ```no_run
//! use std::fs;
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let data = fs::read("match.rec")?;
//! let replay = chunkyrec::ParserBuilder::new(&data).parse()?;
//! for player in &replay.players {
//!     println!("{:?} ({}) team {}", player.name, player.slot, player.team);
//! }
//!
//! let mut data = data;
//! for renaming in chunkyrec::anonymize(&mut data)? {
//!     println!("{} -> {}", renaming.original, renaming.replacement);
//! }
//! fs::write("anonymous.rec", &data)?;
//! # Ok(())
//! # }
//! ```

pub use self::chunk::{ChunkId, ChunkNode, ChunkTag, ChunkTree};
pub use self::date::decode_date;
pub use self::errors::*;
pub use self::models::*;
pub use self::parser::{victory_points, LeafPolicy, ParserBuilder};
pub use self::redact::{anonymize, Renaming};

pub mod chunk;
pub mod core_parser;
mod date;
mod errors;
pub mod header;
mod models;
mod parser;
mod parsing_utils;
mod redact;
