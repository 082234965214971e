//! # Redaction
//!
//! Replaces the name of every player with `Player N`, where N counts up from 1 in the order the
//! player info chunks appear in the file.
//!
//! A name is a utf-16 string prefixed by its character count, so a new name of a different length
//! changes the size of the chunk holding it. Every container above that chunk declares a body
//! length that includes those bytes, and all of them are patched by the same delta. The chunks
//! are rescanned after each rename, so each pass works off of real offsets.
//!
//! Names also show up in chat messages, which live outside of the player chunks. A chat record
//! looks like:
//!
//! ```plain
//! u32 record length
//! u32 1
//! u32 message length
//! u32 name character count
//! ... name, utf-16
//! u32 user id
//! u32 0
//! u32 1
//! u32 text character count
//! ... text, utf-16
//! ```
//!
//! Both lengths preceding the name account for the name's bytes. Should a chat record reside in a
//! chunk, that chunk and its ancestors are patched too.
//!
//! Any other occurrence of the name, such as a mention in the text of a chat message, is masked
//! in place with a run of `*` of the same length so no length needs to change. After the last
//! pass the buffer is searched once more and a surviving name fails the redaction.
//!
//! Before anything is written, every length field that will be touched is checked to be able to
//! absorb the change. A replay that doesn't look as described fails with
//! [`RedactError::StructuralAssumption`] rather than being silently corrupted, though it may
//! have been partially rewritten by earlier passes.

use crate::chunk::{ChunkId, ChunkTag, ChunkTree};
use crate::errors::RedactError;
use crate::parser::scan_chunks;
use crate::parsing_utils::{decode_utf16, encode_wide, encode_wide_prefixed, find_bytes, le_u32};
use fnv::FnvHashSet;
use serde::Serialize;

/// Offset of a chat record's message length from the start of the name text
const CHAT_MESSAGE_LEN: usize = 8;

/// Offset of a chat record's total length from the start of the name text
const CHAT_RECORD_LEN: usize = 16;

/// A player that was renamed
#[derive(Serialize, PartialEq, Eq, Debug, Clone)]
pub struct Renaming {
    pub original: String,
    pub replacement: String,

    /// Number of chat records that carried the name
    pub chat_messages: usize,
}

/// Replaces the name of every player in the replay, returning what was renamed. The data is left
/// with consistent lengths throughout.
///
/// Running this on its own output renames the players again: `Player 1` becomes `Player 1`.
pub fn anonymize(data: &mut Vec<u8>) -> Result<Vec<Renaming>, RedactError> {
    let mut renamings = Vec::new();

    loop {
        let tree = scan_chunks(data)?;
        tree.validate()?;

        let pass = renamings.len();
        let id = match tree.with_tag(ChunkTag::PLAYER_INFO).nth(pass) {
            Some((id, _)) => id,
            None => break,
        };

        let replacement = format!("Player {}", pass + 1);
        let original = rename_player(data, &tree, id, &replacement)?;

        let written: Vec<Vec<u8>> = renamings
            .iter()
            .map(|r: &Renaming| r.replacement.as_str())
            .chain(std::iter::once(replacement.as_str()))
            .map(encode_wide)
            .collect();
        let chat_messages = rename_chat(data, &original, &replacement, &written)?;

        tracing::info!(%original, %replacement, chat_messages, "renamed player");
        renamings.push(Renaming {
            original,
            replacement,
            chat_messages,
        });
    }

    scan_chunks(data)?.validate()?;

    if let Some((offset, name)) = leftover_name(data, &renamings) {
        return Err(structural(offset, format!("name {:?} remains after redaction", name)));
    }

    Ok(renamings)
}

fn structural(offset: usize, reason: String) -> RedactError {
    RedactError::StructuralAssumption { offset, reason }
}

/// Rewrites the name at the start of a player chunk, returning the original name
fn rename_player(
    data: &mut Vec<u8>,
    tree: &ChunkTree,
    id: ChunkId,
    replacement: &str,
) -> Result<String, RedactError> {
    let node = tree.get(id);
    let prefix_at = node.body_offset;
    let body = &data[node.body_offset..node.end()];

    if body.len() < 4 {
        return Err(structural(prefix_at, String::from("player chunk too small for a name")));
    }

    let chars = le_u32(body) as usize;
    let name_end = chars
        .checked_mul(2)
        .and_then(|x| x.checked_add(4))
        .filter(|&x| x <= body.len())
        .ok_or_else(|| {
            structural(
                prefix_at,
                format!("name of {} characters overruns its chunk of {} bytes", chars, body.len()),
            )
        })?;

    let original = decode_utf16(&body[4..name_end])
        .ok_or_else(|| structural(prefix_at, String::from("player name is not valid utf-16")))?;

    let encoded = encode_wide_prefixed(replacement);
    let delta = name_end as i64 - encoded.len() as i64;

    let mut fields = vec![node.len_field_offset()];
    fields.extend(tree.ancestors(id).map(|(_, n)| n.len_field_offset()));
    let lengths = plan_lengths(data, &fields, delta)?;

    data.splice(prefix_at..prefix_at + name_end, encoded);
    write_lengths(data, &lengths);
    Ok(original)
}

/// Rewrites every chat record that carries the name and masks any other occurrence of it. Returns
/// the number of records rewritten. Occurrences that are part of a name in `written` are left alone.
fn rename_chat(
    data: &mut Vec<u8>,
    original: &str,
    replacement: &str,
    written: &[Vec<u8>],
) -> Result<usize, RedactError> {
    let needle = encode_wide(original);
    let encoded = encode_wide_prefixed(replacement);
    let mask = mask_wide(original);
    let delta = (needle.len() + 4) as i64 - encoded.len() as i64;
    let chars = needle.len() / 2;

    let mut from = 0;
    let mut count = 0;
    while let Some(at) = find_bytes(data, &needle, from) {
        let tree = scan_chunks(data)?;

        // Other players may share the name, they are renamed on their own pass
        let player_names: FnvHashSet<usize> = tree
            .with_tag(ChunkTag::PLAYER_INFO)
            .map(|(_, n)| n.body_offset + 4)
            .collect();

        if player_names.contains(&at) {
            from = at + needle.len();
            continue;
        }

        if at < CHAT_RECORD_LEN || le_u32(&data[at - 4..]) as usize != chars {
            if !written.iter().any(|w| covers(data.as_slice(), at, &needle, w)) {
                tracing::debug!(offset = at, "masking name outside of a chat record");
                data[at..at + needle.len()].copy_from_slice(&mask);
            }
            from = at + needle.len();
            continue;
        }

        let record_start = at - CHAT_RECORD_LEN;
        let record_end = at + needle.len();
        let message_len = le_u32(&data[at - CHAT_MESSAGE_LEN..]) as usize;
        let record_len = le_u32(&data[record_start..]) as usize;
        if message_len < needle.len() + 4 || record_len < message_len {
            return Err(structural(
                record_start,
                format!(
                    "chat record of {} bytes and message of {} bytes can't hold a {} byte name",
                    record_len,
                    message_len,
                    needle.len() + 4
                ),
            ));
        }

        let mut fields = vec![record_start, at - CHAT_MESSAGE_LEN];
        if let Some(id) = enclosing_leaf(&tree, record_start, record_end)? {
            fields.push(tree.get(id).len_field_offset());
            fields.extend(tree.ancestors(id).map(|(_, n)| n.len_field_offset()));
        }

        let lengths = plan_lengths(data, &fields, delta)?;
        data.splice(at - 4..record_end, encoded.iter().copied());
        write_lengths(data, &lengths);

        // The text of the message may mention the name as well
        let text_start = at - 4 + encoded.len();
        let message_end = (at - 4 + lengths[1].1 as usize).min(data.len());
        let mut pos = text_start;
        while let Some(x) = find_bytes(&data[..message_end], &needle, pos) {
            data[x..x + needle.len()].copy_from_slice(&mask);
            pos = x + needle.len();
        }

        tracing::debug!(offset = record_start, "renamed chat record");
        from = message_end.max(text_start);
        count += 1;
    }

    Ok(count)
}

/// Same length stand in for a name, differing from it in every code unit
fn mask_wide(name: &str) -> Vec<u8> {
    name.encode_utf16()
        .map(|c| if c == u16::from(b'*') { u16::from(b'#') } else { u16::from(b'*') })
        .flat_map(|c| c.to_le_bytes())
        .collect()
}

/// Whether the `needle` found at `at` lies within a copy of the `name`
fn covers(data: &[u8], at: usize, needle: &[u8], name: &[u8]) -> bool {
    (0..name.len())
        .step_by(2)
        .filter(|&k| name[k..].starts_with(needle))
        .any(|k| at >= k && data[at - k..].starts_with(name))
}

/// The first occurrence of an original name that isn't part of a replacement
fn leftover_name<'a>(data: &[u8], renamings: &'a [Renaming]) -> Option<(usize, &'a str)> {
    let written: Vec<Vec<u8>> = renamings
        .iter()
        .map(|r| encode_wide(&r.replacement))
        .collect();

    for renaming in renamings {
        let needle = encode_wide(&renaming.original);
        let mut from = 0;
        while let Some(at) = find_bytes(data, &needle, from) {
            if !written.iter().any(|w| covers(data, at, &needle, w)) {
                return Some((at, renaming.original.as_str()));
            }
            from = at + 1;
        }
    }

    None
}

/// The deepest chunk holding the byte range in its body, or `None` if the range is outside of
/// every chunk. Fails when the range crosses a chunk boundary.
fn enclosing_leaf(
    tree: &ChunkTree,
    start: usize,
    end: usize,
) -> Result<Option<ChunkId>, RedactError> {
    let mut found = None;
    for (id, node) in tree.iter() {
        if node.header_offset >= end || start >= node.end() {
            continue;
        }

        if start < node.body_offset || end > node.end() {
            return Err(structural(
                start,
                format!("chat record crosses the boundary of chunk {}", node.tag),
            ));
        }

        // Chunks are in byte order, so a later match is a descendant of an earlier one
        found = Some(id);
    }

    match found {
        Some(id) if tree.get(id).is_container() => Err(structural(
            start,
            format!("chat record sits between the children of {}", tree.get(id).tag),
        )),
        x => Ok(x),
    }
}

/// Computes the new value of each length field, failing before anything is written should any of
/// them not be able to absorb the delta
fn plan_lengths(data: &[u8], fields: &[usize], delta: i64) -> Result<Vec<(usize, u32)>, RedactError> {
    fields
        .iter()
        .map(|&at| {
            let old = le_u32(&data[at..]);
            u32::try_from(i64::from(old) - delta)
                .map(|new| (at, new))
                .map_err(|_| structural(at, format!("length of {} can't shrink by {}", old, delta)))
        })
        .collect()
}

fn write_lengths(data: &mut [u8], lengths: &[(usize, u32)]) {
    for &(at, len) in lengths {
        data[at..at + 4].copy_from_slice(&len.to_le_bytes());
    }
}
