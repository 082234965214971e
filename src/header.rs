use crate::core_parser::CoreParser;
use crate::errors::{CursorError, ParseError};
use std::io::SeekFrom;

pub const FILE_SIGNATURE: &str = "COH__REC";
pub const CHUNKY_MAGIC: &str = "Relic Chunky";

/// The chunky streams start at a fixed offset, the header is padded up to it
pub const FIRST_CHUNKY_OFFSET: usize = 76;

/// Size of the fields of a chunky stream header that are decoded
const CHUNKY_HEADER_MIN: u32 = 28;

/// Intermediate parsing structure for the file header
#[derive(Debug, PartialEq)]
pub struct FileHeader {
    pub file_version: u32,
    pub local_date_string: Option<String>,
}

pub fn parse_file_header(rlp: &mut CoreParser) -> Result<FileHeader, ParseError> {
    let file_version = rlp
        .read_u32()
        .map_err(|e| section("file version", rlp, e.into()))?;

    let signature = rlp
        .take_data(FILE_SIGNATURE.len())
        .map_err(|e| section("signature", rlp, e.into()))?;
    if signature != FILE_SIGNATURE.as_bytes() {
        return Err(ParseError::BadSignature(
            FILE_SIGNATURE,
            String::from_utf8_lossy(signature).into_owned(),
        ));
    }

    let local_date_string = rlp
        .read_wide_nul()
        .map_err(|e| section("local date", rlp, e.into()))?;

    rlp.seek(SeekFrom::Start(FIRST_CHUNKY_OFFSET as u64))
        .map_err(|e| section("header padding", rlp, e.into()))?;

    Ok(FileHeader {
        file_version,
        local_date_string,
    })
}

/// The preamble of a stream of top level chunks
#[derive(Debug, PartialEq)]
pub struct ChunkyHeader {
    pub offset: usize,
    pub version: u32,
    pub header_len: u32,
}

/// Parses the stream header and leaves the cursor on the first chunk of the stream
pub fn parse_chunky_header(rlp: &mut CoreParser) -> Result<ChunkyHeader, ParseError> {
    let offset = rlp.position();
    let magic = rlp
        .take_data(CHUNKY_MAGIC.len())
        .map_err(|e| section("chunky magic", rlp, e.into()))?;
    if magic != CHUNKY_MAGIC.as_bytes() {
        return Err(ParseError::BadSignature(
            CHUNKY_MAGIC,
            String::from_utf8_lossy(magic).into_owned(),
        ));
    }

    // "\r\n\x1a\0" signature and an unknown field bracket the version
    rlp.skip(4)
        .map_err(|e| section("chunky signature", rlp, e.into()))?;
    let version = rlp
        .read_u32()
        .map_err(|e| section("chunky version", rlp, e.into()))?;
    rlp.skip(4)
        .map_err(|e| section("chunky unknown", rlp, e.into()))?;
    let header_len = rlp
        .read_u32()
        .map_err(|e| section("chunky header length", rlp, e.into()))?;

    if header_len < CHUNKY_HEADER_MIN {
        let err = CursorError::OutOfRange(offset as i64 + i64::from(header_len), rlp.len());
        return Err(section("chunky header length", rlp, err.into()));
    }

    rlp.seek(SeekFrom::Start((offset + header_len as usize) as u64))
        .map_err(|e| section("chunky header length", rlp, e.into()))?;

    Ok(ChunkyHeader {
        offset,
        version,
        header_len,
    })
}

pub(crate) fn section(name: &'static str, rlp: &CoreParser, e: ParseError) -> ParseError {
    ParseError::ParseError(name, rlp.bytes_read(), Box::new(e))
}
