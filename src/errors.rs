use thiserror::Error;

/// Low level failures of the byte cursor. These never leave the cursor in a partially advanced
/// state.
#[derive(PartialEq, Eq, Debug, Clone, Error)]
pub enum CursorError {
    #[error("Insufficient data. Expected {0} bytes, but only {1} left")]
    InsufficientData(usize, usize),

    #[error("Seek to {0} is outside of the data (length {1})")]
    OutOfRange(i64, usize),

    #[error("Text of {0} characters is too large for the remaining {1} bytes")]
    TextTooLarge(u32, usize),
}

/// Failures decoding the payload of a leaf chunk. These are recoverable: the parser logs them and
/// skips to the next chunk unless asked to be strict.
#[derive(PartialEq, Eq, Debug, Clone, Error)]
pub enum LeafError {
    #[error(transparent)]
    Cursor(#[from] CursorError),

    #[error("Unknown slot kind: {0}")]
    UnknownSlotKind(u8),

    #[error("Victory point exponent of {0} overflows")]
    VictoryPointsOverflow(u32),
}

/// Structural failures. Any of these means the container layout could not be trusted and the
/// whole parse is abandoned.
#[derive(PartialEq, Eq, Debug, Clone, Error)]
pub enum ParseError {
    #[error("Could not decode replay {0} at offset ({1}): {2}")]
    ParseError(&'static str, usize, Box<ParseError>),

    #[error(transparent)]
    Cursor(#[from] CursorError),

    #[error("Expected signature {0:?} but found {1:?}")]
    BadSignature(&'static str, String),

    #[error("Chunk tag {0:?} is not ascii")]
    BadTag(Vec<u8>),

    #[error("Chunk {tag} at offset ({offset}) declares {len} bytes but only {available} are left")]
    ChunkTooLarge {
        tag: String,
        offset: usize,
        len: u32,
        available: usize,
    },

    #[error("Chunk {tag} at offset ({offset}) overruns its container, which ends at {end}")]
    ChildOverrun {
        tag: String,
        offset: usize,
        end: usize,
    },

    #[error("Container {tag} at offset ({offset}) declares {declared} bytes, children span {actual}")]
    BodyMismatch {
        tag: String,
        offset: usize,
        declared: u32,
        actual: usize,
    },

    #[error("Chunks are nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("Leaf {tag} v{version} at offset ({offset}) failed to decode: {source}")]
    Leaf {
        tag: String,
        version: u32,
        offset: usize,
        source: LeafError,
    },
}

/// Failures of the name redaction engine. None of these are recoverable as the buffer may be
/// partially rewritten when they occur.
#[derive(PartialEq, Eq, Debug, Clone, Error)]
pub enum RedactError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Unexpected layout at offset ({offset}): {reason}")]
    StructuralAssumption { offset: usize, reason: String },
}
