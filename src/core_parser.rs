use crate::errors::CursorError;
use crate::parsing_utils::{decode_ascii, decode_utf16, le_u16, le_u32};
use std::io::SeekFrom;

/// Sequential, bounds checked reader over a replay. A failed read never moves the cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreParser<'a> {
    data: &'a [u8],

    /// Current position within `data`
    pos: usize,

    /// Where `data` starts in regards to the whole view of the replay
    base: usize,
}

impl<'a> CoreParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        CoreParser {
            data,
            pos: 0,
            base: 0,
        }
    }

    /// Position relative to the start of this cursor's view
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Position in regards to the whole replay, used when reporting errors and recording chunk
    /// offsets from a scoped cursor
    pub fn bytes_read(&self) -> usize {
        self.base + self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns a slice of the replay after ensuring there is enough space for the requested slice
    pub fn view_data(&self, size: usize) -> Result<&'a [u8], CursorError> {
        if size > self.remaining() {
            Err(CursorError::InsufficientData(size, self.remaining()))
        } else {
            Ok(&self.data[self.pos..self.pos + size])
        }
    }

    pub fn take_data(&mut self, size: usize) -> Result<&'a [u8], CursorError> {
        let res = self.view_data(size)?;
        self.pos += size;
        Ok(res)
    }

    /// Take the next `size` of bytes and interpret them in an infallible fashion
    #[inline]
    pub fn take<F, T>(&mut self, size: usize, mut f: F) -> Result<T, CursorError>
    where
        F: FnMut(&'a [u8]) -> T,
    {
        self.take_data(size).map(|d| f(d))
    }

    pub fn skip(&mut self, size: usize) -> Result<(), CursorError> {
        self.take(size, |_| ())
    }

    /// Skips `count` 32 bit fields whose meaning is unknown
    pub fn skip_u32s(&mut self, count: usize) -> Result<(), CursorError> {
        self.skip(count * 4)
    }

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        self.take(1, |d| d[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CursorError> {
        self.take(2, le_u16)
    }

    pub fn read_u32(&mut self) -> Result<u32, CursorError> {
        self.take(4, le_u32)
    }

    /// Reads `size` bytes as ascii. Content that isn't ascii is consumed but reported as absent.
    pub fn read_ascii(&mut self, size: usize) -> Result<Option<String>, CursorError> {
        self.take(size, decode_ascii)
    }

    /// Reads `chars` utf-16le code units. Content that isn't valid utf-16 is consumed but
    /// reported as absent.
    pub fn read_wide(&mut self, chars: usize) -> Result<Option<String>, CursorError> {
        let size = chars
            .checked_mul(2)
            .ok_or(CursorError::InsufficientData(usize::MAX, self.remaining()))?;
        self.take(size, decode_utf16)
    }

    /// A 4 byte character count followed by that many units of `width` bytes. The count is
    /// checked against the remaining data before anything is consumed, so an oversized count
    /// leaves the cursor where it was.
    pub fn take_prefixed(&mut self, width: usize) -> Result<&'a [u8], CursorError> {
        let chars = self.view_data(4).map(le_u32)?;
        match (chars as usize).checked_mul(width) {
            Some(size) if size <= self.remaining() - 4 => {
                self.pos += 4;
                self.take_data(size)
            }
            _ => Err(CursorError::TextTooLarge(chars, self.remaining() - 4)),
        }
    }

    /// A 4 byte character count followed by that many ascii bytes
    pub fn read_ascii_prefixed(&mut self) -> Result<Option<String>, CursorError> {
        self.take_prefixed(1).map(decode_ascii)
    }

    /// A 4 byte character count followed by that many utf-16le code units
    pub fn read_wide_prefixed(&mut self) -> Result<Option<String>, CursorError> {
        self.take_prefixed(2).map(decode_utf16)
    }

    /// Reads ascii until a zero byte, which is consumed but not returned
    pub fn read_ascii_nul(&mut self) -> Result<Option<String>, CursorError> {
        let size = self.nul_terminated(1)?;
        let res = self.read_ascii(size)?;
        self.pos += 1;
        Ok(res)
    }

    /// Reads utf-16le until a zero code unit, which is consumed but not returned
    pub fn read_wide_nul(&mut self) -> Result<Option<String>, CursorError> {
        let size = self.nul_terminated(2)?;
        let res = self.take(size, decode_utf16)?;
        self.pos += 2;
        Ok(res)
    }

    /// Byte length of the content preceding the first all zero unit of `width` bytes
    fn nul_terminated(&self, width: usize) -> Result<usize, CursorError> {
        let rest = &self.data[self.pos..];
        rest.chunks_exact(width)
            .position(|unit| unit.iter().all(|&b| b == 0))
            .map(|units| units * width)
            .ok_or(CursorError::InsufficientData(rest.len() + 1, rest.len()))
    }

    /// Moves the cursor. The resulting position must lie within `[0, len]`; an `End` offset is
    /// added to the length, so `SeekFrom::End(-4)` addresses the last four bytes.
    pub fn seek(&mut self, to: SeekFrom) -> Result<usize, CursorError> {
        let target = match to {
            SeekFrom::Start(x) => i64::try_from(x).unwrap_or(i64::MAX),
            SeekFrom::Current(x) => (self.pos as i64).saturating_add(x),
            SeekFrom::End(x) => (self.data.len() as i64).saturating_add(x),
        };

        if target < 0 || target > self.data.len() as i64 {
            Err(CursorError::OutOfRange(target, self.data.len()))
        } else {
            self.pos = target as usize;
            Ok(self.pos)
        }
    }

    /// Splits off the next `size` bytes as their own cursor and advances past them. Reads on the
    /// returned cursor can't stray outside of those bytes.
    pub fn scope(&mut self, size: usize) -> Result<CoreParser<'a>, CursorError> {
        let base = self.bytes_read();
        let data = self.take_data(size)?;
        Ok(CoreParser { data, pos: 0, base })
    }
}
