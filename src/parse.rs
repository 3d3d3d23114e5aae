//! Cursor-based field readers shared by every protocol handler.
//!
//! None of these know anything about a particular protocol; they only
//! guarantee that a read never goes past the end of the buffer.
use std::io::Cursor;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::error::QueryError;

/// Byte order of a fixed-width integer on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

/// Bytes left between the cursor position and the end of the buffer.
pub fn remaining<'a>(cursor: &Cursor<&'a [u8]>) -> &'a [u8] {
    let data: &'a [u8] = *cursor.get_ref();
    let pos = usize::try_from(cursor.position()).unwrap_or(usize::MAX);
    data.get(pos..).unwrap_or(&[])
}

/// Get the value of a null-terminated string at the cursor.
///
/// Advances the cursor past the null-termination byte. Scanning stops at the
/// end of the buffer, so a missing terminator is an error rather than a hang.
pub fn get_string(cursor: &mut Cursor<&[u8]>) -> Result<String, QueryError> {
    let rest = remaining(cursor);
    let len = rest.iter().position(|&c| c == 0).ok_or_else(|| {
        QueryError::Protocol(format!("unterminated string at offset {}", cursor.position()))
    })?;

    let value = std::str::from_utf8(&rest[..len])?.to_owned();
    cursor.set_position(cursor.position() + len as u64 + 1);
    Ok(value)
}

/// Get an unsigned integer `width` bytes wide (1 to 8) at the cursor.
///
/// Advances the cursor past the bytes.
pub fn get_uint(
    cursor: &mut Cursor<&[u8]>,
    width: usize,
    endian: Endian,
) -> Result<u64, QueryError> {
    if !(1..=8).contains(&width) {
        return Err(QueryError::Protocol(format!("unsupported integer width {width}")));
    }
    if remaining(cursor).len() < width {
        return Err(QueryError::Protocol(format!(
            "expected {width} bytes at offset {}, found {}",
            cursor.position(),
            remaining(cursor).len()
        )));
    }

    let value = match endian {
        Endian::Big => cursor.read_uint::<BigEndian>(width)?,
        Endian::Little => cursor.read_uint::<LittleEndian>(width)?,
    };
    Ok(value)
}

/// Get the [u8] at the cursor.
pub fn get_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, QueryError> {
    Ok(get_uint(cursor, 1, Endian::Little)? as u8)
}

/// Get 2 little-endian bytes (as a [u16]) at the cursor.
pub fn get_u16(cursor: &mut Cursor<&[u8]>) -> Result<u16, QueryError> {
    Ok(get_uint(cursor, 2, Endian::Little)? as u16)
}

/// Get 8 little-endian bytes (as a [u64]) at the cursor.
pub fn get_u64(cursor: &mut Cursor<&[u8]>) -> Result<u64, QueryError> {
    get_uint(cursor, 8, Endian::Little)
}

/// Parse an ASCII decimal string such as `b"-12345"` into an [i32].
///
/// Surrounding whitespace and trailing null bytes are ignored, since servers
/// usually null-terminate the value.
pub fn decimal_to_i32(bytes: &[u8]) -> Result<i32, QueryError> {
    let text = std::str::from_utf8(bytes)?;
    let text = text.trim_end_matches('\0').trim();
    text.parse::<i32>()
        .map_err(|e| QueryError::Protocol(format!("invalid decimal value {text:?}: {e}")))
}
