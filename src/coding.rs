// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Integer and Byte-String Coding
//!
//! All on-disk integers in this crate are little-endian. This is a
//! bit-compatibility contract with the file formats; big-endian hosts must
//! go through these helpers rather than reinterpreting memory.
//!
//! Varints encode unsigned integers seven bits at a time, low-order group
//! first, with the high bit of each byte set iff more bytes follow:
//!
//! - 32-bit varints occupy 1-5 bytes
//! - 64-bit varints occupy 1-10 bytes
//!
//! Decoders consume from the front of a `&mut &[u8]` and fail when input
//! is truncated or a continuation bit is set past the last legal byte.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::{Error, Result};

/// Append a fixed-width 32-bit little-endian integer.
pub fn put_fixed32(dst: &mut Vec<u8>, value: u32) {
    dst.write_u32::<LittleEndian>(value).unwrap();
}

/// Append a fixed-width 64-bit little-endian integer.
pub fn put_fixed64(dst: &mut Vec<u8>, value: u64) {
    dst.write_u64::<LittleEndian>(value).unwrap();
}

/// Decode a fixed-width 32-bit little-endian integer from the start of `src`.
///
/// Callers must have bounds-checked `src.len() >= 4`.
pub fn decode_fixed32(src: &[u8]) -> u32 {
    LittleEndian::read_u32(src)
}

/// Decode a fixed-width 64-bit little-endian integer from the start of `src`.
pub fn decode_fixed64(src: &[u8]) -> u64 {
    LittleEndian::read_u64(src)
}

/// Append a varint-encoded 32-bit integer.
pub fn put_varint32(dst: &mut Vec<u8>, value: u32) {
    put_varint64(dst, value as u64);
}

/// Append a varint-encoded 64-bit integer.
pub fn put_varint64(dst: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        dst.push((value as u8) | 0x80);
        value >>= 7;
    }
    dst.push(value as u8);
}

/// Number of bytes `put_varint64` would append for `value`.
pub fn varint_length(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Decode a varint-encoded 32-bit integer from the front of `input`,
/// advancing it past the consumed bytes.
pub fn get_varint32(input: &mut &[u8]) -> Result<u32> {
    let mut result: u32 = 0;
    for (i, &byte) in input.iter().enumerate() {
        if byte & 0x80 != 0 {
            // A continuation bit on the fifth byte is past the last legal
            // position for 32 bits.
            if i >= 4 {
                return Err(Error::corruption("bad varint32"));
            }
            result |= ((byte & 0x7f) as u32) << (i * 7);
        } else {
            // The fifth byte carries only the top 4 bits of a u32.
            if i == 4 && byte > 0x0f {
                return Err(Error::corruption("varint32 overflow"));
            }
            result |= (byte as u32) << (i * 7);
            *input = &input[i + 1..];
            return Ok(result);
        }
    }
    Err(Error::corruption("bad varint32"))
}

/// Decode a varint-encoded 64-bit integer from the front of `input`,
/// advancing it past the consumed bytes.
pub fn get_varint64(input: &mut &[u8]) -> Result<u64> {
    let mut result: u64 = 0;
    for (i, &byte) in input.iter().enumerate() {
        if byte & 0x80 != 0 {
            // A continuation bit on the tenth byte is past the last legal
            // position for 64 bits.
            if i >= 9 {
                return Err(Error::corruption("bad varint64"));
            }
            result |= ((byte & 0x7f) as u64) << (i * 7);
        } else {
            // The tenth byte carries only the top bit of a u64.
            if i == 9 && byte > 0x01 {
                return Err(Error::corruption("varint64 overflow"));
            }
            result |= (byte as u64) << (i * 7);
            *input = &input[i + 1..];
            return Ok(result);
        }
    }
    Err(Error::corruption("bad varint64"))
}

/// Append a varint32 length prefix followed by the raw bytes.
pub fn put_length_prefixed_slice(dst: &mut Vec<u8>, value: &[u8]) {
    put_varint32(dst, value.len() as u32);
    dst.extend_from_slice(value);
}

/// Decode a length-prefixed byte string from the front of `input`,
/// advancing it past the prefix and the payload.
pub fn get_length_prefixed_slice<'a>(input: &mut &'a [u8]) -> Result<&'a [u8]> {
    let len = get_varint32(input)? as usize;
    if input.len() < len {
        return Err(Error::corruption("bad length-prefixed slice"));
    }
    let (head, tail) = input.split_at(len);
    *input = tail;
    Ok(head)
}
