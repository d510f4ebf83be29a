//! Line-oriented wire transport shared by both listeners.
//!
//! One command in, one reply out, regardless of whether the handles are
//! a pipe pair or a socket. Reads are byte-at-a-time; the control plane
//! serves humans and test scripts, not bulk traffic.

use std::io::{self, Read, Write};

/// Longest accepted command line, in bytes, excluding the newline.
///
/// A longer line is truncated to this bound rather than rejected; the
/// remainder is read as the start of the next line. This mirrors the
/// historical wire behaviour and existing clients rely on it.
pub const MAX_LINE: usize = 512;

/// Reads one newline-terminated line from `reader`.
///
/// Returns `Ok(None)` on clean end-of-stream with no bytes read (the
/// peer closed), and `Ok(Some(line))` otherwise, with the trailing
/// newline stripped. End-of-stream mid-line yields the partial line.
/// Interrupted reads are retried.
pub fn read_line<R: Read>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    let mut byte = [0_u8; 1];
    loop {
        if read_byte_with_retry(reader, &mut byte)? == 0 {
            if line.is_empty() {
                return Ok(None);
            }
            return Ok(Some(line));
        }
        if byte[0] == b'\n' {
            return Ok(Some(line));
        }
        line.push(byte[0]);
        if line.len() >= MAX_LINE {
            return Ok(Some(line));
        }
    }
}

/// Writes the decimal rendering of `code` as the single reply.
///
/// No trailing newline is written; peers read whatever bytes arrive as
/// one reply. Returns the number of bytes written.
pub fn write_reply<W: Write>(writer: &mut W, code: i32) -> io::Result<usize> {
    let reply = code.to_string();
    writer.write_all(reply.as_bytes())?;
    writer.flush()?;
    Ok(reply.len())
}

fn read_byte_with_retry<R: Read>(reader: &mut R, byte: &mut [u8; 1]) -> io::Result<usize> {
    loop {
        match reader.read(byte) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}
