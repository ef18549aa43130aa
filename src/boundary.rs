//! Boundary marker and streaming pattern search
//!
//! A container is delimited by three copies of [`boundary()`]: before the TOC,
//! between the TOC and the attachment data, and after the last attachment.
//! The marker is a short, non-printable part repeated several times so that
//! it is practically absent from ordinary executables and text.
//!
//! ```text
//! part:     '#' 0x0F 0x01 0x0C 0x01 '#'
//! boundary: part × 4  (24 bytes)
//! ```

use std::io::{self, BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::sync::OnceLock;

/// Single repetition of the boundary pattern
pub const BOUNDARY_PART: [u8; 6] = [b'#', 15, 1, 12, 1, b'#'];

/// How often [`BOUNDARY_PART`] is repeated
pub const BOUNDARY_PART_COUNT: usize = 4;

/// Length of the complete boundary in bytes
pub const BOUNDARY_SIZE: usize = BOUNDARY_PART.len() * BOUNDARY_PART_COUNT;

/// Read buffer used while scanning for a pattern
const SEARCH_BUFFER_SIZE: usize = 64 * 1024;

/// The complete boundary marker
///
/// Assembled once on first use. It is never stored as a literal: a binary
/// using this crate must not contain a boundary of its own.
pub fn boundary() -> &'static [u8; BOUNDARY_SIZE] {
    static BOUNDARY: OnceLock<[u8; BOUNDARY_SIZE]> = OnceLock::new();
    BOUNDARY.get_or_init(|| {
        let mut boundary = [0u8; BOUNDARY_SIZE];
        let count = std::hint::black_box(BOUNDARY_PART_COUNT);
        for part in boundary.chunks_exact_mut(BOUNDARY_PART.len()).take(count) {
            part.copy_from_slice(&BOUNDARY_PART);
        }
        boundary
    })
}

/// Check whether `data` is exactly the boundary marker
pub fn is_boundary(data: &[u8]) -> bool {
    data == &boundary()[..]
}

/// Write the boundary marker
pub fn write_boundary<W: Write + ?Sized>(out: &mut W) -> io::Result<()> {
    out.write_all(boundary())
}

/// Scan forward for the next boundary marker
///
/// See [`seek_pattern`].
pub fn seek_boundary<R: Read + Seek + ?Sized>(input: &mut R) -> io::Result<Option<u64>> {
    seek_pattern(input, boundary())
}

/// Scan forward from the current position for the first occurrence of `pattern`
///
/// On success the stream is positioned on the first byte after the match and
/// the number of bytes consumed (including the pattern itself) is returned.
/// Returns `Ok(None)` if the stream ends first; the stream position is
/// unspecified in that case.
///
/// Reading is buffered, but only the consumed bytes count towards the
/// returned offset, so callers can do exact offset arithmetic with it.
pub fn seek_pattern<R: Read + Seek + ?Sized>(
    input: &mut R,
    pattern: &[u8],
) -> io::Result<Option<u64>> {
    let start = input.stream_position()?;
    if pattern.is_empty() {
        return Ok(Some(0));
    }

    let failure = failure_table(pattern);
    let mut matched = 0usize;
    let mut consumed = 0u64;
    let mut found = false;

    let mut reader = BufReader::with_capacity(SEARCH_BUFFER_SIZE, &mut *input);
    while !found {
        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if buf.is_empty() {
            return Ok(None);
        }

        let mut used = 0;
        for &byte in buf {
            used += 1;
            while matched > 0 && pattern[matched] != byte {
                matched = failure[matched - 1];
            }
            if pattern[matched] == byte {
                matched += 1;
            }
            if matched == pattern.len() {
                found = true;
                break;
            }
        }
        reader.consume(used);
        consumed += used as u64;
    }
    drop(reader);

    // BufReader read ahead; put the stream right behind the match
    input.seek(SeekFrom::Start(start + consumed))?;
    Ok(Some(consumed))
}

/// KMP failure function: `table[i]` is the length of the longest proper
/// prefix of `pattern[..=i]` that is also a suffix of it.
fn failure_table(pattern: &[u8]) -> Vec<usize> {
    let mut table = vec![0; pattern.len()];
    let mut k = 0;
    for i in 1..pattern.len() {
        while k > 0 && pattern[i] != pattern[k] {
            k = table[k - 1];
        }
        if pattern[i] == pattern[k] {
            k += 1;
        }
        table[i] = k;
    }
    table
}
