//! Stripping a container from an executable
//!
//! Everything from the first boundary onwards is dropped, including bytes
//! that another tool may have appended after the container. The result is
//! the executable exactly as it was before embedding.

use crate::boundary::{seek_boundary, BOUNDARY_SIZE};
use crate::error::{Result, StowError};
use std::io::{self, Read, Seek, Write};
use tracing::info;

/// Copy `input` up to its first boundary into `out`
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Returns `NothingEmbedded` if `input` contains no boundary.
pub fn remove<W, R>(out: &mut W, input: &mut R) -> Result<u64>
where
    W: Write + ?Sized,
    R: Read + Seek + ?Sized,
{
    input.rewind()?;
    let offset = seek_boundary(input)?.ok_or(StowError::NothingEmbedded)?;
    let exe_len = offset - BOUNDARY_SIZE as u64;

    input.rewind()?;
    let copied = io::copy(&mut (&mut *input).take(exe_len), out)?;
    if copied != exe_len {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    out.flush()?;

    info!(bytes = copied, "removed embedded attachments");
    Ok(copied)
}
