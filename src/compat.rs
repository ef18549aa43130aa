//! Compatibility gate for embedding targets
//!
//! An executable accepts attachments if it was built against this crate and
//! called [`mark_compatible!`](crate::mark_compatible), which leaves a marker
//! string in the binary. The marker is assembled at run time here so that
//! tools which only *drive* embedding never look compatible themselves.

use crate::boundary::{seek_boundary, seek_pattern};
use crate::error::{Result, StowError};
use std::io::{Read, Seek};
use tracing::debug;

/// Version tag inside the compatibility marker
///
/// `mark_compatible!` repeats this literal; keep both in sync.
pub const COMPAT_VERSION: &str = "stowaway/v1";

/// Build the marker that compatible executables contain
pub fn compatibility_marker() -> Vec<u8> {
    format!("~~MagicMarker for {}~~", COMPAT_VERSION).into_bytes()
}

/// Compatibility requirement for embedding targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    /// Target must contain this byte string
    Marker(Vec<u8>),
    /// Skip the marker check, e.g. for executables run through a packer
    Disabled,
}

impl Compatibility {
    /// Marker to search for, `None` when the check is off
    pub fn marker(&self) -> Option<&[u8]> {
        match self {
            Compatibility::Marker(marker) if !marker.is_empty() => Some(marker.as_slice()),
            _ => None,
        }
    }
}

impl Default for Compatibility {
    fn default() -> Self {
        Compatibility::Marker(compatibility_marker())
    }
}

/// Verify that `exe` may receive attachments
///
/// The stream is rewound before the check and again on success.
///
/// # Errors
///
/// - `Incompatible` if the marker is required but missing
/// - `AlreadyEmbedded` if the executable already carries a container
pub fn verify_compatibility<R: Read + Seek + ?Sized>(
    exe: &mut R,
    compatibility: &Compatibility,
) -> Result<()> {
    exe.rewind()?;

    match compatibility.marker() {
        Some(marker) => {
            let offset = seek_pattern(exe, marker)?.ok_or(StowError::Incompatible)?;
            debug!(offset, "compatibility marker found");
        }
        None => debug!("compatibility check disabled"),
    }

    if seek_boundary(exe)?.is_some() {
        return Err(StowError::AlreadyEmbedded);
    }

    exe.rewind()?;
    Ok(())
}

/// Mark the calling executable as an embedding target
///
/// Invoke once from code that is always compiled into the binary, typically
/// at the top of `main`. Evaluates to the marker bytes.
///
/// ```rust,no_run
/// fn main() {
///     stowaway::mark_compatible!();
///     // ...
/// }
/// ```
#[macro_export]
macro_rules! mark_compatible {
    () => {{
        // concat! only takes literals: same text as COMPAT_VERSION
        static STOWAWAY_MARKER: &str = concat!("~~MagicMarker for ", "stowaway/v1", "~~");
        ::std::hint::black_box(STOWAWAY_MARKER.as_bytes())
    }};
}
