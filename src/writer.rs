//! Appending a container to an executable
//!
//! Output layout:
//!
//! ```text
//! executable | boundary | TOC | boundary | attachment 1 .. attachment n | boundary
//! ```
//!
//! Nothing is written before the target passed the compatibility gate. Later
//! failures leave partial output behind, so write to a temporary file and
//! publish it only once [`Embedder::embed`] returned `Ok`.

use crate::boundary::{write_boundary, BOUNDARY_SIZE};
use crate::compat::{verify_compatibility, Compatibility};
use crate::error::{Result, StowError};
use crate::manifest::AttachmentList;
use crate::toc::Toc;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::{debug, info};

/// Builder-style driver for embedding attachments
///
/// ```rust,no_run
/// use stowaway::{AttachmentList, Embedder};
/// use std::fs::File;
///
/// # fn main() -> stowaway::Result<()> {
/// let list = AttachmentList::load("attachments.json")?;
/// let mut exe = File::open("app")?;
/// let mut out = File::create("app-bundled")?;
///
/// Embedder::new()
///     .progress(|message| println!("{message}"))
///     .embed_files(&mut out, &mut exe, &list)?;
/// # Ok(())
/// # }
/// ```
pub struct Embedder<'a> {
    compatibility: Compatibility,
    progress: Option<Box<dyn FnMut(&str) + 'a>>,
}

impl Default for Embedder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Embedder<'a> {
    /// Embedder requiring the default compatibility marker
    pub fn new() -> Self {
        Embedder {
            compatibility: Compatibility::default(),
            progress: None,
        }
    }

    /// Set the compatibility requirement for targets
    pub fn compatibility(mut self, compatibility: Compatibility) -> Self {
        self.compatibility = compatibility;
        self
    }

    /// Accept targets without a compatibility marker
    pub fn skip_compatibility_check(self) -> Self {
        self.compatibility(Compatibility::Disabled)
    }

    /// Receive human-readable progress messages
    pub fn progress(mut self, progress: impl FnMut(&str) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Write `exe` followed by a container holding `attachments` to `out`
    ///
    /// Every attachment stream is rewound, so its whole content is embedded
    /// regardless of its current position. Attachments are stored in the
    /// order given. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// - `Incompatible` / `AlreadyEmbedded` from the compatibility gate
    /// - `AttachmentSizeMismatch` if a stream ends before its measured size
    /// - `Io` for any read, seek or write failure
    pub fn embed<W, E, I, N, A>(&mut self, out: &mut W, exe: &mut E, attachments: I) -> Result<u64>
    where
        W: Write + ?Sized,
        E: Read + Seek + ?Sized,
        I: IntoIterator<Item = (N, A)>,
        N: Into<String>,
        A: Read + Seek,
    {
        verify_compatibility(exe, &self.compatibility)?;

        let mut attachments: Vec<(String, A)> = attachments
            .into_iter()
            .map(|(name, content)| (name.into(), content))
            .collect();
        let toc = build_toc(&mut attachments)?;
        let raw_toc = toc.to_bytes()?;

        self.report("Writing executable");
        exe.rewind()?;
        let mut written = io::copy(exe, out)?;
        debug!(bytes = written, "copied executable");

        write_boundary(out)?;
        self.report(&format!("Adding TOC ({} bytes)", raw_toc.len()));
        out.write_all(&raw_toc)?;
        write_boundary(out)?;
        written += raw_toc.len() as u64 + 2 * BOUNDARY_SIZE as u64;

        for ((name, content), entry) in attachments.iter_mut().zip(toc.iter()) {
            self.report(&format!("Adding {:?} ({} bytes)", name, entry.size));
            let copied = io::copy(&mut content.by_ref().take(entry.size), out)?;
            if copied != entry.size {
                return Err(StowError::AttachmentSizeMismatch {
                    name: name.clone(),
                    expected: entry.size,
                    actual: copied,
                });
            }
            written += copied;
        }

        write_boundary(out)?;
        written += BOUNDARY_SIZE as u64;
        out.flush()?;

        info!(
            attachments = toc.len(),
            bytes = written,
            "embedded attachments"
        );
        Ok(written)
    }

    /// Embed the files named by an attachment list
    ///
    /// # Errors
    ///
    /// Returns `AttachmentSource` if a file cannot be opened, before any
    /// output is written. See [`embed`](Embedder::embed) for the rest.
    pub fn embed_files<W, E>(&mut self, out: &mut W, exe: &mut E, list: &AttachmentList) -> Result<u64>
    where
        W: Write + ?Sized,
        E: Read + Seek + ?Sized,
    {
        let mut files = Vec::with_capacity(list.len());
        for (name, path) in list.iter() {
            let file = File::open(path).map_err(|source| StowError::AttachmentSource {
                name: name.to_string(),
                path: path.to_path_buf(),
                source,
            })?;
            files.push((name.to_string(), file));
        }
        self.embed(out, exe, files)
    }

    fn report(&mut self, message: &str) {
        debug!("{}", message);
        if let Some(progress) = self.progress.as_mut() {
            progress(message);
        }
    }
}

/// Measure every attachment and rewind it
fn build_toc<A: Read + Seek>(attachments: &mut [(String, A)]) -> Result<Toc> {
    let mut toc = Toc::new();
    for (name, content) in attachments.iter_mut() {
        let size = content.seek(SeekFrom::End(0))?;
        content.rewind()?;
        toc.push(name.clone(), size);
    }
    Ok(toc)
}
