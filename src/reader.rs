//! Locating and reading an embedded container
//!
//! [`locate`] inspects a stream and reports whether a container is absent,
//! present, or broken. [`Attachments`] builds on it for files on disk and
//! keeps the file open so attachments can be read lazily.

use crate::boundary::{is_boundary, seek_boundary, BOUNDARY_SIZE};
use crate::error::{Result, StowError};
use crate::toc::Toc;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Outcome of looking for a container in a stream
///
/// A broken container is reported as an error by [`locate`], so the three
/// cases absent / valid / corrupt never collapse into each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// No boundary anywhere in the stream
    Absent,
    /// A well-formed container
    Present(Layout),
}

/// Position of a validated container inside a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// First byte of the TOC (right after the first boundary)
    pub toc_offset: u64,
    /// Length of the serialized TOC
    pub toc_len: u64,
    /// First byte of attachment data
    pub data_offset: u64,
    /// First byte of the trailing boundary
    pub data_end: u64,
    /// Parsed table of contents
    pub toc: Toc,
}

/// Absolute byte range of one attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span<'a> {
    /// Attachment name as stored in the TOC
    pub name: &'a str,
    /// Absolute offset of the first byte
    pub offset: u64,
    /// Length in bytes
    pub size: u64,
}

impl Layout {
    /// Offset of the first boundary, i.e. the length of the original executable
    pub fn container_offset(&self) -> u64 {
        self.toc_offset.saturating_sub(BOUNDARY_SIZE as u64)
    }

    /// Offset right after the trailing boundary
    pub fn container_end(&self) -> u64 {
        self.data_end.saturating_add(BOUNDARY_SIZE as u64)
    }

    /// Attachments in TOC order with their absolute offsets
    ///
    /// Stops before the first attachment whose end does not fit in a `u64`.
    /// Layouts returned by [`locate`] never contain one.
    pub fn spans(&self) -> impl Iterator<Item = Span<'_>> + '_ {
        self.toc.iter().scan(self.data_offset, |cursor, entry| {
            let offset = *cursor;
            *cursor = offset.checked_add(entry.size)?;
            Some(Span {
                name: &entry.name,
                offset,
                size: entry.size,
            })
        })
    }
}

/// Look for a container in `input`
///
/// The stream is rewound first. Its position afterwards is unspecified.
///
/// # Errors
///
/// - `IncompleteContainer` if only the first boundary exists
/// - `MalformedToc` if the TOC cannot be parsed
/// - `OffsetsExceedFile` if declared sizes run past the end of the stream
/// - `OffsetsInvalid` if declared sizes do not end on the trailing boundary
pub fn locate<R: Read + Seek + ?Sized>(input: &mut R) -> Result<Probe> {
    input.rewind()?;

    let toc_offset = match seek_boundary(input)? {
        Some(offset) => offset,
        None => {
            debug!("no boundary found, container absent");
            return Ok(Probe::Absent);
        }
    };
    let next = seek_boundary(input)?.ok_or(StowError::IncompleteContainer)?;
    let toc_len = next - BOUNDARY_SIZE as u64;
    debug!(toc_offset, toc_len, "found TOC boundaries");

    input.seek(SeekFrom::Start(toc_offset))?;
    let mut raw = Vec::new();
    (&mut *input).take(toc_len).read_to_end(&mut raw)?;
    if raw.len() as u64 != toc_len {
        return Err(StowError::IncompleteContainer);
    }
    let toc = Toc::from_bytes(&raw)?;

    let data_offset = toc_offset + next;
    let data_end = toc
        .data_len()
        .and_then(|len| data_offset.checked_add(len))
        .filter(|end| *end <= i64::MAX as u64)
        .ok_or(StowError::OffsetsExceedFile)?;

    input.seek(SeekFrom::Start(data_end))?;
    let mut trailer = [0u8; BOUNDARY_SIZE];
    if let Err(e) = input.read_exact(&mut trailer) {
        return Err(match e.kind() {
            ErrorKind::UnexpectedEof => StowError::OffsetsExceedFile,
            _ => StowError::Io(e),
        });
    }
    if !is_boundary(&trailer) {
        return Err(StowError::OffsetsInvalid);
    }

    debug!(
        attachments = toc.len(),
        data_offset, data_end, "container validated"
    );
    Ok(Probe::Present(Layout {
        toc_offset,
        toc_len,
        data_offset,
        data_end,
        toc,
    }))
}

/// Attachments embedded in an executable
///
/// Holds the executable open until [`close`](Attachments::close) is called
/// or the value is dropped. An executable without a container yields an
/// empty, valid handle.
///
/// ```rust,no_run
/// use stowaway::Attachments;
/// use std::io::Read;
///
/// # fn main() -> stowaway::Result<()> {
/// let mut attachments = Attachments::open_current()?;
/// println!("{} attachments", attachments.count());
///
/// if let Some(mut reader) = attachments.reader("config.json") {
///     let mut config = String::new();
///     reader.read_to_string(&mut config)?;
/// }
/// attachments.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Attachments {
    file: Option<File>,
    path: PathBuf,
    offsets: HashMap<String, u64>,
    sizes: HashMap<String, u64>,
}

impl Attachments {
    /// Open the attachments of the running executable
    pub fn open_current() -> Result<Self> {
        let path = std::env::current_exe()?;
        // Canonicalization fails for some network volumes; the raw path still works
        let path = std::fs::canonicalize(&path).unwrap_or(path);
        Self::open(path)
    }

    /// Open the attachments of an arbitrary executable
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        // The file is dropped (closed) on every error return below
        let mut file = File::open(path)?;

        let mut offsets = HashMap::new();
        let mut sizes = HashMap::new();
        if let Probe::Present(layout) = locate(&mut file)? {
            for span in layout.spans() {
                if offsets.insert(span.name.to_string(), span.offset).is_some() {
                    warn!(name = span.name, "duplicate attachment name, last one wins");
                }
                sizes.insert(span.name.to_string(), span.size);
            }
        }
        debug!(path = %path.display(), count = offsets.len(), "opened attachments");

        Ok(Attachments {
            file: Some(file),
            path: path.to_path_buf(),
            offsets,
            sizes,
        })
    }

    /// Path of the executable
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of all attachments, in no particular order
    pub fn names(&self) -> Vec<&str> {
        self.offsets.keys().map(String::as_str).collect()
    }

    /// Number of attachments
    pub fn count(&self) -> usize {
        self.offsets.len()
    }

    /// Whether an attachment with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.offsets.contains_key(name)
    }

    /// Size of an attachment in bytes, zero if it does not exist
    pub fn size(&self, name: &str) -> u64 {
        self.sizes.get(name).copied().unwrap_or(0)
    }

    /// Absolute offset of an attachment inside the executable, zero if it does not exist
    pub fn offset(&self, name: &str) -> u64 {
        self.offsets.get(name).copied().unwrap_or(0)
    }

    /// Bounded reader over one attachment
    ///
    /// Returns `None` if no attachment has that name or the handle is closed.
    pub fn reader(&self, name: &str) -> Option<AttachmentReader<'_>> {
        let file = self.file.as_ref()?;
        let offset = *self.offsets.get(name)?;
        Some(AttachmentReader::new(file, offset, self.size(name)))
    }

    /// Read a whole attachment into memory
    pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let Some(mut reader) = self.reader(name) else {
            return Ok(None);
        };
        let mut data = Vec::with_capacity(reader.size() as usize);
        reader.read_to_end(&mut data)?;
        Ok(Some(data))
    }

    /// Whether [`close`](Attachments::close) was already called
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Release the executable
    ///
    /// # Errors
    ///
    /// Returns `AlreadyClosed` when called a second time.
    pub fn close(&mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => {
                drop(file);
                debug!(path = %self.path.display(), "closed attachments");
                Ok(())
            }
            None => Err(StowError::AlreadyClosed),
        }
    }
}

/// Read-only view of one attachment
///
/// Reads never leave `[offset, offset + size)` of the underlying file. Each
/// reader tracks its own position and reads with positioned I/O, so several
/// readers over the same file can be used independently.
#[derive(Debug, Clone)]
pub struct AttachmentReader<'a> {
    file: &'a File,
    offset: u64,
    size: u64,
    pos: u64,
}

impl<'a> AttachmentReader<'a> {
    fn new(file: &'a File, offset: u64, size: u64) -> Self {
        AttachmentReader {
            file,
            offset,
            size,
            pos: 0,
        }
    }

    /// Attachment size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read at `pos` relative to the attachment start without moving the cursor
    pub fn read_at(&self, buf: &mut [u8], pos: u64) -> io::Result<usize> {
        if pos >= self.size || buf.is_empty() {
            return Ok(0);
        }
        let len = (self.size - pos).min(buf.len() as u64) as usize;
        read_file_at(self.file, &mut buf[..len], self.offset + pos)
    }
}

impl Read for AttachmentReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for AttachmentReader<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(n) => {
                self.pos = n;
                return Ok(n);
            }
            SeekFrom::End(delta) => (self.size, delta),
            SeekFrom::Current(delta) => (self.pos, delta),
        };
        match base.checked_add_signed(delta) {
            Some(n) => {
                self.pos = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}

#[cfg(unix)]
fn read_file_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_file_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

// No positioned reads here: readers sharing a file must be used one at a time
#[cfg(not(any(unix, windows)))]
fn read_file_at(mut file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    file.seek(SeekFrom::Start(offset))?;
    file.read(buf)
}
