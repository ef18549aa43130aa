//! # Stowaway - Attachments for Executables
//!
//! `stowaway` appends named binary attachments to an executable and reads
//! them back at run time. The operating system keeps loading the executable
//! as before; the attachments simply ride along behind it.
//!
//! - **Append-only container** with no fixed header and no index at a fixed offset
//! - **Streaming search**: files are never loaded fully into memory
//! - **Strict validation**: corrupted containers fail to open, never return wrong bytes
//! - **Lossless removal**: strip the container to get the original executable back
//!
//! ## Quick Start
//!
//! Mark the program that should carry attachments and read them at run time:
//!
//! ```rust,no_run
//! use stowaway::{Attachments, Result};
//!
//! fn main() -> Result<()> {
//!     stowaway::mark_compatible!();
//!
//!     let attachments = Attachments::open_current()?;
//!     for name in attachments.names() {
//!         println!("{name}: {} bytes", attachments.size(name));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Embed attachments into the built executable:
//!
//! ```rust,no_run
//! use stowaway::{Embedder, Result};
//! use std::fs::File;
//! use std::io::Cursor;
//!
//! # fn main() -> Result<()> {
//! let mut exe = File::open("target/release/app")?;
//! let mut out = File::create("app-bundled")?;
//!
//! Embedder::new().embed(
//!     &mut out,
//!     &mut exe,
//!     vec![("greeting", Cursor::new(b"hello".to_vec()))],
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Original executable                         │
//! ├─────────────────────────────────────────────┤
//! │ Boundary (24 bytes)                         │
//! │ TOC: [{"Name": .., "Size": ..}, ..] (JSON)  │
//! │ Boundary                                    │
//! ├─────────────────────────────────────────────┤
//! │ Attachment data, in TOC order               │
//! ├─────────────────────────────────────────────┤
//! │ Boundary                                    │
//! ├─────────────────────────────────────────────┤
//! │ Anything appended later (ignored)           │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The first boundary in the file starts the container. Offsets of the
//! attachments follow from the TOC order and sizes, and the trailing
//! boundary must sit exactly where the sizes say.

pub mod boundary;
pub mod compat;
pub mod error;
pub mod manifest;
pub mod reader;
pub mod remover;
pub mod toc;
pub mod writer;

pub use boundary::{boundary, BOUNDARY_SIZE};
pub use compat::{compatibility_marker, verify_compatibility, Compatibility, COMPAT_VERSION};
pub use error::{Result, StowError};
pub use manifest::AttachmentList;
pub use reader::{locate, AttachmentReader, Attachments, Layout, Probe, Span};
pub use remover::remove;
pub use toc::{Toc, TocEntry};
pub use writer::Embedder;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
