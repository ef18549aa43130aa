//! Stowaway CLI
//!
//! Embeds attachments into executables, lists and extracts them, and strips
//! them off again.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use stowaway::{AttachmentList, Attachments, Embedder};
use tempfile::NamedTempFile;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "stowaway")]
#[command(about = "Append named attachments to executables", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append attachments to an executable
    Embed {
        /// Target executable that should be augmented
        #[arg(short, long)]
        exe: PathBuf,

        /// JSON (or .toml) file mapping attachment names to files
        #[arg(short, long, default_value = "attachments.json")]
        attachments: PathBuf,

        /// Path for the resulting executable
        #[arg(short, long)]
        out: PathBuf,

        /// Accept executables without the compatibility marker (e.g. after packing)
        #[arg(long)]
        skip_compat_check: bool,
    },

    /// Strip all attachments, restoring the original executable
    Remove {
        /// Augmented executable
        #[arg(short, long)]
        exe: PathBuf,

        /// Path for the restored executable
        #[arg(short, long)]
        out: PathBuf,
    },

    /// List attachments and their sizes
    List {
        /// Executable to inspect
        #[arg(short, long)]
        exe: PathBuf,
    },

    /// Write a single attachment to a file
    Extract {
        /// Executable carrying the attachment
        #[arg(short, long)]
        exe: PathBuf,

        /// Attachment name
        #[arg(short, long)]
        name: String,

        /// Destination file
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    match Args::parse().command {
        Command::Embed {
            exe,
            attachments,
            out,
            skip_compat_check,
        } => embed(&exe, &attachments, &out, skip_compat_check),
        Command::Remove { exe, out } => remove(&exe, &out),
        Command::List { exe } => list(&exe),
        Command::Extract { exe, name, out } => extract(&exe, &name, &out),
    }
}

fn embed(exe: &Path, attachments: &Path, out: &Path, skip_compat_check: bool) -> Result<()> {
    let list = AttachmentList::load(attachments)
        .with_context(|| format!("failed to load attachment list {}", attachments.display()))?;
    let mut source =
        File::open(exe).with_context(|| format!("failed to open executable {}", exe.display()))?;

    println!("Augmenting {} --> {}", exe.display(), out.display());

    let mut embedder = Embedder::new().progress(|message| println!("\t{message}"));
    if skip_compat_check {
        embedder = embedder.skip_compatibility_check();
    }
    write_atomically(out, Some(exe), |w| embedder.embed_files(w, &mut source, &list))
        .with_context(|| format!("failed to augment {}", exe.display()))?;

    println!("Finished");
    Ok(())
}

fn remove(exe: &Path, out: &Path) -> Result<()> {
    let mut input =
        File::open(exe).with_context(|| format!("failed to open executable {}", exe.display()))?;

    let bytes = write_atomically(out, Some(exe), |w| stowaway::remove(w, &mut input))
        .with_context(|| format!("failed to strip {}", exe.display()))?;

    println!("Restored {} ({} bytes)", out.display(), bytes);
    Ok(())
}

fn list(exe: &Path) -> Result<()> {
    let mut attachments = Attachments::open(exe)
        .with_context(|| format!("failed to read attachments of {}", exe.display()))?;

    println!("{} contains {} attachments", exe.display(), attachments.count());
    let mut names = attachments.names();
    names.sort_unstable();
    for name in names {
        println!("\t{:?} ({} bytes)", name, attachments.size(name));
    }

    attachments.close()?;
    Ok(())
}

fn extract(exe: &Path, name: &str, out: &Path) -> Result<()> {
    let attachments = Attachments::open(exe)
        .with_context(|| format!("failed to read attachments of {}", exe.display()))?;
    let Some(mut reader) = attachments.reader(name) else {
        bail!("{} has no attachment named {:?}", exe.display(), name);
    };

    let bytes = write_atomically(out, None, |w| Ok(io::copy(&mut reader, w)?))?;
    println!("Extracted {:?} to {} ({} bytes)", name, out.display(), bytes);
    Ok(())
}

/// Write into a temporary file next to `out` and move it into place on success
///
/// Refuses to replace an existing `out`. With `permissions_from`, the result
/// gets the permissions of that file (keeps executables executable).
fn write_atomically<F>(out: &Path, permissions_from: Option<&Path>, write: F) -> Result<u64>
where
    F: FnOnce(&mut dyn Write) -> stowaway::Result<u64>,
{
    if out.exists() {
        bail!("output {} already exists", out.display());
    }
    let dir = out
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    let bytes = {
        let mut writer = BufWriter::new(temp.as_file_mut());
        let bytes = write(&mut writer)?;
        writer.flush()?;
        bytes
    };

    if let Some(source) = permissions_from {
        let permissions = std::fs::metadata(source)?.permissions();
        temp.as_file().set_permissions(permissions)?;
    }
    temp.persist_noclobber(out)
        .with_context(|| format!("failed to write {}", out.display()))?;

    info!(path = %out.display(), bytes, "wrote output");
    Ok(bytes)
}
