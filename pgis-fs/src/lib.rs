//! Filesystem helpers for staging data files, built on `cap-std` and `camino`.
//!
//! Callers pass ordinary UTF-8 paths. Each helper anchors the path at the
//! filesystem root (or the current directory for relative paths) and performs
//! the operation through a capability handle on that anchor.
#![forbid(unsafe_code)]

use std::io::{self, Write};

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

/// Split `path` into an opened anchor directory and the remainder below it.
fn anchor(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let base = match path.components().next() {
        Some(Utf8Component::Prefix(prefix)) => {
            Utf8PathBuf::from(format!("{}{}", prefix.as_str(), std::path::MAIN_SEPARATOR))
        }
        Some(Utf8Component::RootDir) => Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string()),
        _ => Utf8PathBuf::from("."),
    };
    let relative = if base == "." {
        path.to_path_buf()
    } else {
        path.strip_prefix(&base)
            .map_err(|_| io::Error::other(format!("cannot resolve {path} below {base}")))?
            .to_path_buf()
    };
    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    Ok((dir, relative))
}

fn not_found_is_false(result: io::Result<bool>) -> io::Result<bool> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        other => other,
    }
}

/// Create `path` and any missing parents.
pub fn ensure_dir(path: &Utf8Path) -> io::Result<()> {
    let (dir, relative) = anchor(path)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    dir.create_dir_all(&relative)
}

/// Create the parent directory of `path` when it has one.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// Whether `path` names an existing regular file.
pub fn is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, relative) = anchor(path)?;
    not_found_is_false(dir.metadata(&relative).map(|meta| meta.is_file()))
}

/// Whether `path` names an existing directory.
pub fn is_dir(path: &Utf8Path) -> io::Result<bool> {
    let (dir, relative) = anchor(path)?;
    if relative.as_str().is_empty() {
        return Ok(true);
    }
    not_found_is_false(dir.metadata(&relative).map(|meta| meta.is_dir()))
}

/// Read a whole file as UTF-8 text.
pub fn read_to_string(path: &Utf8Path) -> io::Result<String> {
    let (dir, relative) = anchor(path)?;
    dir.read_to_string(&relative)
}

/// Write `contents` to `path`, creating parent directories and replacing any
/// existing file.
pub fn write_file(path: &Utf8Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let (dir, relative) = anchor(path)?;
    dir.write(&relative, contents)
}

/// Write `contents` to `path` only if nothing exists there yet.
///
/// Fails with [`io::ErrorKind::AlreadyExists`] when the file is present.
pub fn write_new_file(path: &Utf8Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let (dir, relative) = anchor(path)?;
    let mut options = fs_utf8::OpenOptions::new();
    options.write(true).create_new(true);
    let mut file = dir.open_with(&relative, &options)?;
    file.write_all(contents.as_ref())?;
    file.flush()
}

/// Delete the regular files directly inside `path`, then the folder itself.
///
/// Returns `false` when the folder did not exist. Sub-directories are left in
/// place, so a folder holding one fails to delete with the underlying error.
pub fn flush_folder(path: &Utf8Path) -> io::Result<bool> {
    if !is_dir(path)? {
        return Ok(false);
    }
    let (root, relative) = anchor(path)?;
    let folder = root.open_dir(&relative)?;
    for item in folder.entries()? {
        let entry = item?;
        if entry.file_type()?.is_file() {
            folder.remove_file(entry.file_name()?)?;
        }
    }
    root.remove_dir(&relative)?;
    Ok(true)
}
