// ABOUTME: Module slices of an MTA archive: content digest and extraction.
// ABOUTME: An entry is either one file name or a directory prefix ending in '/'.

use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use tempfile::TempPath;

use super::FileError;

/// Path of `path` relative to `entry` when it belongs to the module slice.
fn relative_to<'a>(path: &'a str, entry: &str) -> Option<&'a str> {
    let path = path.trim_start_matches("./");
    if entry.ends_with('/') {
        path.strip_prefix(entry).filter(|rest| !rest.is_empty())
    } else if path == entry {
        path.rsplit('/').next()
    } else {
        None
    }
}

fn invalid(e: std::io::Error) -> FileError {
    FileError::InvalidArchive(e.to_string())
}

/// Walk the regular files of the module slice in archive order.
fn for_each_file<F>(
    reader: &mut dyn Read,
    entry: &str,
    max_size: u64,
    mut visit: F,
) -> Result<(), FileError>
where
    F: FnMut(&str, u64, &mut dyn Read) -> Result<(), FileError>,
{
    let mut archive = tar::Archive::new(reader);
    let mut total = 0u64;
    let mut matched = false;

    for file in archive.entries().map_err(invalid)? {
        let mut file = file.map_err(invalid)?;
        if !file.header().entry_type().is_file() {
            continue;
        }
        let path = file.path().map_err(invalid)?.to_string_lossy().into_owned();
        let Some(relative) = relative_to(&path, entry) else {
            continue;
        };
        let size = file.size();
        total += size;
        if total > max_size {
            return Err(FileError::TooLarge {
                entry: entry.to_string(),
                max: max_size,
            });
        }
        matched = true;
        let relative = relative.to_string();
        visit(&relative, size, &mut file)?;
    }

    if !matched {
        return Err(FileError::EntryNotFound {
            entry: entry.to_string(),
        });
    }
    Ok(())
}

/// SHA-256 over the relative paths and bytes of the module slice, upper-case hex.
pub fn module_digest(
    reader: &mut dyn Read,
    entry: &str,
    max_size: u64,
) -> Result<String, FileError> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    for_each_file(reader, entry, max_size, |relative, _size, content| {
        hasher.update(relative.as_bytes());
        loop {
            let n = content.read(&mut buf).map_err(invalid)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(())
    })?;
    Ok(hex::encode_upper(hasher.finalize()))
}

/// Copy the module slice into a fresh tar file that is deleted on drop.
pub fn extract_module(
    reader: &mut dyn Read,
    entry: &str,
    max_size: u64,
) -> Result<TempPath, FileError> {
    let temp = tempfile::Builder::new()
        .prefix("mtadeploy-module-")
        .suffix(".tar")
        .tempfile()
        .map_err(FileError::io(std::env::temp_dir()))?;
    let temp_path = temp.path().to_path_buf();
    let mut builder = tar::Builder::new(temp);

    for_each_file(reader, entry, max_size, |relative, size, content| {
        let mut header = tar::Header::new_gnu();
        header.set_size(size);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, relative, content)
            .map_err(FileError::io(&temp_path))
    })?;

    let mut temp = builder.into_inner().map_err(FileError::io(&temp_path))?;
    temp.flush().map_err(FileError::io(&temp_path))?;
    Ok(temp.into_temp_path())
}
