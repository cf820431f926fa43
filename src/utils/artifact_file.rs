use crate::error::Result;
use crate::utils::path_validator::restrict_to_owner;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

pub const PRIVATE_FILE_MODE: u32 = 0o600;
pub const PRIVATE_SCRIPT_MODE: u32 = 0o700;

/// Create or truncate `path` with `contents`, leaving it readable only by the owner.
pub fn write_private(path: &Path, contents: &str, mode: u32) -> Result<()> {
    let mut file = open_with_mode(
        OpenOptions::new().write(true).create(true).truncate(true),
        path,
        mode,
    )?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    // The mode passed to open() only applies to new files.
    restrict_to_owner(path, mode)?;
    Ok(())
}

/// Append one line, creating the file owner-only if needed.
pub fn append_private_line(path: &Path, line: &str) -> Result<()> {
    let mut file = open_with_mode(
        OpenOptions::new().append(true).create(true),
        path,
        PRIVATE_FILE_MODE,
    )?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Create an empty owner-only file, failing with `AlreadyExists` if `path` is taken.
pub fn claim_private(path: &Path) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    with_mode(&mut options, PRIVATE_FILE_MODE).open(path).map(drop)
}

fn open_with_mode(options: &mut OpenOptions, path: &Path, mode: u32) -> Result<File> {
    Ok(with_mode(options, mode).open(path)?)
}

fn with_mode(options: &mut OpenOptions, mode: u32) -> &mut OpenOptions {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    {
        let _ = mode;
    }
    options
}
