//! Destinations for a successful response body.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Where a successful response body goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    File(PathBuf),
    Stdout,
}

impl Destination {
    pub fn from_option(output_file: Option<&Path>) -> Self {
        match output_file {
            Some(path) => Destination::File(path.to_path_buf()),
            None => Destination::Stdout,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::File(path) => write!(f, "{}", path.display()),
            Destination::Stdout => f.write_str("standard output"),
        }
    }
}

/// Create a file for writing, creating missing parent directories and
/// truncating existing content.
pub fn create_output_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Run `write` against the destination, with `stdout` standing in for the
/// process output stream.
pub fn write_to<T>(
    destination: &Destination,
    stdout: &mut dyn Write,
    write: impl FnOnce(&mut dyn Write) -> Result<T>,
) -> Result<T> {
    match destination {
        Destination::File(path) => {
            let mut file = create_output_file(path)?;
            let result = write(&mut file)?;
            file.flush()?;
            Ok(result)
        }
        Destination::Stdout => {
            let result = write(stdout)?;
            stdout.flush()?;
            Ok(result)
        }
    }
}
