//! Reading the raw address list.
//!
//! The list is a plain text file with one address per line. If the file does not exist yet,
//! [`load_with_recovery()`] asks the operator to create it through a [`Prompt`] and tries again,
//! until a read succeeds.

use std::{
    fs,
    io::{self, BufRead, Write},
    path::Path,
};

use log::{debug, warn};
#[cfg(test)]
use mockall::automock;

/// Default location of the address list, relative to the working directory
pub const DEFAULT_INPUT_FILE: &str = "ip_list.txt";

/// A `Prompt` is used to ask the operator to create a missing input file.
/// Implementations block until the operator signals that the file is in place.
#[cfg_attr(test, automock)]
pub trait Prompt {
    fn request_file(&self, path: &Path) -> io::Result<()>;
}

/// A [`Prompt`] that prints instructions to stdout and waits for Enter on stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn request_file(&self, path: &Path) -> io::Result<()> {
        let name = path.display();
        let mut out = io::stdout().lock();
        writeln!(out, "Input file '{}' not found.", name)?;
        writeln!(out, "Please create a file named '{}'.", name)?;
        writeln!(out, "Add a list of IP addresses, one per line, and save the file.")?;
        write!(out, "Press Enter after creating the file to continue...")?;
        out.flush()?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            // stdin is closed, nobody is going to press Enter
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stdin closed while waiting for {}", name),
            ));
        }
        Ok(())
    }
}

/// Read the address list at `path`, one trimmed string per line
pub fn read_addresses(path: &Path) -> io::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content.lines().map(|l| l.trim().to_string()).collect())
}

/// Read the address list at `path`.
/// If the file does not exist, the `prompt` is used to ask for it and the read is retried.
/// This loops until the read succeeds. Errors other than a missing file are returned as-is.
pub fn load_with_recovery(path: &Path, prompt: &dyn Prompt) -> io::Result<Vec<String>> {
    loop {
        match read_addresses(path) {
            Ok(lines) => {
                debug!("Read {} lines from {}", lines.len(), path.display());
                return Ok(lines);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Input file {} not found", path.display());
                prompt.request_file(path)?;
            }
            Err(e) => return Err(e),
        }
    }
}
