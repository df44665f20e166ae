//! Per-client append-only log files.
//!
//! Each client identity maps to one file at `<dir>/<prefix>_<name>.log`,
//! opened in append mode and never truncated or rotated. Opening the file
//! writes a start banner; dropping the handle writes a stop banner. Every
//! entry in between is one client record.

use crate::entry::{format_entry, Sequence};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// Start banner text for a client.
fn start_banner(name: &str) -> String {
    format!("---=== Client \"{name}\" started ===---")
}

/// Stop banner text, identical for every client.
const STOP_BANNER: &str = "^^^ ^^^ ^^^ Client stopped ^^^ ^^^ ^^^";

/// Log file path for a client identity.
pub fn log_path(dir: &Path, prefix: &str, name: &str) -> PathBuf {
    dir.join(format!("{prefix}_{name}.log"))
}

/// An open append-only log file bound to one client session.
///
/// Sessions with the same client name share a path and append to the same
/// file. There is no cross-session locking: each entry is a single
/// `write_all` on an O_APPEND handle, so concurrent writers interleave at
/// line granularity only.
pub struct ClientLog {
    name: String,
    file: File,
    sequence: Sequence,
}

impl ClientLog {
    /// Open (creating if absent) the client's log file and write the start
    /// marker as its first sequenced entry.
    ///
    /// Fails if the file cannot be opened or the start marker cannot be
    /// written; in either case no handle is retained and the session must
    /// not proceed.
    pub fn open(dir: &Path, prefix: &str, name: &str) -> std::io::Result<ClientLog> {
        let path = log_path(dir, prefix, name);
        let mut file = OpenOptions::new().append(true).create(true).open(&path)?;

        // Written before ClientLog exists so a failure here cannot reach
        // the drop-time stop marker.
        let mut sequence = Sequence::new();
        write_line(&mut file, &mut sequence, &start_banner(name))?;

        Ok(ClientLog {
            name: name.to_string(),
            file,
            sequence,
        })
    }

    /// Append one client record. Write failures after the session is
    /// established are reported but do not tear the session down.
    pub fn put_record(&mut self, record: &str) {
        if let Err(e) = self.write_entry(record) {
            warn!(client = %self.name, error = %e, "Failed to write record");
        }
    }

    fn write_entry(&mut self, text: &str) -> std::io::Result<()> {
        write_line(&mut self.file, &mut self.sequence, text)
    }
}

fn write_line(file: &mut File, sequence: &mut Sequence, text: &str) -> std::io::Result<()> {
    let line = format_entry(sequence, text);
    // One write_all per entry keeps same-path appends line-atomic.
    file.write_all(line.as_bytes())?;
    file.flush()
}

impl Drop for ClientLog {
    fn drop(&mut self) {
        // Unconditional cleanup path: report, never propagate.
        if let Err(e) = self.write_entry(STOP_BANNER) {
            error!(client = %self.name, error = %e, "Failed to write stop marker");
        }
    }
}
