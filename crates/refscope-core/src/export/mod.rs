// # Name Snapshot Export
//
// Writes the registered value and command names to two plain-text files for
// inspection outside the host.
//
// ## File Format
//
// One name per line, newline-terminated, sorted case-insensitively:
//
// ```text
// alpha
// Beta
// Zeta
// ```
//
// ## Atomicity
//
// Each file is written to a sibling `.tmp` file, flushed, then renamed over
// the destination, so a reader never sees a half-written list.

use std::cmp::Ordering;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{trace, warn};

use crate::Error;

/// Subdirectory (below the host base directory) receiving the snapshots
const EXPORT_SUBDIR: [&str; 2] = ["Output", "preferences"];

/// File name of the value-name snapshot
pub const VALUE_LIST_FILE: &str = "refscope_last_run_values.txt";

/// File name of the command-name snapshot
pub const COMMAND_LIST_FILE: &str = "refscope_last_run_commands.txt";

/// Destinations of the two snapshot files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    /// Value-name list
    pub values: PathBuf,
    /// Command-name list
    pub commands: PathBuf,
}

impl ExportPaths {
    /// Standard locations below a host base directory
    pub fn under(base_dir: impl AsRef<Path>) -> Self {
        let mut dir = base_dir.as_ref().to_path_buf();
        dir.extend(EXPORT_SUBDIR);

        Self {
            values: dir.join(VALUE_LIST_FILE),
            commands: dir.join(COMMAND_LIST_FILE),
        }
    }
}

/// Case-insensitive ordering used for on-disk presentation
///
/// Names are compared upper-case folded, so punctuation between `Z` and `a`
/// (`_`, `[`, `^` and friends) sorts after letters. Ties (names differing
/// only in case) fall back to byte order so the output is deterministic.
pub fn presentation_order(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_uppercase)
        .cmp(b.chars().flat_map(char::to_uppercase));

    folded.then_with(|| a.cmp(b))
}

/// Write both name lists
///
/// # Returns
///
/// `true` only if both files were fully written. Failures are logged and
/// never propagated; the caller decides what a failed snapshot means.
pub fn export(
    value_names: &mut [&str],
    command_names: &mut [&str],
    value_path: &Path,
    command_path: &Path,
) -> bool {
    let values_ok = sort_and_write(value_names, value_path);
    let commands_ok = sort_and_write(command_names, command_path);
    values_ok && commands_ok
}

/// Write both name lists to `paths`
pub fn export_to(value_names: &mut [&str], command_names: &mut [&str], paths: &ExportPaths) -> bool {
    export(value_names, command_names, &paths.values, &paths.commands)
}

fn sort_and_write(names: &mut [&str], path: &Path) -> bool {
    names.sort_by(|a, b| presentation_order(a, b));

    match write_atomically(names, path) {
        Ok(()) => {
            trace!("Wrote {} names to {}", names.len(), path.display());
            true
        }
        Err(e) => {
            warn!("Failed to write name list {}: {}", path.display(), e);
            false
        }
    }
}

fn write_atomically(names: &[&str], path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            Error::export(format!(
                "Failed to create export directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = temp_path(path);
    {
        let file = fs::File::create(&temp_path).map_err(|e| {
            Error::export(format!(
                "Failed to create temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        let mut writer = BufWriter::new(file);
        for name in names {
            writer.write_all(name.as_bytes())?;
            writer.write_all(b"\n")?;
        }

        let file = writer.into_inner().map_err(|e| {
            Error::export(format!(
                "Failed to flush temp file {}: {}",
                temp_path.display(),
                e.error()
            ))
        })?;
        file.sync_all()?;
    }

    fs::rename(&temp_path, path).map_err(|e| {
        Error::export(format!(
            "Failed to rename {} to {}: {}",
            temp_path.display(),
            path.display(),
            e
        ))
    })?;

    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut temp = path.to_path_buf();
    temp.set_extension("tmp");
    temp
}
