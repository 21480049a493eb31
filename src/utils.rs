use glob::{glob_with, MatchOptions, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use jwalk::{Parallelism, WalkDir};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// Read and deserialize a JSON file, streaming from a buffered reader
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::json(path, e))
}

/// Serialize `value` as two-space indented JSON, creating parent directories first
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut writer = BufWriter::new(File::create(path).map_err(|e| Error::io(path, e))?);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| Error::json(path, e))?;
    writer.flush().map_err(|e| Error::io(path, e))
}

/// Write a JSON artifact, logging instead of failing. Returns whether it was written.
pub fn write_report<T: Serialize>(path: &Path, value: &T, what: &str) -> bool {
    match write_json(path, value) {
        Ok(()) => {
            info!("Successfully wrote {} to: {}", what, path.display());
            true
        }
        Err(e) => {
            error!("Failed to write {}: {}", what, e);
            false
        }
    }
}

/// Create a directory (and parents) unless it already exists
pub fn ensure_directory(path: &Path) -> Result<PathBuf> {
    fs::create_dir_all(path).map_err(|e| Error::io(path, e))?;
    Ok(path.to_path_buf())
}

/// Delete a file or a whole directory tree
pub fn remove_path(path: &Path) -> Result<()> {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| Error::io(path, e))
}

/// Find files under `dir` (top level and every subdirectory) with one of the
/// given extensions, matched case-insensitively.
///
/// Results are grouped by extension in the order given, sorted by path within
/// each group, and each file appears once.
pub fn find_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    find_matching(dir, "**/*", extensions)
}

/// Like [`find_files`], but only looks directly inside `dir`
pub fn find_top_level_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    find_matching(dir, "*", extensions)
}

fn find_matching(dir: &Path, stem_pattern: &str, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    let base = Pattern::escape(&dir.to_string_lossy());
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for ext in extensions {
        let pattern = format!("{}/{}.{}", base, stem_pattern, ext);
        for entry in glob_with(&pattern, options)? {
            match entry {
                Ok(path) if path.is_file() => {
                    if seen.insert(path.clone()) {
                        files.push(path);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable path while searching {}: {}", dir.display(), e),
            }
        }
    }
    Ok(files)
}

fn walk(root: &Path) -> WalkDir {
    WalkDir::new(root)
        .skip_hidden(false)
        .sort(true)
        .parallelism(Parallelism::Serial)
}

fn walk_error(root: &Path, e: jwalk::Error) -> Error {
    Error::Walk {
        path: root.to_path_buf(),
        message: e.to_string(),
    }
}

/// Every file and directory below `root`, in sorted depth-first order
pub fn list_entries(root: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in walk(root) {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if entry.depth > 0 {
            entries.push(entry.path());
        }
    }
    Ok(entries)
}

/// Number of files and directories below `root`
pub fn count_entries(root: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in walk(root) {
        if entry.map_err(|e| walk_error(root, e))?.depth > 0 {
            count += 1;
        }
    }
    Ok(count)
}

/// Recursively copy `src` into `dst`, creating `dst` if needed.
///
/// Symbolic links are followed and their targets copied. Returns the number
/// of regular files written.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    if !src.is_dir() {
        return Err(Error::io(
            src,
            std::io::Error::new(std::io::ErrorKind::NotFound, "source is not a directory"),
        ));
    }
    fs::create_dir_all(dst).map_err(|e| Error::io(dst, e))?;
    let mut copied = 0;

    for entry in walk(src) {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        if entry.depth == 0 {
            continue;
        }
        let path = entry.path();
        let relative = path
            .strip_prefix(src)
            .map_err(|_| Error::Invalid(format!("{} is outside {}", path.display(), src.display())))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
        } else if file_type.is_symlink() && path.is_dir() {
            copied += copy_tree(&path, &target)?;
        } else {
            fs::copy(&path, &target).map_err(|e| Error::io(&path, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Run an external tool to completion and return its standard output.
///
/// A launch failure or a non-zero exit status becomes `Error::Command`
/// carrying the tool's stderr.
pub fn run_command(command: &mut Command) -> Result<String> {
    let program = command.get_program().to_string_lossy().into_owned();
    debug!("Running {:?}", command);
    let output = command.output().map_err(|e| Error::Command {
        program: program.clone(),
        message: e.to_string(),
    })?;
    if !output.status.success() {
        return Err(Error::Command {
            program,
            message: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// YOLO label file name for an image: its file stem with a `.txt` extension
pub fn label_file_name(image_file_name: &str) -> Option<String> {
    let stem = Path::new(image_file_name).file_stem()?.to_str()?;
    Some(format!("{}.txt", stem))
}

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
            label
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}
