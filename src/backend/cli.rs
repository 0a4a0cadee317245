//! CLI archive backend shelling out to zip/unzip
//!
//! Listings use a bounded wait so a wedged tool cannot hang the session
//! indefinitely; extraction and mutation wait for completion. Note that a
//! wrong password makes the listing tool exit non-zero with empty output,
//! which surfaces here as an empty entry list, exactly like a genuinely
//! empty archive would.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{ArchiveBackend, BackendError, BackendResult};
use crate::config::Config;

pub struct CliBackend {
    archive: PathBuf,
    password: String,
    unzip_tool: String,
    zip_tool: String,
    list_timeout: Duration,
}

impl CliBackend {
    pub fn new(config: &Config) -> Self {
        Self {
            archive: PathBuf::new(),
            password: String::new(),
            unzip_tool: config.tools.unzip.clone(),
            zip_tool: config.tools.zip.clone(),
            list_timeout: Duration::from_secs(config.general.list_timeout_secs),
        }
    }

    /// Run the listing tool, killing it when the deadline passes.
    ///
    /// Output is drained on a separate thread while waiting; a listing
    /// larger than the pipe buffer must not wedge the tool against a full
    /// pipe until the deadline kills it.
    fn run_listing(&self, args: &[&str]) -> BackendResult<String> {
        let mut child = Command::new(&self.unzip_tool)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let mut stdout = child.stdout.take();
        let reader = thread::spawn(move || {
            let mut out = String::new();
            if let Some(pipe) = stdout.as_mut() {
                let _ = pipe.read_to_string(&mut out);
            }
            out
        });

        let deadline = Instant::now() + self.list_timeout;
        loop {
            match child.try_wait()? {
                Some(_) => break,
                None if Instant::now() >= deadline => {
                    log::warn!("{} listing timed out, killing", self.unzip_tool);
                    let _ = child.kill();
                    let _ = child.wait();
                    // Killing the child closes the pipe, so the reader ends.
                    let _ = reader.join();
                    return Err(BackendError::Timeout(format!("{} listing", self.unzip_tool)));
                }
                None => thread::sleep(Duration::from_millis(25)),
            }
        }

        reader
            .join()
            .map_err(|_| BackendError::Other("listing reader thread panicked".to_string()))
    }

    /// Run a tool to completion (extraction and mutation have no deadline)
    fn run_blocking(&self, tool: &str, args: &[String]) -> BackendResult<()> {
        log::debug!("running {} with {} args", tool, args.len());
        let status = Command::new(tool)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(BackendError::ToolFailed {
                tool: tool.to_string(),
                status: status.code().unwrap_or(-1),
            })
        }
    }

    fn password_args(&self) -> Vec<String> {
        if self.password.is_empty() {
            Vec::new()
        } else {
            vec!["-P".to_string(), self.password.clone()]
        }
    }

    /// Fresh extraction directory that outlives this call: nested archives
    /// extracted here get re-opened as their own backends later.
    fn persistent_temp_dir(&self) -> BackendResult<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix("varc-extract-")
            .tempdir()?
            .keep();
        Ok(dir)
    }
}

impl ArchiveBackend for CliBackend {
    fn open(&mut self, path: &Path) -> BackendResult<()> {
        if !path.exists() {
            return Err(BackendError::NotFound(path.display().to_string()));
        }
        // Canonical so the path doubles as a stable password-cache key and
        // survives the cwd changes add_files makes.
        self.archive = fs::canonicalize(path)?;
        Ok(())
    }

    fn archive_path(&self) -> &Path {
        &self.archive
    }

    fn list_entries(&mut self, prefix: &str) -> BackendResult<Vec<String>> {
        let mut args: Vec<String> = self.password_args();
        args.push("-Z".to_string());
        args.push("-1".to_string());
        args.push(self.archive.display().to_string());
        let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();

        let out = self.run_listing(&arg_refs)?;
        Ok(out
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty() && l.starts_with(prefix))
            .map(|l| l.to_string())
            .collect())
    }

    fn extract_entry(&mut self, entry: &str) -> BackendResult<PathBuf> {
        let dest = self.persistent_temp_dir()?;
        let mut args = self.password_args();
        args.push(self.archive.display().to_string());
        args.push(entry.to_string());
        args.push("-d".to_string());
        args.push(dest.display().to_string());
        self.run_blocking(&self.unzip_tool, &args)?;
        Ok(dest.join(entry))
    }

    fn extract_all(&mut self, dest: &Path) -> BackendResult<()> {
        let mut args = self.password_args();
        args.push(self.archive.display().to_string());
        args.push("-d".to_string());
        args.push(dest.display().to_string());
        self.run_blocking(&self.unzip_tool, &args)
    }

    fn add_files(&mut self, files: &[PathBuf], dest_prefix: &str) -> BackendResult<()> {
        // The tool stores paths as given on the command line, so stage the
        // files under the destination prefix and zip from the staging root.
        let staging = tempfile::tempdir()?;
        let dest_dir = staging.path().join(dest_prefix.trim_matches('/'));
        fs::create_dir_all(&dest_dir)?;

        let mut rel_paths = Vec::new();
        for file in files {
            let name = file
                .file_name()
                .ok_or_else(|| BackendError::Other(format!("no file name: {}", file.display())))?;
            fs::copy(file, dest_dir.join(name))?;
            let rel = if dest_prefix.trim_matches('/').is_empty() {
                PathBuf::from(name)
            } else {
                PathBuf::from(dest_prefix.trim_matches('/')).join(name)
            };
            rel_paths.push(rel.display().to_string());
        }

        let mut args = vec![self.archive.display().to_string()];
        args.extend(rel_paths);
        let status = Command::new(&self.zip_tool)
            .args(&args)
            .current_dir(staging.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(BackendError::ToolFailed {
                tool: self.zip_tool.clone(),
                status: status.code().unwrap_or(-1),
            })
        }
    }

    fn remove_entries(&mut self, entries: &[String]) -> BackendResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        // The tool may rebuild the whole archive to honor this; from our
        // side it either succeeds for all paths or fails as a unit.
        let mut args = vec!["-d".to_string(), self.archive.display().to_string()];
        args.extend(entries.iter().cloned());
        self.run_blocking(&self.zip_tool, &args)
    }

    fn set_password(&mut self, password: &str) {
        self.password = password.to_string();
    }
}
