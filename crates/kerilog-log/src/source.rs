//! Byte sources feeding the parse pipeline
//!
//! The core only ever sees bytes plus a label for diagnostics; fetching a
//! remote log over the network is a collaborator's job and stays outside
//! this crate.

use std::fs;
use std::path::{Path, PathBuf};

use kerilog_core::{KerilogError, Result};

use crate::model::KeyEventLog;

/// Anything that can hand over a raw CESR stream
pub trait ByteSource {
    /// Human-readable description, used as the log's source label
    fn description(&self) -> String;

    /// Read the whole stream
    fn read(&self) -> Result<Vec<u8>>;

    /// Read and run the full pipeline
    fn load(&self) -> Result<KeyEventLog> {
        let bytes = self.read()?;
        KeyEventLog::parse_labeled(&bytes, Some(&self.description()))
    }
}

/// A local CESR file
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Read from the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The underlying path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn description(&self) -> String {
        match self.path.file_name() {
            Some(name) => format!("file: {}", name.to_string_lossy()),
            None => format!("file: {}", self.path.display()),
        }
    }

    fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| {
            KerilogError::source(format!("cannot read {}: {e}", self.path.display()))
        })
    }
}

/// Bytes already in hand (an upload, a test fixture)
#[derive(Debug, Clone)]
pub struct MemorySource {
    label: String,
    bytes: Vec<u8>,
}

impl MemorySource {
    /// Wrap bytes under a label
    pub fn new(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            bytes,
        }
    }
}

impl ByteSource for MemorySource {
    fn description(&self) -> String {
        self.label.clone()
    }

    fn read(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}
