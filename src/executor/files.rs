// Bounded file access: capped reads and capped directory listings

use crate::executor::tool::{json_output, parse_input};
use crate::executor::{ExecutorError, Result, ToolDefinition, ToolImpl, ToolOutput};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Bytes returned by a read when the caller does not ask
pub const DEFAULT_MAX_READ_BYTES: usize = 100_000;
/// Entries returned by a listing; the rest is dropped
pub const MAX_LIST_ENTRIES: usize = 200;

pub const READ_TEXT_FILE: &str = "read_text_file";
pub const LIST_DIRECTORY: &str = "list_directory";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReadRequest {
    pub path: PathBuf,
    #[serde(default)]
    pub max_bytes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryListRequest {
    pub path: PathBuf,
}

/// One listing entry. A failed stat leaves `size`, `modified` and
/// `extension` zero-valued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub extension: String,
}

/// Read `max_bytes` (default 100 000) from offset 0 with a single read call.
///
/// A short read is returned as-is; bytes are decoded lossily as UTF-8.
pub async fn read_file(request: &FileReadRequest) -> Result<String> {
    let max_bytes = request
        .max_bytes
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAX_READ_BYTES);

    let mut file = tokio::fs::File::open(&request.path).await?;
    let len = file.metadata().await?.len();
    let mut buf = read_buffer(max_bytes, len)?;
    let read = file.read(&mut buf).await?;
    buf.truncate(read);

    debug!(path = %request.path.display(), max_bytes = max_bytes, read = read, "file read");
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Zeroed buffer for one read: no larger than the file, except that files
/// reporting length 0 (procfs and friends) still get the default size.
fn read_buffer(max_bytes: usize, file_len: u64) -> Result<Vec<u8>> {
    let floor = usize::try_from(file_len)
        .unwrap_or(usize::MAX)
        .max(DEFAULT_MAX_READ_BYTES);
    let size = max_bytes.min(floor);

    let mut buf = Vec::new();
    buf.try_reserve_exact(size).map_err(|e| {
        ExecutorError::InvalidInput(READ_TEXT_FILE.to_string(), format!("maxBytes {}: {}", max_bytes, e))
    })?;
    buf.resize(size, 0);
    Ok(buf)
}

/// List the first 200 entries of a directory in enumeration order.
pub async fn list_directory(request: &DirectoryListRequest) -> Result<Vec<DirectoryEntry>> {
    let mut dir = tokio::fs::read_dir(&request.path).await?;
    let mut entries = Vec::new();

    while entries.len() < MAX_LIST_ENTRIES {
        let Some(entry) = dir.next_entry().await? else {
            break;
        };
        entries.push(describe_entry(&entry).await);
    }

    debug!(path = %request.path.display(), entries = entries.len(), "directory listed");
    Ok(entries)
}

async fn describe_entry(entry: &tokio::fs::DirEntry) -> DirectoryEntry {
    let name = entry.file_name().to_string_lossy().into_owned();
    let path = entry.path();
    let is_directory = entry
        .file_type()
        .await
        .map(|t| t.is_dir())
        .unwrap_or(false);

    // stat follows symlinks, like the directory flag's consumers expect
    match tokio::fs::metadata(&path).await {
        Ok(meta) => DirectoryEntry {
            extension: if is_directory {
                String::new()
            } else {
                extension_of(&name)
            },
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
            name,
            path,
            is_directory,
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "stat failed, returning degraded entry");
            DirectoryEntry {
                name,
                path,
                is_directory,
                size: 0,
                modified: None,
                extension: String::new(),
            }
        }
    }
}

/// Extension including the leading dot; empty for dotfiles and bare names
fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx..].to_string(),
        _ => String::new(),
    }
}

/// `read_text_file` tool
pub struct ReadFileTool;

#[async_trait]
impl ToolImpl for ReadFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: READ_TEXT_FILE.to_string(),
            description: format!(
                "Read a text file from the start, up to maxBytes (default {}).",
                DEFAULT_MAX_READ_BYTES
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File to read" },
                    "maxBytes": { "type": "integer", "description": "Maximum bytes to return" }
                },
                "required": ["path"]
            }),
        }
    }

    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let request: FileReadRequest = parse_input(READ_TEXT_FILE, input)?;
        Ok(ToolOutput::success(read_file(&request).await?))
    }
}

/// `list_directory` tool
pub struct ListDirectoryTool;

#[async_trait]
impl ToolImpl for ListDirectoryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: LIST_DIRECTORY.to_string(),
            description: format!(
                "List up to {} directory entries with size, modification time and extension.",
                MAX_LIST_ENTRIES
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Directory to list" }
                },
                "required": ["path"]
            }),
        }
    }

    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let request: DirectoryListRequest = parse_input(LIST_DIRECTORY, input)?;
        json_output(&list_directory(&request).await?)
    }
}
