//! Filesystem tools: read_file, list_files, write_file, replace,
//! replace_in_file, read_image_file.
//!
//! All paths are resolved through `ToolContext::path_guard`, so path
//! confinement (`PathEscape`) is enforced uniformly before any I/O happens.

use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::integrity::write_with_integrity;
use super::types::{Tool, ToolCategory, ToolContext, ToolResponse};
use crate::error::Result;

/// Directory names pruned from recursive descent, but still listed in
/// their parent directory's own entries.
pub const BLACKLISTED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "venv",
    ".venv",
    "__pycache__",
    "bin",
    "obj",
    ".vs",
    "dist",
    "build",
    ".idea",
    "target",
    "vendor",
    ".next",
    ".nuxt",
    "coverage",
    ".nyc_output",
    ".cache",
    ".parcel-cache",
    ".webpack",
    ".rollup.cache",
];

fn is_blacklisted(name: &str) -> bool {
    let lower = name.to_lowercase();
    BLACKLISTED_DIRS.iter().any(|b| b.to_lowercase() == lower)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn arg_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the full contents of a file within the working root"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Absolute path within the working root"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResponse> {
        let Some(path) = arg_str(&args, "path") else {
            return Ok(ToolResponse::failed("read_file", "missing 'path' argument"));
        };

        let resolved = match ctx.path_guard.resolve(path) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResponse::failed("read_file", e.to_string())),
        };

        let bytes = match tokio::fs::read(&resolved).await {
            Ok(b) => b,
            Err(e) => return Ok(ToolResponse::failed("read_file", format!("{e}"))),
        };
        let content = String::from_utf8_lossy(&bytes).to_string();
        let sha = sha256_hex(&bytes);
        let metadata = tokio::fs::metadata(&resolved).await.ok();
        let size = metadata.as_ref().map(|m| m.len()).unwrap_or(bytes.len() as u64);

        Ok(ToolResponse::success("read_file")
            .with_path(resolved.to_string_lossy().to_string())
            .with_sha256(sha)
            .with_notes(format!("Size: {size} bytes"))
            .with_content(content))
    }
}

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files and directories under a path within the working root"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path relative to the working root"},
                "recursive": {"type": "boolean", "description": "Recurse into subdirectories"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResponse> {
        let Some(path) = arg_str(&args, "path") else {
            return Ok(ToolResponse::failed("list_files", "missing 'path' argument"));
        };
        let recursive = args.get("recursive").and_then(|v| v.as_bool()).unwrap_or(false);

        let (root_abs, _) = match ctx.path_guard.resolve_relative(path) {
            Ok(v) => v,
            Err(e) => return Ok(ToolResponse::failed("list_files", e.to_string())),
        };

        let mut lines = Vec::new();
        if let Err(e) = walk(&root_abs, ctx.path_guard.root(), recursive, &mut lines).await {
            return Ok(ToolResponse::failed("list_files", e.to_string()));
        }
        lines.sort();

        Ok(ToolResponse::success("list_files")
            .with_path(root_abs.to_string_lossy().to_string())
            .with_notes(format!("{} entries", lines.len()))
            .with_content(lines.join("\n")))
    }
}

async fn walk(
    dir: &std::path::Path,
    root: &std::path::Path,
    recursive: bool,
    out: &mut Vec<String>,
) -> std::io::Result<()> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut batch = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        batch.push(entry);
    }

    for entry in batch {
        let meta = entry.metadata().await?;
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().to_string();
        let name = entry.file_name().to_string_lossy().to_string();

        let modified: chrono::DateTime<chrono::Local> = meta
            .modified()
            .map(chrono::DateTime::<chrono::Local>::from)
            .unwrap_or_else(|_| chrono::Local::now());
        let stamp = modified.format("%Y-%m-%d %H:%M:%S");

        if meta.is_dir() {
            out.push(format!("{stamp}  <DIR>  {relative}/"));
            if recursive && !is_blacklisted(&name) {
                Box::pin(walk(&path, root, recursive, out)).await?;
            }
        } else {
            out.push(format!("{stamp}  {}  {relative}", meta.len()));
        }
    }
    Ok(())
}

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write full content to a file within the working root, creating parent directories as needed"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Write
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResponse> {
        let Some(path) = arg_str(&args, "path") else {
            return Ok(ToolResponse::failed("write_file", "missing 'path' argument"));
        };
        let Some(content) = arg_str(&args, "content") else {
            return Ok(ToolResponse::failed("write_file", "missing 'content' argument"));
        };

        let resolved = match ctx.path_guard.resolve(path) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResponse::failed("write_file", e.to_string())),
        };

        match write_with_integrity(&resolved, content.as_bytes()).await {
            Ok(sha) => Ok(ToolResponse::success("write_file")
                .with_path(resolved.to_string_lossy().to_string())
                .with_sha256(sha)
                .with_notes(format!(
                    "Wrote {} bytes ({} lines)",
                    content.len(),
                    content.lines().count()
                ))
                .with_content(content)),
            Err(e) => Ok(ToolResponse::failed("write_file", e.to_string())),
        }
    }
}

pub struct ReplaceTool;

#[async_trait]
impl Tool for ReplaceTool {
    fn name(&self) -> &str {
        "replace"
    }

    fn description(&self) -> &str {
        "Replace an exact literal substring in a file a specified number of times, or create the file if old_string is empty"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Write
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "old_string": {"type": "string"},
                "new_string": {"type": "string"},
                "expected_replacements": {"type": "integer"}
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResponse> {
        let Some(path) = arg_str(&args, "path") else {
            return Ok(ToolResponse::failed("replace", "missing 'path' argument"));
        };
        let Some(old_string) = arg_str(&args, "old_string") else {
            return Ok(ToolResponse::failed("replace", "missing 'old_string' argument"));
        };
        let Some(new_string) = arg_str(&args, "new_string") else {
            return Ok(ToolResponse::failed("replace", "missing 'new_string' argument"));
        };
        let expected = args
            .get("expected_replacements")
            .and_then(|v| v.as_u64())
            .unwrap_or(1) as usize;

        let resolved = match ctx.path_guard.resolve(path) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResponse::failed("replace", e.to_string())),
        };

        if old_string.is_empty() {
            if resolved.exists() {
                return Ok(ToolResponse::failed(
                    "replace",
                    "target already exists; old_string empty implies create",
                ));
            }
            return match write_with_integrity(&resolved, new_string.as_bytes()).await {
                Ok(sha) => Ok(ToolResponse::success("replace")
                    .with_path(resolved.to_string_lossy().to_string())
                    .with_sha256(sha)
                    .with_notes("Created new file")
                    .with_content(new_string)),
                Err(e) => Ok(ToolResponse::failed("replace", e.to_string())),
            };
        }

        if !resolved.exists() {
            return Ok(ToolResponse::failed("replace", format!("file not found: {}", resolved.display())));
        }

        let original = match tokio::fs::read_to_string(&resolved).await {
            Ok(s) => s,
            Err(e) => return Ok(ToolResponse::failed("replace", e.to_string())),
        };
        let normalized = original.replace("\r\n", "\n");

        let count = normalized.matches(old_string).count();
        if count == 0 {
            return Ok(ToolResponse::failed("replace", "0 occurrences"));
        }
        if count != expected {
            return Ok(ToolResponse::failed(
                "replace",
                format!("expected {expected} occurrence(s) but found {count}"),
            ));
        }

        let replaced = normalized.replacen(old_string, new_string, expected);

        match write_with_integrity(&resolved, replaced.as_bytes()).await {
            Ok(sha) => Ok(ToolResponse::success("replace")
                .with_path(resolved.to_string_lossy().to_string())
                .with_sha256(sha)
                .with_notes(format!(
                    "Successfully modified file: {} ({expected} replacement(s))\nTotal lines: {}\nContent size: {} characters",
                    resolved.display(),
                    replaced.lines().count(),
                    replaced.len()
                ))
                .with_content(replaced)),
            Err(e) => Ok(ToolResponse::failed("replace", e.to_string())),
        }
    }
}

const SEARCH_MARKER: &str = "------- SEARCH";
const DIVIDER_MARKER: &str = "=======";
const REPLACE_MARKER: &str = "+++++++ REPLACE";

struct DiffBlock {
    search: String,
    replace: String,
}

fn parse_diff_blocks(diff: &str) -> std::result::Result<Vec<DiffBlock>, String> {
    let mut blocks = Vec::new();
    let mut lines = diff.lines().peekable();

    while let Some(line) = lines.next() {
        if line.trim() != SEARCH_MARKER {
            continue;
        }
        let mut search_lines = Vec::new();
        loop {
            match lines.next() {
                Some(l) if l.trim() == DIVIDER_MARKER => break,
                Some(l) => search_lines.push(l),
                None => return Err("unterminated SEARCH block".into()),
            }
        }
        let mut replace_lines = Vec::new();
        loop {
            match lines.next() {
                Some(l) if l.trim() == REPLACE_MARKER => break,
                Some(l) => replace_lines.push(l),
                None => return Err("unterminated REPLACE block".into()),
            }
        }
        blocks.push(DiffBlock {
            search: search_lines.join("\n"),
            replace: replace_lines.join("\n"),
        });
    }

    if blocks.is_empty() {
        return Err("no SEARCH/REPLACE blocks found".into());
    }
    Ok(blocks)
}

pub struct ReplaceInFileTool;

#[async_trait]
impl Tool for ReplaceInFileTool {
    fn name(&self) -> &str {
        "replace_in_file"
    }

    fn description(&self) -> &str {
        "Apply one or more SEARCH/REPLACE blocks to a file; each block must match exactly once"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Write
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "diff": {"type": "string", "description": "Document with one or more SEARCH/REPLACE blocks"}
            },
            "required": ["path", "diff"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResponse> {
        let Some(path) = arg_str(&args, "path") else {
            return Ok(ToolResponse::failed("replace_in_file", "missing 'path' argument"));
        };
        let Some(diff) = arg_str(&args, "diff") else {
            return Ok(ToolResponse::failed("replace_in_file", "missing 'diff' argument"));
        };

        let resolved = match ctx.path_guard.resolve(path) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResponse::failed("replace_in_file", e.to_string())),
        };

        if !resolved.exists() {
            return Ok(ToolResponse::failed(
                "replace_in_file",
                format!("file not found: {}", resolved.display()),
            ));
        }

        let blocks = match parse_diff_blocks(diff) {
            Ok(b) => b,
            Err(e) => return Ok(ToolResponse::failed("replace_in_file", e)),
        };

        let original = match tokio::fs::read_to_string(&resolved).await {
            Ok(s) => s,
            Err(e) => return Ok(ToolResponse::failed("replace_in_file", e.to_string())),
        };
        let mut current = original.replace("\r\n", "\n");

        for block in &blocks {
            let count = current.matches(block.search.as_str()).count();
            if count != 1 {
                return Ok(ToolResponse::failed(
                    "replace_in_file",
                    format!(
                        "SEARCH block matched {count} time(s), expected exactly 1: {:.60}",
                        block.search
                    ),
                ));
            }
            current = current.replacen(block.search.as_str(), &block.replace, 1);
        }

        match write_with_integrity(&resolved, current.as_bytes()).await {
            Ok(sha) => Ok(ToolResponse::success("replace_in_file")
                .with_path(resolved.to_string_lossy().to_string())
                .with_sha256(sha)
                .with_notes(format!(
                    "Applied {} block(s)\nTotal lines: {}\nContent size: {} characters",
                    blocks.len(),
                    current.lines().count(),
                    current.len()
                ))
                .with_content(current)),
            Err(e) => Ok(ToolResponse::failed("replace_in_file", e.to_string())),
        }
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "bmp"];

pub struct ReadImageFileTool;

#[async_trait]
impl Tool for ReadImageFileTool {
    fn name(&self) -> &str {
        "read_image_file"
    }

    fn description(&self) -> &str {
        "Read an image file and make its bytes available to the model as multimodal input"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResponse> {
        let Some(path) = arg_str(&args, "path") else {
            return Ok(ToolResponse::failed("read_image_file", "missing 'path' argument"));
        };

        let resolved = match ctx.path_guard.resolve(path) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResponse::failed("read_image_file", e.to_string())),
        };

        let ext = resolved
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            return Ok(ToolResponse::failed(
                "read_image_file",
                format!("unsupported image extension: {ext}"),
            ));
        }

        let bytes = match tokio::fs::read(&resolved).await {
            Ok(b) => b,
            Err(e) => return Ok(ToolResponse::failed("read_image_file", e.to_string())),
        };
        let sha = sha256_hex(&bytes);
        let media_type = format!("image/{}", if ext == "jpg" { "jpeg" } else { ext.as_str() });
        let name = resolved.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();

        Ok(ToolResponse::success("read_image_file")
            .with_path(resolved.to_string_lossy().to_string())
            .with_sha256(sha)
            .with_notes(format!(
                "{name}: {} bytes, {media_type}; attached to next outbound message as multimodal input",
                bytes.len()
            )))
    }
}
