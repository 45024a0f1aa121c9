//! Directory document loader

use async_trait::async_trait;
use pulldown_cmark::{Event, Parser, TagEnd};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

use ragsum_core::{Document, DocumentLoader, Error, Result};

static INLINE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\r\f\v]+").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n+").expect("valid regex"));

/// Kinds of file the loader understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Text,
    Markdown,
    Html,
    Json,
}

impl FileKind {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "text" => Some(FileKind::Text),
            "md" | "markdown" => Some(FileKind::Markdown),
            "html" | "htm" => Some(FileKind::Html),
            "json" => Some(FileKind::Json),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            FileKind::Text => "text",
            FileKind::Markdown => "markdown",
            FileKind::Html => "html",
            FileKind::Json => "json",
        }
    }
}

/// Loads text, markdown, HTML and JSON files from a file or directory tree
#[derive(Debug, Clone, Default)]
pub struct DirectoryLoader;

impl DirectoryLoader {
    pub fn new() -> Self {
        Self
    }

    /// Collect candidate files under `root`, sorted by path
    async fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    async fn load_file(path: &Path, root: &Path) -> Result<Option<Document>> {
        let Some(kind) = FileKind::from_path(path) else {
            debug!(path = %path.display(), "skipping unsupported file");
            return Ok(None);
        };

        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::DocumentLoader(format!("failed to read {}: {}", path.display(), e))
        })?;

        let (title, content) = match kind {
            FileKind::Text => (None, raw),
            FileKind::Markdown => markdown_to_text(&raw),
            FileKind::Html => html_to_text(&raw),
            FileKind::Json => (None, json_to_text(&raw, path)?),
        };

        let content = normalize_whitespace(&content);
        if content.is_empty() {
            debug!(path = %path.display(), "skipping file with no text");
            return Ok(None);
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        let id = relative.to_string_lossy().replace('\\', "/");
        let title = title.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| id.clone())
        });

        Ok(Some(Document {
            id,
            title,
            content,
            source: Some(path.to_string_lossy().into_owned()),
            metadata: json!({
                "file_type": kind.as_str(),
                "path": path.to_string_lossy(),
            }),
        }))
    }
}

#[async_trait]
impl DocumentLoader for DirectoryLoader {
    async fn load_all_documents(&self, path: &Path) -> Result<Vec<Document>> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            Error::DocumentLoader(format!("cannot open {}: {}", path.display(), e))
        })?;

        let (root, files) = if metadata.is_dir() {
            (path.to_path_buf(), Self::collect_files(path).await?)
        } else {
            let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
            (root, vec![path.to_path_buf()])
        };

        let mut documents = Vec::new();
        for file in &files {
            if let Some(document) = Self::load_file(file, &root).await? {
                documents.push(document);
            }
        }

        info!(
            path = %path.display(),
            files = files.len(),
            documents = documents.len(),
            "loaded documents"
        );
        Ok(documents)
    }
}

/// Collapse runs of spaces and blank lines, trim the ends
fn normalize_whitespace(text: &str) -> String {
    let text = INLINE_WHITESPACE.replace_all(text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Render markdown as plain text; the first heading becomes the title
fn markdown_to_text(markdown: &str) -> (Option<String>, String) {
    let mut text = String::new();
    let mut title: Option<String> = None;
    let mut heading: Option<String> = None;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(pulldown_cmark::Tag::Heading { .. }) => {
                heading = Some(String::new());
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(h) = heading.take() {
                    if title.is_none() && !h.trim().is_empty() {
                        title = Some(h.trim().to_string());
                    }
                }
                text.push_str("\n\n");
            }
            Event::Text(t) | Event::Code(t) => {
                if let Some(h) = heading.as_mut() {
                    h.push_str(&t);
                }
                text.push_str(&t);
            }
            Event::SoftBreak => text.push(' '),
            Event::HardBreak => text.push('\n'),
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Item)
            | Event::End(TagEnd::CodeBlock) => text.push_str("\n\n"),
            _ => {}
        }
    }

    (title, text)
}

/// Extract visible text from an HTML page
fn html_to_text(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);

    let title = Selector::parse("title").ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    });

    let mut text = String::new();
    if let Ok(selector) = Selector::parse("h1, h2, h3, h4, h5, h6, p, li, pre, blockquote, td, th") {
        for element in document.select(&selector) {
            let chunk = element.text().collect::<Vec<_>>().join(" ");
            let chunk = chunk.trim();
            if !chunk.is_empty() {
                text.push_str(chunk);
                text.push_str("\n\n");
            }
        }
    }

    (title, text)
}

/// Join every string leaf of a JSON document
fn json_to_text(raw: &str, path: &Path) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
        Error::DocumentLoader(format!("invalid JSON in {}: {}", path.display(), e))
    })?;

    let mut parts = Vec::new();
    collect_strings(&value, &mut parts);
    Ok(parts.join("\n"))
}

fn collect_strings(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        serde_json::Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}
