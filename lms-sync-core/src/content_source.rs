//! Reads manifest-referenced files from the local content tree.
//!
//! Markdown is rendered to HTML on a blocking worker and raced against a timer;
//! everything else passes through with a MIME type guessed from its extension.

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use tracing::{debug, error, info};

use crate::contract::{ContentSource, SourceFile};
use crate::error::SyncError;

pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_millis(3000);

static MARKDOWN_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.md$").expect("static regex"));

pub fn is_markdown(path: &str) -> bool {
    MARKDOWN_EXTENSION.is_match(path)
}

/// The name a manifest file is published under: a trailing Markdown extension
/// becomes `.html`, anything else is left alone.
pub fn published_file_name(path: &str) -> String {
    MARKDOWN_EXTENSION.replace(path, ".html").into_owned()
}

/// Markdown to HTML. Runs on a blocking thread, so it must be `Send + Sync`.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> String;
}

/// CommonMark with the GitHub-flavoured extensions course authors lean on.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommonMarkRenderer;

impl MarkdownRenderer for CommonMarkRenderer {
    fn render(&self, markdown: &str) -> String {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS;
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, Parser::new_ext(markdown, options));
        out
    }
}

/// [`ContentSource`] over a directory on disk.
pub struct FileContentSource {
    root: PathBuf,
    render_timeout: Duration,
    renderer: Arc<dyn MarkdownRenderer>,
}

impl FileContentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            renderer: Arc::new(CommonMarkRenderer),
        }
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn MarkdownRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    async fn render(&self, path: &str, markdown: String) -> Result<String, SyncError> {
        let renderer = Arc::clone(&self.renderer);
        let task = tokio::task::spawn_blocking(move || renderer.render(&markdown));
        match tokio::time::timeout(self.render_timeout, task).await {
            Ok(Ok(rendered)) => Ok(rendered),
            Ok(Err(join_error)) => {
                error!(file = path, error = %join_error, "Markdown render task failed");
                Err(SyncError::Render {
                    path: path.to_string(),
                    message: join_error.to_string(),
                })
            }
            Err(_) => {
                error!(file = path, timeout = ?self.render_timeout, "Markdown render timed out");
                Err(SyncError::RenderTimeout {
                    path: path.to_string(),
                    timeout: self.render_timeout,
                })
            }
        }
    }
}

#[async_trait]
impl ContentSource for FileContentSource {
    async fn read(&self, path: &str) -> Result<SourceFile, SyncError> {
        let full_path = self.root.join(path);
        let bytes = tokio::fs::read(&full_path).await.map_err(|e| {
            error!(error = ?e, path = %full_path.display(), "Failed to read content file");
            SyncError::from_io(&full_path, e)
        })?;

        if is_markdown(path) {
            info!(file = path, "Rendering markdown");
            let markdown = String::from_utf8_lossy(&bytes).into_owned();
            let rendered = self.render(path, markdown).await?;
            debug!(file = path, size = rendered.len(), "Rendered markdown");
            return Ok(SourceFile {
                bytes: rendered.into_bytes(),
                mime_type: "text/html".to_string(),
                file_name: published_file_name(path),
            });
        }

        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(SourceFile {
            bytes,
            mime_type,
            file_name: path.to_string(),
        })
    }
}
