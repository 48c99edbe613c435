use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::core::{PdfConfig, RenderError};

/// Turns invoice HTML into a paged PDF at `output`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, html: &str, output: &Path) -> Result<(), RenderError>;
}

/// Renderer backed by an external wkhtmltopdf-compatible binary.
pub struct HtmlPdfRenderer {
    binary: String,
    config: PdfConfig,
}

impl HtmlPdfRenderer {
    pub fn new(binary: impl Into<String>, config: PdfConfig) -> Self {
        HtmlPdfRenderer {
            binary: binary.into(),
            config,
        }
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(self.config.renderer_args())
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

/// Engine input written next to the output; removed when dropped, including
/// when the render future is cancelled mid-run.
struct ScratchFile(PathBuf);

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.0.display(),
                error = %e,
                "Failed to remove render scratch file"
            ),
        }
    }
}

#[async_trait]
impl DocumentRenderer for HtmlPdfRenderer {
    async fn render(&self, html: &str, output: &Path) -> Result<(), RenderError> {
        let scratch = ScratchFile(output.with_extension("html"));
        tokio::fs::write(&scratch.0, html).await?;

        let out = self
            .command(&scratch.0, output)
            .output()
            .await
            .map_err(|e| RenderError::Engine(format!("failed to run {}: {}", self.binary, e)))?;

        if out.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&out.stderr);

        // Exit 1 is a load warning (a dead image link, say); the page is still written.
        if out.status.code() == Some(1) && has_content(output).await {
            tracing::warn!(
                binary = %self.binary,
                stderr = %stderr.trim(),
                "PDF engine reported load errors; keeping its output"
            );
            return Ok(());
        }

        Err(RenderError::Engine(format!(
            "{} exited with {}: {}",
            self.binary,
            out.status,
            stderr.trim()
        )))
    }
}

async fn has_content(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len() > 0)
        .unwrap_or(false)
}
