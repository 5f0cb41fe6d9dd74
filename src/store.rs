//! Idempotent on-disk archive of rendered pages.
//!
//! Every logical resource maps to an html/pdf pair sharing one base
//! path. The html file is the record of truth: its presence means the
//! resource was archived by an earlier run and is never overwritten.

use std::path::Path;

use anyhow::Context as _;

use crate::driver::PageDriver;
use crate::normalize;

/// How the optional print artifact fared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfStatus {
    Saved,
    AlreadyExists,
    /// PDF output was not requested for this run.
    NotRequested,
    /// The driver could not produce print output; the html snapshot
    /// still exists, so the archive is merely degraded.
    Failed(String),
}

/// Result of one `ensure_archived` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// A fresh snapshot was written.
    Archived { pdf: PdfStatus },
    /// The html artifact was already present; nothing was written.
    AlreadyArchived,
}

/// Whether the html artifact for `base_path` already exists.
///
/// Callers use this to skip navigation entirely for archived items.
pub fn is_archived(base_path: &Path) -> bool {
    base_path.with_extension("html").exists()
}

/// Create `dir` and any missing ancestors, logging whether it was
/// newly created or already present.
pub fn ensure_dir(dir: &Path) -> anyhow::Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }

    if dir.exists() {
        tracing::debug!(dir = %dir.display(), "folder already exists");
    } else {
        tracing::info!(dir = %dir.display(), "creating folder");
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create folder: {}", dir.display()))?;
    }
    Ok(())
}

/// Create every missing parent directory of `base_path`.
pub fn ensure_parent_dirs(base_path: &Path) -> anyhow::Result<()> {
    match base_path.parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

/// Persist the currently loaded page under `base_path` (no extension).
///
/// The page is normalized, its full rendered markup written verbatim to
/// `base_path.html`, and, when `want_pdf` is set, a print rendering is
/// attempted at `base_path.pdf`. PDF failures degrade the outcome but
/// never fail the operation; filesystem errors are propagated.
pub async fn ensure_archived(
    driver: &dyn PageDriver,
    base_path: &Path,
    want_pdf: bool,
) -> anyhow::Result<ArchiveOutcome> {
    let html_path = base_path.with_extension("html");
    if html_path.exists() {
        tracing::info!(path = %html_path.display(), "already exists; skipping");
        return Ok(ArchiveOutcome::AlreadyArchived);
    }

    ensure_parent_dirs(base_path)?;

    normalize::normalize(driver)
        .await
        .context("normalize page before snapshot")?;

    let markup = driver
        .page_markup()
        .await
        .context("extract rendered markup")?;
    std::fs::write(&html_path, markup)
        .with_context(|| format!("write html snapshot: {}", html_path.display()))?;
    tracing::info!(path = %html_path.display(), "saved html snapshot");

    let pdf = if want_pdf {
        save_pdf(driver, base_path).await?
    } else {
        PdfStatus::NotRequested
    };

    Ok(ArchiveOutcome::Archived { pdf })
}

async fn save_pdf(driver: &dyn PageDriver, base_path: &Path) -> anyhow::Result<PdfStatus> {
    let pdf_path = base_path.with_extension("pdf");
    if pdf_path.exists() {
        tracing::info!(path = %pdf_path.display(), "already exists; skipping");
        return Ok(PdfStatus::AlreadyExists);
    }

    match driver.print_to_pdf().await {
        Ok(bytes) => {
            std::fs::write(&pdf_path, bytes)
                .with_context(|| format!("write pdf snapshot: {}", pdf_path.display()))?;
            tracing::info!(path = %pdf_path.display(), "saved pdf snapshot");
            Ok(PdfStatus::Saved)
        }
        Err(err) => {
            tracing::warn!(?err, path = %pdf_path.display(), "pdf generation failed; html kept");
            Ok(PdfStatus::Failed(format!("{err:#}")))
        }
    }
}
