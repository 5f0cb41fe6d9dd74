use std::path::Path;

use anyhow::Context as _;

/// One visited page: target URL plus the label it was listed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub url: String,
    pub label: String,
}

/// Accumulates (url, label) pairs over a run and writes them out as a
/// flat list of anchors at the end.
///
/// An explicit value rather than ambient state, so two catalog views in
/// one run can share a single ledger and tests can hold independent
/// instances. Recording after a flush starts a new, independent ledger.
#[derive(Debug, Default)]
pub struct LinkLedger {
    entries: Vec<LedgerEntry>,
}

impl LinkLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, url: &str, label: &str) {
        self.entries.push(LedgerEntry {
            url: url.to_owned(),
            label: label.to_owned(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every recorded entry, in insertion order, to `path` and
    /// clear the ledger. Called exactly once per run.
    pub fn flush(&mut self, path: &Path) -> anyhow::Result<()> {
        let html = render_links(&self.entries);
        std::fs::write(path, html)
            .with_context(|| format!("write link ledger: {}", path.display()))?;

        tracing::info!(entries = self.entries.len(), path = %path.display(), "flushed link ledger");
        self.entries.clear();
        Ok(())
    }
}

fn render_links(entries: &[LedgerEntry]) -> String {
    let generated_at = chrono::Utc::now().to_rfc3339();

    let mut html = String::new();
    html.push_str("<!doctype html>\n<html>\n<head><title>Archived links</title></head>\n<body>\n");
    html.push_str(&format!("<!-- generated {generated_at} -->\n<ul>\n"));
    for entry in entries {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            escape_attr(&entry.url),
            escape_text(&entry.label),
        ));
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

fn escape_text(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(input: &str) -> String {
    escape_text(input).replace('"', "&quot;")
}
