//! Catalog discovery and the archival walk.
//!
//! A catalog page renders as a list of group panels, each holding a list
//! of item links. Parsing is a pure function over the rendered markup;
//! the walk drives the shared page context through every item that is
//! not yet archived, strictly in document order.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use scraper::{Html, Selector};
use url::Url;

use crate::config;
use crate::driver::PageDriver;
use crate::ledger::LinkLedger;
use crate::sanitize::sanitize;
use crate::store::{self, ArchiveOutcome, PdfStatus};

const GROUP_SELECTOR: &str = ".panel-group";
const GROUP_TITLE_SELECTOR: &str = ".panel-heading .panel-title a";
const ITEM_LINK_SELECTOR: &str = ".panel.panel-default ul.list-group li.list-group-item a";

/// A named cluster of items within one catalog view.
#[derive(Debug, Clone)]
pub struct Group {
    pub title: String,
    /// Sanitized folder name derived from the title.
    pub folder: String,
    pub items: Vec<Item>,
}

/// One archivable content page.
#[derive(Debug, Clone)]
pub struct Item {
    pub label: String,
    pub url: Url,
    /// Sanitized file stem derived from the label (no extension).
    pub file_stem: String,
}

/// Per-item result of a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub label: String,
    pub url: String,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Archived { pdf: PdfStatus },
    AlreadyArchived,
    /// Navigation or load wait failed; the item stays absent from the
    /// archive and is retried on the next run.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct WalkConfig {
    pub wait: Duration,
    pub want_pdf: bool,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(config::DEFAULT_WAIT_SECS),
            want_pdf: false,
        }
    }
}

/// Parse the rendered catalog markup into its group/item hierarchy.
///
/// Zero groups is not an error; it signals an empty or unsupported
/// layout and the caller terminates the walk cleanly. Item hrefs are
/// resolved against `base_url`.
pub fn parse_groups(markup: &str, base_url: &Url) -> Vec<Group> {
    let document = Html::parse_document(markup);
    let group_selector = Selector::parse(GROUP_SELECTOR).expect("group selector is valid");
    let title_selector = Selector::parse(GROUP_TITLE_SELECTOR).expect("title selector is valid");
    let item_selector = Selector::parse(ITEM_LINK_SELECTOR).expect("item selector is valid");

    let mut groups = Vec::new();
    let mut folders_seen: HashMap<String, String> = HashMap::new();

    for group_el in document.select(&group_selector) {
        let Some(title_el) = group_el.select(&title_selector).next() else {
            tracing::warn!("group panel without a title link; skipping");
            continue;
        };
        let title = collapse_whitespace(&title_el.text().collect::<String>());
        let folder = sanitize(&title);

        if let Some(other) = folders_seen.insert(folder.clone(), title.clone())
            && other != title
        {
            tracing::warn!(
                folder = %folder,
                first = %other,
                second = %title,
                "distinct group titles sanitize to the same folder name"
            );
        }

        let mut items = Vec::new();
        let mut stems_seen: HashMap<String, String> = HashMap::new();
        for link in group_el.select(&item_selector) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let url = match base_url.join(href) {
                Ok(url) => url,
                Err(err) => {
                    tracing::warn!(?err, href = %href, "unresolvable item href; skipping");
                    continue;
                }
            };
            let label = collapse_whitespace(&link.text().collect::<String>());
            let file_stem = sanitize(&label);

            if let Some(other) = stems_seen.insert(file_stem.clone(), label.clone())
                && other != label
            {
                tracing::warn!(
                    group = %title,
                    file = %file_stem,
                    first = %other,
                    second = %label,
                    "distinct item labels sanitize to the same file name"
                );
            }

            items.push(Item {
                label,
                url,
                file_stem,
            });
        }

        groups.push(Group {
            title,
            folder,
            items,
        });
    }

    groups
}

/// Archive every item of the currently rendered catalog page.
///
/// Reparses the page state on each call; the only cross-run memory is
/// the archive store's existence check. Per-item navigation failures
/// are logged and isolated; filesystem errors abort the walk.
pub async fn walk(
    driver: &dyn PageDriver,
    destination_root: &Path,
    base_url: &Url,
    ledger: &mut LinkLedger,
    walk_config: &WalkConfig,
) -> anyhow::Result<Vec<ItemOutcome>> {
    let markup = driver.page_markup().await?;
    let groups = parse_groups(&markup, base_url);
    if groups.is_empty() {
        tracing::info!("no groups found in catalog; nothing to archive");
        return Ok(Vec::new());
    }
    tracing::info!(groups = groups.len(), "processing catalog groups");

    let mut outcomes = Vec::new();
    for group in &groups {
        tracing::info!(group = %group.title, items = group.items.len(), "processing group");
        let folder = destination_root.join(&group.folder);
        store::ensure_dir(&folder)?;

        for item in &group.items {
            let base_path = folder.join(&item.file_stem);
            let outcome = archive_item(driver, item, &base_path, walk_config).await?;

            if !matches!(outcome.status, ItemStatus::Failed(_)) {
                ledger.record(&outcome.url, &outcome.label);
            }
            outcomes.push(outcome);
        }
    }

    Ok(outcomes)
}

async fn archive_item(
    driver: &dyn PageDriver,
    item: &Item,
    base_path: &Path,
    walk_config: &WalkConfig,
) -> anyhow::Result<ItemOutcome> {
    let url = item.url.to_string();

    if store::is_archived(base_path) {
        tracing::info!(label = %item.label, path = %base_path.display(), "already archived");
        return Ok(ItemOutcome {
            label: item.label.clone(),
            url,
            status: ItemStatus::AlreadyArchived,
        });
    }

    tracing::info!(label = %item.label, url = %url, "archiving item");

    if let Err(err) = load_item_page(driver, &url, walk_config.wait).await {
        tracing::warn!(?err, label = %item.label, url = %url, "item load failed; skipping");
        return Ok(ItemOutcome {
            label: item.label.clone(),
            url,
            status: ItemStatus::Failed(format!("{err:#}")),
        });
    }

    let status = match store::ensure_archived(driver, base_path, walk_config.want_pdf).await? {
        ArchiveOutcome::Archived { pdf } => ItemStatus::Archived { pdf },
        ArchiveOutcome::AlreadyArchived => ItemStatus::AlreadyArchived,
    };

    Ok(ItemOutcome {
        label: item.label.clone(),
        url,
        status,
    })
}

async fn load_item_page(
    driver: &dyn PageDriver,
    url: &str,
    wait: Duration,
) -> anyhow::Result<()> {
    driver.navigate(url).await?;
    driver.wait_for_selector("body", wait).await?;
    tokio::time::sleep(config::settle_delay(wait)).await;
    Ok(())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
