//! One full archival run: establish the session, snapshot the entry
//! pages, walk each requested catalog view, flush the link ledger, and
//! release the browser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use url::Url;

use crate::catalog::{self, ItemOutcome, ItemStatus, WalkConfig};
use crate::cli::RunArgs;
use crate::config::{self, Credentials};
use crate::driver::{ChromiumDriver, PageDriver};
use crate::ledger::LinkLedger;
use crate::sanitize::sanitize;
use crate::session;
use crate::store;
use crate::views::{self, CatalogView};

/// Folder receiving the default view's archive, matching the portal's
/// own name for the catalog.
const PRIMARY_VIEW_FOLDER: &str = "projects";

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    // Usage errors must surface before any network or browser activity.
    let credentials = Credentials::from_env()?;

    let catalog_url = Url::parse(&args.catalog_url).context("parse --catalog-url")?;
    let out_root = PathBuf::from(&args.out);
    store::ensure_dir(&out_root)?;

    let driver = ChromiumDriver::launch()
        .await
        .context("establish browser session")?;

    // The browser is released on both success and failure paths.
    let result = run_with_driver(&driver, &args, &credentials, &catalog_url, &out_root).await;
    driver.shutdown().await;
    result
}

async fn run_with_driver(
    driver: &dyn PageDriver,
    args: &RunArgs,
    credentials: &Credentials,
    catalog_url: &Url,
    out_root: &Path,
) -> anyhow::Result<()> {
    let wait = Duration::from_secs(args.wait_secs.max(1));
    let walk_config = WalkConfig {
        wait,
        want_pdf: args.pdf,
    };
    let mut ledger = LinkLedger::new();

    session::establish(driver, credentials, &args.portal_url, wait)
        .await
        .context("establish portal session")?;

    // The landing page itself is part of the archive.
    store::ensure_archived(driver, &out_root.join("home"), args.pdf)
        .await
        .context("archive home page")?;

    tracing::info!(url = %catalog_url, "navigating to catalog");
    driver.navigate(catalog_url.as_str()).await?;
    driver
        .wait_for_selector("body", wait)
        .await
        .context("wait for catalog page")?;

    let primary = walk_view(
        driver,
        catalog_url,
        &out_root.join(PRIMARY_VIEW_FOLDER),
        &mut ledger,
        &walk_config,
    )
    .await?;

    if primary.is_empty() {
        // An empty catalog is a clean early termination, not a failure.
        tracing::info!("catalog has no groups; ending run");
        return Ok(());
    }
    log_walk_summary(PRIMARY_VIEW_FOLDER, &primary);

    if args.both_views {
        let alternate = CatalogView::new(&args.alt_view_label, &sanitize(&args.alt_view_label));
        match views::switch_view(driver, catalog_url.as_str(), &alternate, wait).await {
            Ok(confirmed) => {
                if !confirmed {
                    // Recoverable by design: archive whatever view is
                    // actually rendered rather than aborting the run.
                    tracing::warn!(
                        view = %alternate.label,
                        "walking unconfirmed view; artifacts may belong to the active view"
                    );
                }
                let outcomes = walk_view(
                    driver,
                    catalog_url,
                    &out_root.join(&alternate.folder),
                    &mut ledger,
                    &walk_config,
                )
                .await?;
                log_walk_summary(&alternate.folder, &outcomes);
            }
            Err(err) => {
                tracing::warn!(?err, view = %alternate.label, "view switch failed; skipping view");
            }
        }
    }

    ledger
        .flush(&out_root.join("links.html"))
        .context("flush link ledger")?;
    Ok(())
}

/// Snapshot the rendered catalog page, then walk every item it lists.
async fn walk_view(
    driver: &dyn PageDriver,
    catalog_url: &Url,
    destination_root: &Path,
    ledger: &mut LinkLedger,
    walk_config: &WalkConfig,
) -> anyhow::Result<Vec<ItemOutcome>> {
    store::ensure_dir(destination_root)?;
    store::ensure_archived(driver, &destination_root.join("catalog"), walk_config.want_pdf)
        .await
        .context("archive catalog page")?;

    // Give late-rendering panels time to appear before parsing.
    tokio::time::sleep(config::settle_delay(walk_config.wait)).await;

    catalog::walk(driver, destination_root, catalog_url, ledger, walk_config).await
}

fn log_walk_summary(view: &str, outcomes: &[ItemOutcome]) {
    let archived = outcomes
        .iter()
        .filter(|o| matches!(o.status, ItemStatus::Archived { .. }))
        .count();
    let skipped = outcomes
        .iter()
        .filter(|o| o.status == ItemStatus::AlreadyArchived)
        .count();
    let failed = outcomes.len() - archived - skipped;

    tracing::info!(view, archived, skipped, failed, "view walk complete");
    for outcome in outcomes {
        if let ItemStatus::Failed(reason) = &outcome.status {
            tracing::warn!(label = %outcome.label, url = %outcome.url, %reason, "item not archived");
        }
    }
}
