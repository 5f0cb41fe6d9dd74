//! Switching between catalog views (curriculum tracks).
//!
//! The portal renders one curriculum at a time; a dropdown in the
//! header switches the active track and re-renders the catalog. The
//! switch is a fixed UI interaction confirmed by inspecting the label
//! the dropdown shows afterwards.

use std::time::Duration;

use anyhow::Context as _;

use crate::driver::PageDriver;

const VIEW_TOGGLE_SELECTOR: &str = "#curriculum-switcher";
const VIEW_LABEL_SELECTOR: &str = "#curriculum-switcher .current-curriculum";
const VIEW_OPTION_SELECTOR: &str = "#curriculum-switcher .dropdown-menu a";

/// One selectable rendering of the catalog.
#[derive(Debug, Clone)]
pub struct CatalogView {
    /// Label the curriculum dropdown shows for this view.
    pub label: String,
    /// Folder under the output root that receives this view's archive.
    pub folder: String,
}

impl CatalogView {
    pub fn new(label: &str, folder: &str) -> Self {
        Self {
            label: label.to_owned(),
            folder: folder.to_owned(),
        }
    }
}

/// Switch the portal to the view labelled `target`, re-load the catalog
/// root, and report whether the switch was confirmed.
///
/// A failed confirmation is recoverable: the caller logs it and may
/// keep walking whatever view is actually active.
pub async fn switch_view(
    driver: &dyn PageDriver,
    catalog_url: &str,
    target: &CatalogView,
    wait: Duration,
) -> anyhow::Result<bool> {
    tracing::info!(view = %target.label, "switching catalog view");

    driver
        .click(VIEW_TOGGLE_SELECTOR)
        .await
        .context("open view selector")?;

    click_option_by_label(driver, &target.label)
        .await
        .context("choose view option")?;
    driver
        .wait_for_selector("body", wait)
        .await
        .context("wait for view switch to load")?;

    driver
        .navigate(catalog_url)
        .await
        .context("reload catalog root")?;
    driver
        .wait_for_selector("body", wait)
        .await
        .context("wait for catalog after view switch")?;

    let active = active_view_label(driver).await.unwrap_or_default();
    let confirmed = active == target.label;
    if confirmed {
        tracing::info!(view = %target.label, "view switch confirmed");
    } else {
        tracing::warn!(expected = %target.label, observed = %active, "view switch not confirmed");
    }
    Ok(confirmed)
}

/// Click the dropdown option whose visible text matches `label`.
/// Text matching is not expressible as a CSS selector, so this runs in
/// the page.
async fn click_option_by_label(driver: &dyn PageDriver, label: &str) -> anyhow::Result<()> {
    let js = format!(
        r#"(() => {{
            const label = {label};
            const options = document.querySelectorAll({selector});
            for (const option of options) {{
                if ((option.textContent || '').trim() === label) {{
                    option.click();
                    return true;
                }}
            }}
            return false;
        }})()"#,
        label = serde_json::to_string(label)?,
        selector = serde_json::to_string(VIEW_OPTION_SELECTOR)?,
    );

    let clicked = driver.execute_script(&js).await?;
    if clicked != serde_json::Value::Bool(true) {
        anyhow::bail!("no view option labelled {label:?}");
    }
    Ok(())
}

async fn active_view_label(driver: &dyn PageDriver) -> anyhow::Result<String> {
    let js = format!(
        r#"(() => {{
            const el = document.querySelector({selector});
            return el ? (el.textContent || '').trim() : '';
        }})()"#,
        selector = serde_json::to_string(VIEW_LABEL_SELECTOR)?,
    );

    let value = driver.execute_script(&js).await?;
    Ok(value.as_str().unwrap_or_default().to_owned())
}
