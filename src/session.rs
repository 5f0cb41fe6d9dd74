//! Session establishment against the portal.
//!
//! Decided once at startup: if the sign-in form is present the session
//! needs authentication, otherwise an existing session (or the offline
//! seed page) is already usable.

use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;

use crate::config::{
    Credentials, LOGIN_EMAIL_SELECTOR, LOGIN_FORM_SELECTOR, LOGIN_PASSWORD_SELECTOR,
    LOGIN_REMEMBER_ME_SELECTOR, LOGIN_SUBMIT_SELECTOR, OFFLINE_SEED_PAGE,
};
use crate::driver::PageDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    NeedsAuthentication,
    AlreadyAuthenticated,
}

/// Load the portal (or the local seed page) and make sure the session
/// is usable, logging in when the sign-in form is present.
pub async fn establish(
    driver: &dyn PageDriver,
    credentials: &Credentials,
    portal_url: &str,
    wait: Duration,
) -> anyhow::Result<AuthState> {
    load_entry_page(driver, portal_url, wait).await?;

    let state = detect(driver).await?;
    match state {
        AuthState::NeedsAuthentication => {
            tracing::info!("sign-in form present; logging in");
            login(driver, credentials, portal_url, wait)
                .await
                .context("log in to portal")?;
            tracing::info!("login successful");
        }
        AuthState::AlreadyAuthenticated => {
            tracing::info!("no sign-in form; session already usable");
        }
    }
    Ok(state)
}

/// Prefer a local seed page over the network when one exists.
async fn load_entry_page(
    driver: &dyn PageDriver,
    portal_url: &str,
    wait: Duration,
) -> anyhow::Result<()> {
    let seed = Path::new(OFFLINE_SEED_PAGE);
    if seed.exists() {
        let absolute = std::fs::canonicalize(seed)
            .with_context(|| format!("canonicalize seed page: {}", seed.display()))?;
        let seed_url = format!("file://{}", absolute.display());
        tracing::info!(url = %seed_url, "loading offline seed page");
        driver.navigate(&seed_url).await?;
    } else {
        tracing::info!(url = %portal_url, "loading portal home");
        driver.navigate(portal_url).await?;
    }

    driver
        .wait_for_selector("body", wait)
        .await
        .context("wait for entry page body")
}

async fn detect(driver: &dyn PageDriver) -> anyhow::Result<AuthState> {
    if driver.exists(LOGIN_FORM_SELECTOR).await? {
        Ok(AuthState::NeedsAuthentication)
    } else {
        Ok(AuthState::AlreadyAuthenticated)
    }
}

async fn login(
    driver: &dyn PageDriver,
    credentials: &Credentials,
    portal_url: &str,
    wait: Duration,
) -> anyhow::Result<()> {
    driver
        .type_into(LOGIN_EMAIL_SELECTOR, &credentials.email)
        .await?;
    driver
        .type_into(LOGIN_PASSWORD_SELECTOR, &credentials.password)
        .await?;
    driver.click(LOGIN_REMEMBER_ME_SELECTOR).await?;
    driver.click(LOGIN_SUBMIT_SELECTOR).await?;

    wait_for_redirect(driver, portal_url, wait).await?;
    driver
        .wait_for_selector("body", wait)
        .await
        .context("wait for page after login")
}

/// Poll until the page has moved off `from_url`, bounded by `wait`.
async fn wait_for_redirect(
    driver: &dyn PageDriver,
    from_url: &str,
    wait: Duration,
) -> anyhow::Result<()> {
    let poll = async {
        loop {
            match driver.current_url().await {
                Ok(url) if url != from_url => return,
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
    };

    tokio::time::timeout(wait, poll)
        .await
        .map_err(|_| anyhow::anyhow!("timed out waiting for login redirect"))?;
    Ok(())
}
