//! Presentation fixes applied to a loaded page before it is snapshotted.
//!
//! Three passes, in order: external stylesheets are fetched and inlined,
//! `@media print` scoping is neutralized so print-only rules cannot hide
//! content in the static snapshot, and `@media screen` rules are
//! promoted to also apply under `print`. The media rewrites are plain
//! text transformations applied to stylesheet text in Rust; injected
//! script is only used to swap DOM nodes. Every pass is best-effort: a
//! failure is logged and must not block serialization.

use std::time::Duration;

use anyhow::Context as _;
use scraper::{Html, Selector};
use url::Url;

use crate::driver::PageDriver;

/// Scope token substituted for the `print` media type. Unknown media
/// types never match, so neutralized rules go dormant without being
/// removed from the document.
const NEUTRALIZED_PRINT_TOKEN: &str = "noprint";

const STYLESHEET_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Apply all normalization passes in-place to the currently loaded page.
pub async fn normalize(driver: &dyn PageDriver) -> anyhow::Result<()> {
    if let Err(err) = inline_external_stylesheets(driver).await {
        tracing::warn!(?err, "stylesheet inlining failed; continuing");
    }
    if let Err(err) = rewrite_inline_style_blocks(driver).await {
        tracing::warn!(?err, "inline style rewrite failed; continuing");
    }
    Ok(())
}

/// Fetch every external stylesheet referenced by the document and
/// replace the reference with an inline style block carrying the sheet
/// text (media rules already rewritten).
///
/// Each fetch is awaited before the replacement runs, so serialization
/// never races an in-flight fetch. A failed fetch only skips that sheet.
async fn inline_external_stylesheets(driver: &dyn PageDriver) -> anyhow::Result<()> {
    let markup = driver.page_markup().await.context("read page markup")?;
    let base_url = driver.current_url().await.context("read current url")?;
    let hrefs = stylesheet_hrefs(&markup);
    if hrefs.is_empty() {
        return Ok(());
    }

    let client = reqwest::Client::builder()
        .timeout(STYLESHEET_FETCH_TIMEOUT)
        .build()
        .context("build stylesheet http client")?;

    for href in hrefs {
        let resolved = match resolve_href(&base_url, &href) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(?err, href = %href, "cannot resolve stylesheet href; skipping");
                continue;
            }
        };

        let css = match fetch_stylesheet(&client, &resolved).await {
            Ok(css) => css,
            Err(err) => {
                tracing::warn!(?err, url = %resolved, "stylesheet fetch failed; skipping");
                continue;
            }
        };

        let css = rewrite_media_rules(&css);
        replace_link_with_style(driver, &href, &css)
            .await
            .with_context(|| format!("inline stylesheet {href}"))?;
        tracing::debug!(href = %href, bytes = css.len(), "inlined stylesheet");
    }

    Ok(())
}

/// Collect `href` attributes of stylesheet links in document order.
fn stylesheet_hrefs(markup: &str) -> Vec<String> {
    let document = Html::parse_document(markup);
    let selector =
        Selector::parse(r#"link[rel="stylesheet"]"#).expect("stylesheet selector is valid");

    document
        .select(&selector)
        .filter_map(|link| link.value().attr("href"))
        .map(str::to_owned)
        .collect()
}

fn resolve_href(base_url: &str, href: &str) -> anyhow::Result<Url> {
    let base = Url::parse(base_url).with_context(|| format!("parse base url: {base_url}"))?;
    base.join(href).with_context(|| format!("join href: {href}"))
}

pub async fn fetch_stylesheet(client: &reqwest::Client, url: &Url) -> anyhow::Result<String> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;

    if !response.status().is_success() {
        anyhow::bail!("stylesheet fetch failed ({}): {url}", response.status());
    }

    response.text().await.context("read stylesheet body")
}

async fn replace_link_with_style(
    driver: &dyn PageDriver,
    href: &str,
    css: &str,
) -> anyhow::Result<()> {
    let js = format!(
        r#"(() => {{
            const href = {href};
            const css = {css};
            const links = document.querySelectorAll('link[rel="stylesheet"]');
            for (const link of links) {{
                if (link.getAttribute('href') !== href) continue;
                const style = document.createElement('style');
                style.type = 'text/css';
                style.appendChild(document.createTextNode(css));
                link.parentNode.replaceChild(style, link);
            }}
        }})()"#,
        href = serde_json::to_string(href)?,
        css = serde_json::to_string(css)?,
    );
    driver.execute_script(&js).await?;
    Ok(())
}

/// Rewrite media rules inside style blocks that were already inline in
/// the document (the inlining pass only covers fetched sheets).
async fn rewrite_inline_style_blocks(driver: &dyn PageDriver) -> anyhow::Result<()> {
    let value = driver
        .execute_script(
            "Array.from(document.querySelectorAll('style')).map(s => s.textContent || '')",
        )
        .await
        .context("collect inline style blocks")?;

    let texts: Vec<String> =
        serde_json::from_value(value).context("decode inline style blocks")?;

    let rewritten: Vec<serde_json::Value> = texts
        .iter()
        .map(|css| {
            let out = rewrite_media_rules(css);
            if out == *css {
                serde_json::Value::Null
            } else {
                serde_json::Value::String(out)
            }
        })
        .collect();

    if rewritten.iter().all(serde_json::Value::is_null) {
        return Ok(());
    }

    let js = format!(
        r#"(() => {{
            const texts = {texts};
            const styles = document.querySelectorAll('style');
            for (let i = 0; i < styles.length && i < texts.length; i++) {{
                if (texts[i] !== null) styles[i].textContent = texts[i];
            }}
        }})()"#,
        texts = serde_json::Value::Array(rewritten),
    );
    driver
        .execute_script(&js)
        .await
        .context("write back inline style blocks")?;
    Ok(())
}

/// Rewrite the media-query lists of every `@media` rule in `css`.
///
/// `print` queries are scoped to a token that never matches, and
/// `screen` queries gain a `print` twin so the archived page renders the
/// same on screen and on paper.
pub fn rewrite_media_rules(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;

    while let Some(at) = rest.find("@media") {
        let (before, from_at) = rest.split_at(at);
        out.push_str(before);

        let Some(brace) = from_at.find('{') else {
            out.push_str(from_at);
            return out;
        };

        let query = &from_at["@media".len()..brace];
        out.push_str("@media");
        out.push_str(&rewrite_query_list(query));
        rest = &from_at[brace..];
    }

    out.push_str(rest);
    out
}

fn rewrite_query_list(list: &str) -> String {
    list.split(',')
        .map(rewrite_query)
        .collect::<Vec<_>>()
        .join(",")
}

/// Rewrite one media query. Leading/trailing whitespace is preserved so
/// the stylesheet text stays byte-stable everywhere else.
fn rewrite_query(query: &str) -> String {
    let trimmed_start = query.trim_start();
    let leading = &query[..query.len() - trimmed_start.len()];
    let trimmed = trimmed_start.trim_end();
    let trailing = &trimmed_start[trimmed.len()..];

    let (only_prefix, body) = match trimmed.strip_prefix("only ") {
        Some(rest) => ("only ", rest.trim_start()),
        None => ("", trimmed),
    };

    let rewritten = if let Some(rest) = strip_media_type(body, "print") {
        format!("{only_prefix}{NEUTRALIZED_PRINT_TOKEN}{rest}")
    } else if let Some(rest) = strip_media_type(body, "screen") {
        if rest.is_empty() {
            // Plain `screen` becomes a two-query list; `print` comes
            // first so no literal `@media print` prefix survives.
            format!("{only_prefix}screen,{leading}print")
        } else {
            format!("{only_prefix}screen{rest},{leading}{only_prefix}print{rest}")
        }
    } else {
        return query.to_owned();
    };

    format!("{leading}{rewritten}{trailing}")
}

/// If `query` starts with the media type `name` at a token boundary,
/// return the remainder (conditions such as ` and (max-width: …)`).
fn strip_media_type<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    let rest = query.strip_prefix(name)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_rules_are_neutralized() {
        let css = "@media print { body { display: none; } }";
        let out = rewrite_media_rules(css);
        assert!(!out.contains("@media print"));
        assert!(out.contains("@media noprint {"));
        assert!(out.contains("body { display: none; }"));
    }

    #[test]
    fn screen_rules_gain_a_print_twin() {
        let css = "@media screen { body { color: blue; } }";
        let out = rewrite_media_rules(css);
        assert!(!out.contains("@media print"));
        assert!(out.contains("screen"));
        assert!(out.contains("print"));
        assert!(out.contains("body { color: blue; }"));
    }

    #[test]
    fn conditioned_queries_keep_their_conditions() {
        let css = "@media screen and (max-width: 600px) { .nav { display: none; } }";
        let out = rewrite_media_rules(css);
        assert!(out.contains("screen and (max-width: 600px)"));
        assert!(out.contains("print and (max-width: 600px)"));

        let css = "@media print and (orientation: portrait) { p { margin: 0; } }";
        let out = rewrite_media_rules(css);
        assert!(out.contains("noprint and (orientation: portrait)"));
        assert!(!out.contains("@media print"));
    }

    #[test]
    fn mixed_block_round_trip() {
        let css = "@media print { .screen-only { display: none; } }\n\
                   @media screen { .content { font-size: 14px; } }";
        let out = rewrite_media_rules(css);
        assert!(!out.contains("@media print"));
        assert!(out.contains(".screen-only { display: none; }"));
        assert!(out.contains("screen, print"));
        assert!(out.contains(".content { font-size: 14px; }"));
    }

    #[test]
    fn unrelated_rules_are_untouched() {
        let css = "body { color: red; } @media (max-width: 100px) { a { color: green; } }";
        assert_eq!(rewrite_media_rules(css), css);

        let css = "@media speech { a { color: green; } }";
        assert_eq!(rewrite_media_rules(css), css);
    }

    #[test]
    fn query_lists_are_rewritten_per_query() {
        let css = "@media print, screen { body { margin: 0; } }";
        let out = rewrite_media_rules(css);
        assert!(out.contains("noprint"));
        assert!(!out.contains("@media print"));
        assert!(out.contains("screen"));
    }

    #[test]
    fn only_prefix_is_respected() {
        let css = "@media only screen { body { margin: 0; } }";
        let out = rewrite_media_rules(css);
        assert!(out.contains("only screen"));
        assert!(out.contains("print"));
        assert!(!out.contains("@media print"));
    }

    #[test]
    fn media_without_brace_is_left_alone() {
        let css = "@media print";
        assert_eq!(rewrite_media_rules(css), css);
    }

    #[test]
    fn stylesheet_hrefs_come_back_in_document_order() {
        let markup = r#"<html><head>
            <link rel="stylesheet" href="/a.css">
            <link rel="icon" href="/favicon.ico">
            <link rel="stylesheet" href="https://cdn.example.com/b.css">
        </head><body></body></html>"#;
        assert_eq!(
            stylesheet_hrefs(markup),
            vec!["/a.css".to_owned(), "https://cdn.example.com/b.css".to_owned()]
        );
    }

    #[test]
    fn hrefs_resolve_against_the_page_url() -> anyhow::Result<()> {
        let url = resolve_href("https://portal.example.com/projects/current", "/assets/app.css")?;
        assert_eq!(url.as_str(), "https://portal.example.com/assets/app.css");

        let url = resolve_href("https://portal.example.com/projects/", "app.css")?;
        assert_eq!(url.as_str(), "https://portal.example.com/projects/app.css");
        Ok(())
    }
}
