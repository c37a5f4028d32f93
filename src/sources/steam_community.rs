use anyhow::Context as _;
use scraper::{ElementRef, Html, Selector};

use super::{SourceContext, COMMAND_TOKEN};
use crate::types::{truncate_description, LaunchOption};

pub const SOURCE: &str = "Steam Community";

/// A guide title must contain one of these to be worth fetching.
const GUIDE_KEYWORDS: &[&str] = &[
    "launch",
    "command",
    "option",
    "parameter",
    "argument",
    "fps",
    "performance",
];

/// At most this many guides are fetched per game, to bound request fan-out.
const MAX_GUIDES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct GuideRef {
    pub title: String,
    pub url: String,
}

/// Fetch launch options from community guides for an app.
///
/// Relevant guides are fetched one at a time (bounded to [`MAX_GUIDES`]);
/// a guide that fails to fetch or parse contributes nothing. If guides
/// existed but none yielded a concrete command, one placeholder record per
/// guide is emitted instead so the guide is still surfaced.
#[tracing::instrument(skip(ctx))]
pub async fn fetch_options(ctx: &SourceContext, app_id: u32) -> anyhow::Result<Vec<LaunchOption>> {
    ctx.throttle().await;

    let url = format!("{}/app/{}/guides/", ctx.community_base, app_id);
    tracing::debug!(%url, "fetching guide listing");

    let response = ctx
        .client
        .get(&url)
        .timeout(ctx.page_timeout)
        .send()
        .await
        .context("requesting guide listing")?;

    if !response.status().is_success() {
        tracing::warn!(status = %response.status(), "[Steam Community] failed to fetch guide listing");
        return Ok(Vec::new());
    }

    let html = response.text().await?;
    let guides = relevant_guides(&Html::parse_document(&html));
    tracing::debug!(count = guides.len(), "[Steam Community] relevant guides");

    let mut options = Vec::new();

    for guide in guides.iter().take(MAX_GUIDES) {
        ctx.throttle().await;
        match fetch_guide(ctx, guide, options.is_empty()).await {
            Ok(mut guide_options) => options.append(&mut guide_options),
            Err(e) => {
                tracing::warn!(url = %guide.url, error = %e, "[Steam Community] error processing guide");
            }
        }
    }

    // Guides existed but nothing concrete parsed: point at them instead.
    if options.is_empty() && !guides.is_empty() {
        for guide in guides.iter().take(MAX_GUIDES) {
            options.push(LaunchOption::new(
                format!("See guide: {}", guide.title),
                format!("This guide may contain launch options: {}", guide.url),
                SOURCE,
            ));
        }
    }

    if options.is_empty() {
        tracing::debug!("[Steam Community] no options found");
    } else {
        tracing::debug!(count = options.len(), "[Steam Community] extracted options");
    }

    Ok(options)
}

/// Filter the guide listing down to guides whose title suggests launch
/// options.
pub fn relevant_guides(document: &Html) -> Vec<GuideRef> {
    let guide_selector = Selector::parse("div.guide_item").unwrap();
    let title_selector = Selector::parse("div.guide_title").unwrap();
    let link_selector = Selector::parse("a").unwrap();

    let mut guides = Vec::new();

    for item in document.select(&guide_selector) {
        let Some(title_el) = item.select(&title_selector).next() else {
            continue;
        };
        let title = title_el.text().collect::<String>().trim().to_string();

        let lower = title.to_lowercase();
        if !GUIDE_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
            continue;
        }

        let Some(href) = item
            .select(&link_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };

        guides.push(GuideRef {
            title,
            url: href.to_string(),
        });
    }

    guides
}

async fn fetch_guide(
    ctx: &SourceContext,
    guide: &GuideRef,
    nothing_found_yet: bool,
) -> anyhow::Result<Vec<LaunchOption>> {
    tracing::debug!(title = %guide.title, "processing guide");

    let response = ctx
        .client
        .get(&guide.url)
        .timeout(ctx.guide_timeout)
        .send()
        .await
        .context("requesting guide page")?;

    if !response.status().is_success() {
        return Ok(Vec::new());
    }

    let html = response.text().await?;
    let document = Html::parse_document(&html);

    Ok(extract_guide_options(&document, &guide.title, nothing_found_yet))
}

/// Pull command-like tokens out of a guide body.
///
/// Code blocks are the primary signal; each command is described by the
/// nearest preceding paragraph, then the following one, then a generic
/// pointer at the guide. The plain-text fallback only runs while no
/// concrete option has been found in any guide for this game.
pub fn extract_guide_options(
    document: &Html,
    guide_title: &str,
    allow_fallback: bool,
) -> Vec<LaunchOption> {
    let body_selector = Selector::parse("div.guide_body").unwrap();
    let Some(body) = document.select(&body_selector).next() else {
        return Vec::new();
    };

    let ordered: Vec<ElementRef> = body.descendants().filter_map(ElementRef::wrap).collect();

    let mut options = Vec::new();

    for (index, block) in ordered.iter().enumerate() {
        if !matches!(block.value().name(), "code" | "pre") {
            continue;
        }

        let text = block.text().collect::<String>();
        if !(text.contains('-') || text.contains('+') || text.contains('/')) {
            continue;
        }

        let description = nearest_paragraph(&ordered, index)
            .unwrap_or_else(|| format!("Found in guide: {}", guide_title));
        let description = truncate_description(&description);

        for caps in COMMAND_TOKEN.captures_iter(&text) {
            options.push(LaunchOption::new(
                caps[1].to_string(),
                description.clone(),
                SOURCE,
            ));
        }
    }

    if options.is_empty() && allow_fallback {
        for tag in ordered
            .iter()
            .filter(|el| matches!(el.value().name(), "p" | "li"))
        {
            let text = tag.text().collect::<String>().trim().to_string();
            if !text.to_lowercase().contains("launch") {
                continue;
            }
            if !(text.contains('-') || text.contains('+') || text.contains('/')) {
                continue;
            }

            for caps in COMMAND_TOKEN.captures_iter(&text) {
                options.push(LaunchOption::new(
                    caps[1].to_string(),
                    truncate_description(&text),
                    SOURCE,
                ));
            }
        }
    }

    options
}

/// Closest `p` before the block in document order, else the next one after.
fn nearest_paragraph(ordered: &[ElementRef], block_index: usize) -> Option<String> {
    let preceding = ordered[..block_index]
        .iter()
        .rev()
        .find(|el| el.value().name() == "p");
    let following = ordered[block_index + 1..]
        .iter()
        .find(|el| el.value().name() == "p");

    preceding
        .or(following)
        .map(|p| p.text().collect::<String>().trim().to_string())
}
