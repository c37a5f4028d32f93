use std::collections::HashSet;

use anyhow::Context as _;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{SourceContext, COMMAND_TOKEN, NO_DESCRIPTION};
use crate::types::LaunchOption;

pub const SOURCE: &str = "PCGamingWiki";

/// Section anchors that may hold launch options, in the order the wiki
/// tends to use them.
const SECTION_IDS: &[&str] = &[
    "Command_line_arguments",
    "Launch_options",
    "Launch_commands",
    "Parameters",
    "Launch_parameters",
    "Command-line_arguments",
    "Command_line_parameters",
    "Steam_launch_options",
];

static LIST_COMMAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{1,2}\w+").unwrap());

/// Format a game title the way PCGamingWiki page URLs expect.
pub fn format_title_for_wiki(title: &str) -> String {
    let formatted = title
        .replace(' ', "_")
        .replace(':', "")
        .replace('&', "and")
        .replace('\'', "")
        .replace('-', "_");
    urlencoding::encode(&formatted).into_owned()
}

/// Fetch launch options from the game's wiki page.
///
/// A 404 is retried once with the title truncated at the first colon, since
/// subtitled releases are often filed under the base title. Any other
/// non-success status yields an empty set.
#[tracing::instrument(skip(ctx))]
pub async fn fetch_options(ctx: &SourceContext, game_title: &str) -> anyhow::Result<Vec<LaunchOption>> {
    ctx.throttle().await;

    let mut title = game_title.to_string();
    let mut retried = false;

    loop {
        let url = format!("{}/{}", ctx.wiki_base, format_title_for_wiki(&title));
        tracing::debug!(%url, "fetching wiki page");

        let response = ctx
            .client
            .get(&url)
            .timeout(ctx.page_timeout)
            .send()
            .await
            .context("requesting wiki page")?;

        let status = response.status();

        if status.is_success() {
            let html = response.text().await?;
            let options = extract_options(&Html::parse_document(&html));

            if options.is_empty() {
                tracing::debug!("[PCGamingWiki] no options found on page");
            } else {
                tracing::debug!(count = options.len(), "[PCGamingWiki] extracted options");
            }

            return Ok(options);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            if !retried {
                if let Some((base, _)) = title.split_once(':') {
                    let base = base.trim().to_string();
                    if !base.is_empty() {
                        tracing::debug!(base_title = %base, "page not found, retrying with base title");
                        title = base;
                        retried = true;
                        continue;
                    }
                }
            }
            tracing::debug!("[PCGamingWiki] no page for this title");
            return Ok(Vec::new());
        }

        tracing::warn!(%status, "[PCGamingWiki] unexpected response status");
        return Ok(Vec::new());
    }
}

/// Extraction strategies in strict fallback order; the first one that
/// yields anything wins.
pub fn extract_options(document: &Html) -> Vec<LaunchOption> {
    let strategies: [fn(&Html) -> Vec<LaunchOption>; 4] = [
        extract_from_section_tables,
        extract_from_section_lists,
        extract_from_code_blocks,
        extract_from_text_patterns,
    ];

    for strategy in strategies {
        let options = strategy(document);
        if !options.is_empty() {
            return options;
        }
    }

    Vec::new()
}

/// Anchor ids sit on a `span` inside the actual heading element.
fn section_anchor<'a>(document: &'a Html, section_id: &str) -> Option<ElementRef<'a>> {
    let id_selector = Selector::parse("[id]").unwrap();
    document
        .select(&id_selector)
        .find(|el| el.value().attr("id") == Some(section_id))
}

/// All elements after `anchor` in document order.
fn elements_after<'a>(document: &'a Html, anchor: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    let anchor_id = anchor.id();
    document
        .root_element()
        .descendants()
        .skip_while(move |node| node.id() != anchor_id)
        .skip(1)
        .filter_map(ElementRef::wrap)
}

fn text_of(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn has_class(el: &ElementRef, class_name: &str) -> bool {
    el.value()
        .attr("class")
        .map_or(false, |classes| classes.split_whitespace().any(|c| c == class_name))
}

/// Strategy 1: wikitable rows under a known section heading.
fn extract_from_section_tables(document: &Html) -> Vec<LaunchOption> {
    let row_selector = Selector::parse("tr").unwrap();
    let cell_selector = Selector::parse("td").unwrap();

    let mut options = Vec::new();

    for section_id in SECTION_IDS {
        let Some(anchor) = section_anchor(document, section_id) else {
            continue;
        };
        let Some(heading) = anchor.parent().and_then(ElementRef::wrap) else {
            continue;
        };
        if !heading.value().name().starts_with('h') {
            continue;
        }

        let Some(table) = elements_after(document, heading).find(|el| el.value().name() == "table")
        else {
            continue;
        };
        if !has_class(&table, "wikitable") {
            continue;
        }

        // First row is the header.
        for row in table.select(&row_selector).skip(1) {
            let cells: Vec<_> = row.select(&cell_selector).collect();
            if cells.len() < 2 {
                continue;
            }
            let command = text_of(&cells[0]);
            if command.is_empty() {
                continue;
            }
            options.push(LaunchOption::new(command, text_of(&cells[1]), SOURCE));
        }
    }

    options
}

/// Strategy 2: list items under a known section heading.
fn extract_from_section_lists(document: &Html) -> Vec<LaunchOption> {
    let item_selector = Selector::parse("li").unwrap();

    let mut options = Vec::new();

    for section_id in SECTION_IDS {
        let Some(anchor) = section_anchor(document, section_id) else {
            continue;
        };
        let Some(heading) = anchor.parent().and_then(ElementRef::wrap) else {
            continue;
        };

        let Some(list) =
            elements_after(document, heading).find(|el| matches!(el.value().name(), "ul" | "ol"))
        else {
            continue;
        };

        for item in list.select(&item_selector) {
            let text = text_of(&item);
            if text.is_empty() {
                continue;
            }
            let (command, description) = split_list_item(&text);
            if command.trim().is_empty() {
                continue;
            }
            options.push(LaunchOption::new(command, description, SOURCE));
        }
    }

    options
}

/// Split a list item into command and description.
fn split_list_item(text: &str) -> (String, String) {
    for separator in [":", " - ", " \u{2013} "] {
        if let Some((command, description)) = text.split_once(separator) {
            return (command.trim().to_string(), description.trim().to_string());
        }
    }

    if let Some(m) = LIST_COMMAND.find(text) {
        let command = m.as_str().to_string();
        let description = text.replace(&command, "").trim().to_string();
        return (command, description);
    }

    (text.to_string(), NO_DESCRIPTION.to_string())
}

/// Strategy 3: code/pre blocks that look like command lines.
fn extract_from_code_blocks(document: &Html) -> Vec<LaunchOption> {
    let block_selector = Selector::parse("code, pre").unwrap();

    let mut options = Vec::new();

    for block in document.select(&block_selector) {
        let text = text_of(&block);
        if !(text.starts_with('-') || text.starts_with('/') || text.starts_with('+')) {
            continue;
        }

        let parent_text = block
            .parent()
            .and_then(ElementRef::wrap)
            .map(|parent| text_of(&parent))
            .unwrap_or_default();

        let description = if parent_text.len() > text.len() {
            parent_text.replacen(&text, "", 1).trim().to_string()
        } else {
            NO_DESCRIPTION.to_string()
        };

        options.push(LaunchOption::new(text, description, SOURCE));
    }

    options
}

/// Strategy 4: regex sweep of paragraph and list text for command-like
/// tokens, deduplicated by exact command string.
fn extract_from_text_patterns(document: &Html) -> Vec<LaunchOption> {
    let text_selector = Selector::parse("p, li").unwrap();

    let mut seen = HashSet::new();
    let mut options = Vec::new();

    for tag in document.select(&text_selector) {
        let text = tag.text().collect::<String>();
        for caps in COMMAND_TOKEN.captures_iter(&text) {
            let command = caps[1].to_string();
            if seen.insert(command.clone()) {
                options.push(LaunchOption::new(command, text.trim().to_string(), SOURCE));
            }
        }
    }

    options
}
