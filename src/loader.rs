//! Document loaders: markdown files, PDFs, and scraped web pages.
//!
//! Loaders return plain UTF-8 text. Markdown is read as-is; PDF text comes
//! out of `pdf-extract` with page breaks as newlines; web pages go through
//! a main-content extraction that drops navigation, chrome, and scripts.
//!
//! File loaders fail with an extraction error the pipeline records as a
//! failed source. Web scraping never errors for network problems; it
//! yields empty text, which the pipeline records as a skipped source.

use std::path::Path;
use std::time::Duration;

use scraper::{ElementRef, Html, Selector};

use crate::error::{Error, Result};

/// Read a markdown (or plain-text) file.
pub fn load_markdown(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::Extraction {
        origin: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Extract the text of every page in a PDF, joined with newlines.
pub fn load_pdf(path: &Path) -> Result<String> {
    pdf_extract::extract_text(path).map_err(|e| Error::Extraction {
        origin: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Fetch `url` and extract its main textual content. Returns an empty
/// string when the page cannot be fetched, the response is not a success,
/// or no readable text remains after stripping boilerplate.
pub async fn scrape_web(url: &str, timeout: Duration) -> String {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(_) => return String::new(),
    };
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(_) => return String::new(),
    };
    if !response.status().is_success() {
        return String::new();
    }
    let html = match response.text().await {
        Ok(html) => html,
        Err(_) => return String::new(),
    };
    extract_main_text(&html)
}

/// Text-bearing block elements collected from the content root.
const TEXT_BLOCKS: &str = "h1, h2, h3, h4, h5, h6, p, li, pre, blockquote, td";

/// Pull readable text out of an HTML document. Prefers `<article>` over
/// `<main>` over `<body>` as the content root and skips anything nested
/// in nav/header/footer/aside.
pub fn extract_main_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let block_selector = match Selector::parse(TEXT_BLOCKS) {
        Ok(selector) => selector,
        Err(_) => return String::new(),
    };

    for root in ["article", "main", "body"] {
        let root_selector = match Selector::parse(root) {
            Ok(selector) => selector,
            Err(_) => continue,
        };
        let Some(root_el) = document.select(&root_selector).next() else {
            continue;
        };

        let mut parts: Vec<String> = Vec::new();
        for el in root_el.select(&block_selector) {
            if in_chrome(el) {
                continue;
            }
            let text = collapse_whitespace(el.text());
            if !text.is_empty() {
                parts.push(text);
            }
        }
        if !parts.is_empty() {
            return parts.join("\n\n");
        }
    }

    String::new()
}

/// True when the element sits inside page chrome rather than content.
fn in_chrome(el: ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| {
            matches!(
                ancestor.value().name(),
                "nav" | "header" | "footer" | "aside" | "script" | "style"
            )
        })
}

fn collapse_whitespace<'a>(fragments: impl Iterator<Item = &'a str>) -> String {
    let joined: String = fragments.collect::<Vec<_>>().join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a urls file: one URL per line, blank lines and `#` comments
/// ignored. A missing file is simply no URLs.
pub fn read_urls_file(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
