use crate::fetch::FetchChain;
use crate::html::{block_text, first_match, visible_text};
use anyhow::Result;
use scraper::{Html, Selector};
use search_core::ProblemRecord;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

pub const BASE: &str = "https://www.geeksforgeeks.org";

pub struct GfgOptions {
    pub tags: Vec<String>,
    pub pages_per_tag: usize,
    pub pause: Duration,
}

pub fn tag_page_url(tag: &str, page: usize) -> String {
    format!("{BASE}/tag/{tag}/page/{page}/")
}

/// Article links on a tag listing page as (url, anchor text), first
/// occurrence only. Off-site, tag and category links are dropped.
pub fn extract_article_links(html: &str) -> Vec<(String, String)> {
    let doc = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").expect("valid selector");
    let base = Url::parse(BASE).expect("valid base url");

    let mut seen: HashSet<String> = HashSet::new();
    let mut links = Vec::new();
    for a in doc.select(&anchors) {
        let Some(href) = a.value().attr("href") else { continue };
        let href = if href.starts_with('/') {
            match base.join(href) {
                Ok(u) => u.to_string(),
                Err(_) => continue,
            }
        } else {
            href.to_string()
        };
        if !href.starts_with(BASE) || href.contains("/tag/") || href.contains("/category/") {
            continue;
        }
        if seen.insert(href.clone()) {
            links.push((href, a.text().collect::<String>().trim().to_string()));
        }
    }
    links
}

/// Title and body text of an article page. The title falls back to the
/// anchor text the article was linked with.
pub fn parse_article(html: &str, anchor_text: &str) -> (String, String) {
    let doc = Html::parse_document(html);
    let h1 = Selector::parse("h1").expect("valid selector");
    let entry_content = Selector::parse("div.entry-content").expect("valid selector");
    let entry = Selector::parse("div.entry").expect("valid selector");
    let blocks = Selector::parse("p, li, pre").expect("valid selector");

    let title = doc
        .select(&h1)
        .next()
        .map(|el| visible_text(el, &[]))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| anchor_text.to_string());
    let description = first_match(&doc, &[&entry_content, &entry])
        .map(|el| block_text(el, &blocks, &["script", "style", "aside", "figure"]))
        .unwrap_or_default();
    (title, description)
}

pub async fn scrape(pages: &FetchChain, opts: &GfgOptions, out: &mut Vec<ProblemRecord>) -> Result<()> {
    let before = out.len();
    for tag in &opts.tags {
        for page in 1..=opts.pages_per_tag {
            let listing_url = tag_page_url(tag, page);
            tracing::info!(url = %listing_url, "fetching gfg tag page");
            // plain HTTP only: the browser fallback is too slow for listings
            let Some(listing) = pages.fetch_with(&listing_url, 1).await else {
                tracing::warn!(url = %listing_url, "failed to get tag page, skipping");
                continue;
            };
            for (href, anchor_text) in extract_article_links(&listing) {
                let Some(article) = pages.fetch_with(&href, 1).await else {
                    tracing::warn!(url = %href, "skipping article, no html");
                    continue;
                };
                let (title, description) = parse_article(&article, &anchor_text);
                let mut rec = ProblemRecord::new(title, href, vec![tag.clone()]);
                rec.description = Some(description);
                rec.source = Some("geeksforgeeks".into());
                out.push(rec);
                sleep(opts.pause).await;
            }
        }
    }
    tracing::info!(collected = out.len() - before, "geeksforgeeks done");
    Ok(())
}
