use crate::fetch::{FetchChain, HttpFetcher};
use crate::html::block_text;
use anyhow::{bail, Result};
use scraper::{Html, Selector};
use search_core::ProblemRecord;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

pub const HOME: &str = "https://codeforces.com";
const API_URL: &str = "https://codeforces.com/api/problemset.problems";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    result: Option<ApiResult>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    #[serde(default)]
    problems: Vec<ApiProblem>,
}

#[derive(Debug, Deserialize)]
struct ApiProblem {
    #[serde(rename = "contestId")]
    contest_id: Option<u32>,
    index: Option<String>,
    name: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

pub struct CodeforcesOptions {
    pub limit: usize,
    pub fetch_pages: bool,
    pub pause: Duration,
}

/// Turn the problemset API payload into records (without descriptions).
/// Problems lacking a contest id or index are skipped.
pub fn parse_problemset(json: &str, limit: usize) -> Result<Vec<ProblemRecord>> {
    let resp: ApiResponse = serde_json::from_str(json)?;
    if resp.status != "OK" {
        bail!("codeforces api returned {}: {}", resp.status, resp.comment.unwrap_or_default());
    }
    let problems = resp.result.map(|r| r.problems).unwrap_or_default();
    Ok(problems
        .into_iter()
        .filter_map(|p| {
            let contest = p.contest_id?;
            let index = p.index.filter(|i| !i.is_empty())?;
            let mut rec = ProblemRecord::new(
                p.name.unwrap_or_default().trim(),
                format!("{HOME}/problemset/problem/{contest}/{index}"),
                p.tags,
            );
            rec.source = Some("codeforces".into());
            Some(rec)
        })
        .take(limit)
        .collect())
}

/// Statement text from a problem page, empty when the page has none.
pub fn extract_statement(html: &str) -> String {
    let doc = Html::parse_document(html);
    let stmt = Selector::parse("div.problem-statement").expect("valid selector");
    let blocks = Selector::parse("p, pre, li").expect("valid selector");
    match doc.select(&stmt).next() {
        Some(el) => block_text(el, &blocks, &["script", "style", "noscript"]),
        None => String::new(),
    }
}

pub async fn scrape(
    http: &HttpFetcher,
    pages: &FetchChain,
    opts: &CodeforcesOptions,
    out: &mut Vec<ProblemRecord>,
) -> Result<()> {
    tracing::info!("fetching codeforces problem list");
    let listing = http.get_text(API_URL).await?;
    let records = parse_problemset(&listing, opts.limit)?;

    let before = out.len();
    for mut rec in records {
        let mut description = String::new();
        if opts.fetch_pages {
            match pages.fetch(&rec.url).await {
                Some(html) => {
                    description = extract_statement(&html);
                    if description.is_empty() {
                        tracing::warn!(url = %rec.url, "no statement on page, storing without description");
                    }
                }
                None => tracing::warn!(url = %rec.url, "no html, storing without description"),
            }
        }
        rec.description = Some(description);
        out.push(rec);
        sleep(opts.pause).await;
    }
    tracing::info!(collected = out.len() - before, limit = opts.limit, "codeforces done");
    Ok(())
}
