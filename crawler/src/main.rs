use anyhow::Result;
use clap::Parser;
use search_core::ProblemRecord;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

mod codeforces;
mod corpus;
mod fetch;
mod gfg;
mod html;

use codeforces::CodeforcesOptions;
use fetch::{BrowserFetcher, FetchChain, HttpFetcher};
use gfg::GfgOptions;

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Scrape Codeforces and GeeksforGeeks problems into a corpus JSON file")]
struct Cli {
    /// Output JSON file path
    #[arg(long, default_value = "problems.json")]
    output: PathBuf,
    /// How many Codeforces problems to take from the API listing
    #[arg(long, default_value_t = 50)]
    cf_limit: usize,
    /// Fetch each Codeforces problem page for its statement
    #[arg(long, default_value_t = false)]
    cf_fetch_pages: bool,
    /// GeeksforGeeks tags to crawl
    #[arg(long, value_delimiter = ',', default_value = "arrays,dynamic-programming,graph,greedy")]
    gfg_tags: Vec<String>,
    /// Listing pages to crawl per GeeksforGeeks tag
    #[arg(long, default_value_t = 2)]
    gfg_pages: usize,
    /// Pause between Codeforces problems (ms)
    #[arg(long, default_value_t = 150)]
    pause_short_ms: u64,
    /// Pause between GeeksforGeeks articles (ms)
    #[arg(long, default_value_t = 300)]
    pause_long_ms: u64,
    /// Request timeout seconds
    #[arg(long, default_value_t = 20)]
    timeout_secs: u64,
    /// Headless browser command used when plain HTTP is blocked,
    /// e.g. "chromium --headless --dump-dom" (the url is appended)
    #[arg(long)]
    browser_cmd: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let timeout = Duration::from_secs(args.timeout_secs);
    let http = HttpFetcher::new(timeout)?;
    http.warm_up(codeforces::HOME).await;
    let mut pages = FetchChain::new().with(http.clone());
    if let Some(cmd) = &args.browser_cmd {
        pages = pages.with(BrowserFetcher::from_command_line(cmd, timeout * 3 / 2)?);
    }

    let cf = CodeforcesOptions {
        limit: args.cf_limit,
        fetch_pages: args.cf_fetch_pages,
        pause: Duration::from_millis(args.pause_short_ms),
    };
    let gg = GfgOptions {
        tags: args.gfg_tags.clone(),
        pages_per_tag: args.gfg_pages,
        pause: Duration::from_millis(args.pause_long_ms),
    };

    tracing::info!(output = %args.output.display(), "starting scraping run");
    let mut collected: Vec<ProblemRecord> = Vec::new();
    let finished = finished_before_interrupt(
        scrape_all(&http, &pages, &cf, &gg, &mut collected),
        tokio::signal::ctrl_c(),
    )
    .await;

    let records = corpus::prepare_corpus(collected);
    corpus::write_corpus(&args.output, &records)?;
    if !finished {
        tracing::warn!(saved = records.len(), output = %args.output.display(), "interrupted, partial results saved");
        std::process::exit(1);
    }
    tracing::info!(total = records.len(), output = %args.output.display(), "saved deduplicated problems");
    Ok(())
}

/// True when `work` completes, false when `interrupt` fires first. An
/// interrupt source that fails to install never ends the run.
async fn finished_before_interrupt(
    work: impl Future<Output = ()>,
    interrupt: impl Future<Output = std::io::Result<()>>,
) -> bool {
    tokio::select! {
        _ = work => true,
        Ok(()) = interrupt => false,
    }
}

/// Codeforces first, then GeeksforGeeks. A failing source is logged and
/// skipped so the other still contributes.
async fn scrape_all(
    http: &HttpFetcher,
    pages: &FetchChain,
    cf: &CodeforcesOptions,
    gg: &GfgOptions,
    out: &mut Vec<ProblemRecord>,
) {
    if let Err(e) = codeforces::scrape(http, pages, cf, out).await {
        tracing::error!(error = %e, "failed to fetch codeforces problems");
    }
    if let Err(e) = gfg::scrape(pages, gg, out).await {
        tracing::error!(error = %e, "failed to fetch geeksforgeeks problems");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::{pending, ready};
    use std::io;

    #[tokio::test]
    async fn failed_signal_handler_does_not_interrupt() {
        let interrupt = ready(Err(io::Error::other("no signal handler")));
        assert!(finished_before_interrupt(async {}, interrupt).await);
    }

    #[tokio::test]
    async fn ctrl_c_interrupts_unfinished_work() {
        assert!(!finished_before_interrupt(pending::<()>(), ready(Ok(()))).await);
    }
}
