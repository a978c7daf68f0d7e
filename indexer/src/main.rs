use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use search_core::persist::{load_index, save_index, IndexPaths};
use search_core::{build_with, parse_corpus, Analyzer, ProblemRecord};
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build the TF-IDF search index over scraped problems", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a corpus JSON array (or a directory of them)
    Build {
        /// Input path (file or directory)
        #[arg(long, default_value = "problems.json")]
        input: String,
        /// Output index directory
        #[arg(long, default_value = "./processed")]
        output: String,
        /// Stem tokens (Snowball English) before indexing
        #[arg(long, default_value_t = false)]
        stem: bool,
    },
    /// Load an index directory and print its shape
    Inspect {
        #[arg(long, default_value = "./processed")]
        index: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, stem } => {
            let analyzer = if stem { Analyzer::stemming() } else { Analyzer::default() };
            build_index(Path::new(&input), &output, analyzer)
        }
        Commands::Inspect { index } => inspect(&index),
    }
}

fn build_index(input: &Path, output: &str, analyzer: Analyzer) -> Result<()> {
    let records = read_corpus(input)?;
    tracing::info!(num_records = records.len(), "loaded problems");

    let index = build_with(&records, analyzer)?;
    tracing::info!(
        rows = index.matrix.num_rows,
        vocabulary = index.model.vocabulary_size(),
        stored = index.matrix.data.len(),
        "built tf-idf matrix"
    );

    save_index(&IndexPaths::new(output), &index)?;
    tracing::info!(output, "index build complete");
    Ok(())
}

/// Read one corpus file, or every `.json` file under a directory in path
/// order. Later duplicates of a url are dropped.
fn read_corpus(input: &Path) -> Result<Vec<ProblemRecord>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("json") {
                files.push(p.to_path_buf());
            }
        }
    } else {
        files.push(input.to_path_buf());
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::new();
    for file in files {
        let text = fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
        let parsed = parse_corpus(&text).with_context(|| format!("parsing {}", file.display()))?;
        let before = records.len();
        for r in parsed {
            if seen.insert(r.url.clone()) {
                records.push(r);
            }
        }
        tracing::debug!(file = %file.display(), added = records.len() - before, "read corpus file");
    }
    Ok(records)
}

fn inspect(index: &str) -> Result<()> {
    let idx = load_index(&IndexPaths::new(index))?;
    println!(
        "records={} vocabulary={} stored_weights={} stemming={}",
        idx.records.len(),
        idx.model.vocabulary_size(),
        idx.matrix.data.len(),
        idx.model.analyzer.stem
    );
    Ok(())
}
