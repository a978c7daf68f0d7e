use anyhow::{Context, Result};
use search_core::ProblemRecord;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Drop records the indexer would reject (blank url or title) and keep the
/// first record seen for each url.
pub fn prepare_corpus(records: Vec<ProblemRecord>) -> Vec<ProblemRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    records
        .into_iter()
        .filter(|r| {
            if r.url.trim().is_empty() {
                tracing::warn!(title = %r.title, "dropping record without url");
                return false;
            }
            if r.title.trim().is_empty() {
                tracing::warn!(url = %r.url, "dropping record without title");
                return false;
            }
            seen.insert(r.url.clone())
        })
        .collect()
}

pub fn write_corpus(path: &Path, records: &[ProblemRecord]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut out = BufWriter::new(File::create(path).with_context(|| format!("creating {}", path.display()))?);
    serde_json::to_writer_pretty(&mut out, records)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}
