use crate::index::PersistedIndex;
use crate::matrix::TermMatrix;
use crate::vectorizer::TfidfModel;
use crate::ProblemRecord;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;
const GENERATION_PREFIX: &str = "gen-";

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_records: usize,
    pub vocabulary_size: usize,
    pub created_at: String,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn model(&self) -> PathBuf { self.root.join("model.bin") }
    fn matrix(&self) -> PathBuf { self.root.join("matrix.bin") }
    fn records(&self) -> PathBuf { self.root.join("records.json") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }

    fn current(&self) -> PathBuf { self.root.join("CURRENT") }
    fn current_tmp(&self) -> PathBuf { self.root.join(format!(".CURRENT.{}.tmp", std::process::id())) }
    fn generation(&self, name: &str) -> IndexPaths { IndexPaths::new(self.root.join(name)) }
}

pub fn save_model(paths: &IndexPaths, model: &TfidfModel) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.model())?;
    let bytes = bincode::serialize(model)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_model(paths: &IndexPaths) -> Result<TfidfModel> {
    let mut f = File::open(paths.model())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let model = bincode::deserialize(&buf)?;
    Ok(model)
}

pub fn save_matrix(paths: &IndexPaths, matrix: &TermMatrix) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.matrix())?;
    let bytes = bincode::serialize(matrix)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_matrix(paths: &IndexPaths) -> Result<TermMatrix> {
    let mut f = File::open(paths.matrix())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let matrix = bincode::deserialize(&buf)?;
    Ok(matrix)
}

pub fn save_records(paths: &IndexPaths, records: &[ProblemRecord]) -> Result<()> {
    create_dir_all(&paths.root)?;
    let f = BufWriter::new(File::create(paths.records())?);
    serde_json::to_writer_pretty(f, records)?;
    Ok(())
}

pub fn load_records(paths: &IndexPaths) -> Result<Vec<ProblemRecord>> {
    let f = BufReader::new(File::open(paths.records())?);
    let records = serde_json::from_reader(f)?;
    Ok(records)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Write the index into a fresh generation directory under `paths.root`, then
/// point `CURRENT` at it with a single rename. Readers resolve `CURRENT` once
/// and load every file from that generation, so they see the old or the new
/// index and never a mix. If anything fails, `CURRENT` is left untouched.
pub fn save_index(paths: &IndexPaths, index: &PersistedIndex) -> Result<()> {
    create_dir_all(&paths.root)?;
    let name = format!(
        "{GENERATION_PREFIX}{:024}-{}",
        time::OffsetDateTime::now_utc().unix_timestamp_nanos(),
        std::process::id()
    );
    let generation = paths.generation(&name);

    if let Err(e) = write_all(&generation, index).and_then(|_| switch_current(paths, &name)) {
        let _ = fs::remove_dir_all(&generation.root);
        return Err(e);
    }
    tracing::debug!(generation = %name, root = %paths.root.display(), "index installed");

    prune_generations(paths, &name);
    Ok(())
}

fn switch_current(paths: &IndexPaths, name: &str) -> Result<()> {
    let tmp = paths.current_tmp();
    let written = File::create(&tmp).and_then(|mut f| {
        f.write_all(name.as_bytes())?;
        f.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("writing {}", tmp.display()));
    }
    fs::rename(&tmp, paths.current()).with_context(|| format!("switching {}", paths.current().display()))
}

/// Remove old generations, keeping `current` and the one before it for
/// readers that resolved `CURRENT` just before the switch.
fn prune_generations(paths: &IndexPaths, current: &str) {
    let Ok(entries) = fs::read_dir(&paths.root) else { return };
    let mut older: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.starts_with(GENERATION_PREFIX) && n != current)
        .collect();
    older.sort();
    older.pop();
    for name in older {
        if let Err(e) = fs::remove_dir_all(paths.root.join(&name)) {
            tracing::warn!(generation = %name, error = %e, "failed to remove old index generation");
        }
    }
}

/// Directory holding the live index files: the generation named by
/// `CURRENT`, or `paths.root` itself for a flat layout without a pointer.
pub fn current_generation(paths: &IndexPaths) -> Result<IndexPaths> {
    let pointer = paths.current();
    if !pointer.exists() {
        return Ok(IndexPaths::new(&paths.root));
    }
    let name = fs::read_to_string(&pointer).with_context(|| format!("reading {}", pointer.display()))?;
    let name = name.trim();
    if !name.starts_with(GENERATION_PREFIX) || name.contains(['/', '\\']) {
        bail!("{} names an invalid generation {name:?}", pointer.display());
    }
    Ok(paths.generation(name))
}

fn write_all(paths: &IndexPaths, index: &PersistedIndex) -> Result<()> {
    save_model(paths, &index.model)?;
    save_matrix(paths, &index.matrix)?;
    save_records(paths, &index.records)?;
    let meta = MetaFile {
        num_records: index.records.len(),
        vocabulary_size: index.model.vocabulary_size(),
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        version: FORMAT_VERSION,
    };
    save_meta(paths, &meta)
}

/// Load the model, matrix and records of the current generation together and
/// cross-check them.
pub fn load_index(paths: &IndexPaths) -> Result<PersistedIndex> {
    let paths = &current_generation(paths)?;
    let model = load_model(paths).with_context(|| format!("loading {}", paths.model().display()))?;
    let matrix = load_matrix(paths).with_context(|| format!("loading {}", paths.matrix().display()))?;
    let records = load_records(paths).with_context(|| format!("loading {}", paths.records().display()))?;

    if paths.meta().exists() {
        let meta = load_meta(paths)?;
        if meta.version != FORMAT_VERSION {
            bail!("unsupported index version {} (expected {FORMAT_VERSION})", meta.version);
        }
        if meta.num_records != records.len() {
            bail!("meta.json records {} records but records.json has {}", meta.num_records, records.len());
        }
    }

    let index = PersistedIndex { model, matrix, records };
    if let Err(reason) = index.check_consistency() {
        bail!("inconsistent index at {}: {reason}", paths.root.display());
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build;
    use tempfile::tempdir;

    fn sample() -> PersistedIndex {
        build(&[
            ProblemRecord::new("Binary Search Tree", "u1", vec!["tree".into(), "search".into()]),
            ProblemRecord::new("Graph Coloring", "u2", vec!["graph".into(), "greedy".into()]),
        ])
        .unwrap()
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("processed"));
        let index = sample();
        save_index(&paths, &index).unwrap();
        assert_eq!(load_index(&paths).unwrap(), index);
        let meta = load_meta(&current_generation(&paths).unwrap()).unwrap();
        assert_eq!(meta.num_records, 2);
    }

    fn generations(paths: &IndexPaths) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&paths.root)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn failed_switch_keeps_previous_index() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("processed"));
        let index = sample();
        save_index(&paths, &index).unwrap();
        let before = generations(&paths);

        // a directory in the way of the pointer's temp file makes the switch fail
        fs::create_dir_all(paths.current_tmp().join("blocker")).unwrap();
        let smaller = build(&[ProblemRecord::new("Two Sum", "u9", vec![])]).unwrap();
        assert!(save_index(&paths, &smaller).is_err());

        assert_eq!(load_index(&paths).unwrap(), index);
        let after: Vec<String> = generations(&paths).into_iter().filter(|n| n.starts_with(GENERATION_PREFIX)).collect();
        assert_eq!(after, before);
    }

    #[test]
    fn old_generations_are_pruned() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("processed"));
        for title in ["Two Sum", "Three Sum", "Four Sum"] {
            save_index(&paths, &build(&[ProblemRecord::new(title, "u1", vec![])]).unwrap()).unwrap();
        }
        let gens = generations(&paths);
        assert_eq!(gens.len(), 2);
        let current = current_generation(&paths).unwrap();
        assert!(current.root.ends_with(&gens[1]));
        assert_eq!(load_index(&paths).unwrap().records[0].title, "Four Sum");
    }

    #[test]
    fn invalid_pointer_fails_to_load() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        fs::write(paths.current(), "../elsewhere").unwrap();
        assert!(load_index(&paths).is_err());
    }

    #[test]
    fn save_replaces_previous_index() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("processed"));
        save_index(&paths, &sample()).unwrap();
        let smaller = build(&[ProblemRecord::new("Two Sum", "u9", vec![])]).unwrap();
        save_index(&paths, &smaller).unwrap();
        assert_eq!(load_index(&paths).unwrap().records.len(), 1);
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn row_count_mismatch_fails_to_load() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let index = sample();
        save_model(&paths, &index.model).unwrap();
        save_matrix(&paths, &index.matrix).unwrap();
        save_records(&paths, &index.records[..1]).unwrap();
        let err = load_index(&paths).unwrap_err();
        assert!(err.to_string().contains("rows"));
    }

    #[test]
    fn missing_files_fail_to_load() {
        let dir = tempdir().unwrap();
        assert!(load_index(&IndexPaths::new(dir.path().join("nope"))).is_err());
    }
}
