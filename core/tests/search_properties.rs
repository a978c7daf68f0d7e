use search_core::persist::{current_generation, save_index, IndexPaths};
use search_core::{build, parse_corpus, BuildError, QueryError, SearchService};
use tempfile::tempdir;

const CORPUS: &str = r#"[
  {"title": "Binary Search Tree", "url": "u1", "tags": ["tree", "search"]},
  {"title": "Graph Coloring", "url": "u2", "tags": ["graph", "greedy"]},
  {"title": "Minimum Spanning Tree", "url": "u3", "tags": ["graph", "tree", "dsu"]},
  {"title": "The", "url": "u4", "tags": []}
]"#;

#[test]
fn every_row_is_unit_or_zero() {
    let records = parse_corpus(CORPUS).unwrap();
    let index = build(&records).unwrap();
    assert_eq!(index.matrix.num_rows, records.len());
    for i in 0..index.matrix.num_rows {
        let norm = index.matrix.row_norm(i);
        assert!((norm - 1.0).abs() < 1e-5 || norm == 0.0, "row {i} has norm {norm}");
    }
}

#[test]
fn zero_overlap_records_are_excluded() {
    let index = build(&parse_corpus(CORPUS).unwrap()).unwrap();
    let svc = SearchService::initialize(Ok(index));
    let urls: Vec<String> = svc.search("greedy coloring", 10).unwrap().into_iter().map(|r| r.url).collect();
    assert_eq!(urls, vec!["u2"]);
}

#[test]
fn tree_query_ranks_bst_first() {
    let svc = SearchService::initialize(Ok(build(&parse_corpus(CORPUS).unwrap()).unwrap()));
    let results = svc.search("tree search", 10).unwrap();
    assert_eq!(results[0].url, "u1");
    assert!(results.iter().all(|r| r.similarity > 0.0));
    assert!(!results.iter().any(|r| r.url == "u2"));
}

#[test]
fn service_serves_what_indexer_persisted() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path().join("processed"));
    save_index(&paths, &build(&parse_corpus(CORPUS).unwrap()).unwrap()).unwrap();

    let svc = SearchService::open(&paths);
    assert_eq!(svc.search("spanning", 10).unwrap()[0].url, "u3");
}

#[test]
fn reload_picks_up_rebuilt_index() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path().join("processed"));
    let svc = SearchService::open(&paths);
    assert!(matches!(svc.search("knapsack", 10), Err(QueryError::IndexUnavailable(_))));

    let records = parse_corpus(r#"[{"title": "Knapsack", "url": "k1", "tags": ["dp"]}]"#).unwrap();
    save_index(&paths, &build(&records).unwrap()).unwrap();
    svc.reload(&paths).unwrap();
    assert_eq!(svc.search("knapsack", 10).unwrap()[0].url, "k1");
}

#[test]
fn failed_reload_keeps_serving() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path().join("processed"));
    save_index(&paths, &build(&parse_corpus(CORPUS).unwrap()).unwrap()).unwrap();
    let svc = SearchService::open(&paths);

    let live = current_generation(&paths).unwrap();
    std::fs::remove_file(live.root.join("matrix.bin")).unwrap();
    assert!(svc.reload(&paths).is_err());
    assert_eq!(svc.search("graph", 10).unwrap().len(), 2);
}

#[test]
fn empty_corpus_cannot_be_built() {
    let records = parse_corpus("[]").unwrap();
    assert_eq!(build(&records).unwrap_err(), BuildError::EmptyCorpus);
}
