use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{Result, StatsError};
use super::stats::fold;
use super::types::{TOP_N, TagCount};

pub const INDEX_FILE: &str = "author_index.json";
pub const WORKS_FILE: &str = "works.jsonl";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexedWork {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub words: Option<u64>,
    #[serde(default)]
    pub fandoms: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<String>,
    #[serde(default)]
    pub characters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalStats {
    pub username: String,
    pub matched_works: usize,
    pub total_words: u64,
    pub top_fandoms: Vec<TagCount>,
    pub top_relationships: Vec<TagCount>,
    pub top_characters: Vec<TagCount>,
}

/// Pre-built author index, loaded once and queried by reference.
#[derive(Debug, Default)]
pub struct LocalIndex {
    authors: HashMap<String, Vec<String>>,
    works: HashMap<String, IndexedWork>,
}

impl LocalIndex {
    /// Load both index files from `dir`, failing fast if either is missing.
    pub fn load(dir: &Path) -> Result<Self> {
        let index_path = dir.join(INDEX_FILE);
        let works_path = dir.join(WORKS_FILE);
        if !index_path.is_file() || !works_path.is_file() {
            return Err(StatsError::IndexMissing {
                index: index_path,
                works: works_path,
            });
        }

        let authors: HashMap<String, Vec<String>> =
            serde_json::from_reader(BufReader::new(File::open(&index_path)?))
                .map_err(|err| malformed(&index_path, err))?;

        let mut works = HashMap::new();
        for (line_no, line) in BufReader::new(File::open(&works_path)?).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let work: IndexedWork = serde_json::from_str(&line).map_err(|err| StatsError::IndexMalformed {
                path: works_path.clone(),
                message: format!("line {}: {err}", line_no + 1),
            })?;
            works.insert(work.id.clone().unwrap_or_default(), work);
        }

        info!(
            authors = authors.len(),
            works = works.len(),
            dir = %dir.display(),
            "local index loaded"
        );
        Ok(Self { authors, works })
    }

    pub fn from_parts(
        authors: HashMap<String, Vec<String>>,
        works: impl IntoIterator<Item = IndexedWork>,
    ) -> Self {
        let works = works
            .into_iter()
            .map(|work| (work.id.clone().unwrap_or_default(), work))
            .collect();
        Self { authors, works }
    }

    pub fn stats(&self, username: &str) -> LocalStats {
        let key = username.trim().to_lowercase();
        let ids = self.authors.get(&key).map(Vec::as_slice).unwrap_or_default();
        let matched = ids
            .iter()
            .filter_map(|id| self.works.get(id))
            .collect::<Vec<_>>();

        LocalStats {
            username: username.to_string(),
            matched_works: ids.len(),
            total_words: matched.iter().map(|w| w.words.unwrap_or(0)).sum(),
            top_fandoms: fold(matched.iter().map(|w| &w.fandoms)).top(TOP_N),
            top_relationships: fold(matched.iter().map(|w| &w.relationships)).top(TOP_N),
            top_characters: fold(matched.iter().map(|w| &w.characters)).top(TOP_N),
        }
    }
}

fn malformed(path: &Path, err: serde_json::Error) -> StatsError {
    StatsError::IndexMalformed {
        path: PathBuf::from(path),
        message: err.to_string(),
    }
}
