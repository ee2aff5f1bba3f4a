//! Run directory layout and persistence helpers.
//!
//! Each session gets its own directory under the runs dir:
//!
//! ```text
//! <runs_dir>/<run_id>/
//!   metadata.json   run status, fingerprint, registries
//!   results.jsonl   one BenchmarkResult per line, in cell order
//!   report.md       rendered markdown report
//! ```

use crate::config::BenchConfig;
use crate::error::Result;
use crate::types::{BenchmarkResult, CellKey, RunStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetadata {
    pub run_id: String,
    #[serde(default)]
    pub status: RunStatus,
    pub config_fingerprint: String,
    #[serde(default)]
    pub total_cells: u64,
    #[serde(default)]
    pub completed_cells: u64,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub completed_time: Option<String>,
    #[serde(default)]
    pub strategies: Vec<String>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
}

impl RunMetadata {
    pub fn new(run_id: impl Into<String>, config: &BenchConfig, config_fingerprint: String) -> Self {
        let total_cells = (config.strategies.len() * config.models.len() * config.tasks.len()) as u64;
        Self {
            run_id: run_id.into(),
            status: RunStatus::Pending,
            config_fingerprint,
            total_cells,
            completed_cells: 0,
            start_time: None,
            completed_time: None,
            strategies: config.strategies.clone(),
            models: config.models.iter().map(|m| m.name.clone()).collect(),
            tasks: config.tasks.iter().map(|t| t.id.clone()).collect(),
        }
    }
}

#[derive(Debug)]
pub struct RunStore {
    results_path: PathBuf,
    metadata_path: PathBuf,
    report_path: PathBuf,
}

impl RunStore {
    pub fn new(run_dir: impl AsRef<Path>) -> Result<Self> {
        let run_dir = run_dir.as_ref().to_path_buf();
        fs::create_dir_all(&run_dir)?;
        Ok(Self::at(run_dir))
    }

    /// Open an existing run directory without creating it.
    pub fn open(run_dir: impl AsRef<Path>) -> Self {
        Self::at(run_dir.as_ref().to_path_buf())
    }

    fn at(run_dir: PathBuf) -> Self {
        Self {
            results_path: run_dir.join("results.jsonl"),
            metadata_path: run_dir.join("metadata.json"),
            report_path: run_dir.join("report.md"),
        }
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    pub fn exists(&self) -> bool {
        self.results_path.exists() || self.metadata_path.exists()
    }

    pub fn write_metadata(&self, metadata: &RunMetadata) -> Result<()> {
        let mut file = File::create(&self.metadata_path)?;
        let json = serde_json::to_string_pretty(metadata)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    pub fn read_metadata(&self) -> Result<Option<RunMetadata>> {
        if !self.metadata_path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&self.metadata_path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    pub fn append_result(&self, result: &BenchmarkResult) -> Result<()> {
        let mut file = File::options()
            .create(true)
            .append(true)
            .open(&self.results_path)?;
        let line = serde_json::to_string(result)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    pub fn write_report(&self, markdown: &str) -> Result<()> {
        fs::write(&self.report_path, markdown)?;
        Ok(())
    }

    /// Load results, keeping the most recent entry per cell, in cell order.
    pub fn load_results(&self) -> Result<Vec<BenchmarkResult>> {
        if !self.results_path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.results_path)?);
        let mut dedup: HashMap<CellKey, BenchmarkResult> = HashMap::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let value: BenchmarkResult = serde_json::from_str(&line)?;
            dedup.insert(value.key(), value);
        }

        let mut results: Vec<BenchmarkResult> = dedup.into_values().collect();
        results.sort_by_key(|r| r.cell_index);
        Ok(results)
    }
}

pub fn iso_timestamp_now() -> String {
    Utc::now().to_rfc3339()
}

/// SHA-256 over the config's canonical JSON (object keys sorted).
pub fn compute_config_fingerprint(config: &BenchConfig) -> Result<String> {
    let value = serde_json::to_value(config)?;
    let canonical = canonical_json_string(&value);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

fn canonical_json_string(value: &Value) -> String {
    match value {
        Value::Array(arr) => {
            let inner: Vec<String> = arr.iter().map(canonical_json_string).collect();
            format!("[{}]", inner.join(","))
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}:{}", Value::from(k.as_str()), canonical_json_string(v)))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        scalar => scalar.to_string(),
    }
}

pub fn generate_run_id(config_name: &str) -> String {
    let ts = Utc::now().format("%Y%m%dT%H%M%S%3f");
    format!("{config_name}-{ts}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys() {
        let a = canonical_json_string(&json!({"b": 1, "a": [true, null, "x"]}));
        let b = canonical_json_string(&json!({"a": [true, null, "x"], "b": 1}));
        assert_eq!(a, b);
        assert_eq!(a, r#"{"a":[true,null,"x"],"b":1}"#);
    }

    #[test]
    fn fingerprint_changes_with_config() {
        let base = BenchConfig::default();
        let mut other = BenchConfig::default();
        other.global.concurrency = 4;
        assert_eq!(
            compute_config_fingerprint(&base).unwrap(),
            compute_config_fingerprint(&BenchConfig::default()).unwrap()
        );
        assert_ne!(
            compute_config_fingerprint(&base).unwrap(),
            compute_config_fingerprint(&other).unwrap()
        );
    }

    #[test]
    fn run_id_has_config_prefix() {
        let id = generate_run_id("stratbench");
        assert!(id.starts_with("stratbench-"));
        assert!(!id.contains(':'));
    }
}
