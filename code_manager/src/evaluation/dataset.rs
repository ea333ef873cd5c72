//! Dataset and completion loaders.
//!
//! Both inputs are JSON Lines. Completions may also come as a directory of
//! per-task files, optionally gzip-compressed.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::Value;

use crate::evaluation::error::EvaluationError;

/// One benchmark problem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub tests: String,
}

/// Tasks keyed by id, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    tasks: BTreeMap<String, Task>,
}

impl Dataset {
    /// Loads a JSONL dataset. Blank lines are skipped; `task_id` falls back
    /// to `name`. A later line with the same id replaces the earlier one.
    pub fn load(path: &Path) -> Result<Self, EvaluationError> {
        let reader = open_lines(path)?;
        let mut tasks = BTreeMap::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| EvaluationError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let mut task: Task =
                serde_json::from_str(&line).map_err(|source| EvaluationError::InvalidJson {
                    path: path.to_path_buf(),
                    line: index + 1,
                    source,
                })?;

            if task.task_id.is_empty() {
                task.task_id = task.name.clone().unwrap_or_default();
            }
            if task.task_id.is_empty() {
                tracing::warn!("Skipping dataset line {} without task_id or name", index + 1);
                continue;
            }
            if tasks.contains_key(&task.task_id) {
                tracing::warn!("Duplicate task {} in dataset, keeping the last one", task.task_id);
            }
            tasks.insert(task.task_id.clone(), task);
        }

        tracing::info!("Loaded {} tasks from {:?}", tasks.len(), path);
        Ok(Self { tasks })
    }

    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            tasks: tasks
                .into_iter()
                .map(|task| (task.task_id.clone(), task))
                .collect(),
        }
    }

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Candidate solutions per task, in file order, capped at `max_per_task`.
#[derive(Debug, Clone)]
pub struct Completions {
    by_task: BTreeMap<String, Vec<String>>,
    max_per_task: usize,
}

impl Completions {
    pub fn new(max_per_task: usize) -> Self {
        Self {
            by_task: BTreeMap::new(),
            max_per_task,
        }
    }

    /// Appends a candidate unless the task already holds `max_per_task`.
    /// Returns whether it was kept.
    pub fn push(&mut self, task_id: &str, solution: String) -> bool {
        let candidates = self.by_task.entry(task_id.to_string()).or_default();
        if candidates.len() >= self.max_per_task {
            return false;
        }
        candidates.push(solution);
        true
    }

    /// Loads a single JSONL file holding candidates for many tasks.
    pub fn load_file(path: &Path, max_per_task: usize) -> Result<Self, EvaluationError> {
        let mut completions = Self::new(max_per_task);
        let reader = open_lines(path)?;

        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| EvaluationError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let Some(value) = parse_line(path, index, &line) else {
                continue;
            };
            let task_id = first_str(&value, &["task_id", "name"]).unwrap_or_default();
            let solution = solution_text(&value);
            completions.push(task_id, solution);
        }

        completions.log_loaded(path);
        Ok(completions)
    }

    /// Loads a directory of per-task `.jsonl`, `.json` or `.json.gz` files.
    /// The file stem (without `.jsonl` / `.json`) is the task id.
    pub fn load_dir(dir: &Path, max_per_task: usize) -> Result<Self, EvaluationError> {
        let mut completions = Self::new(max_per_task);

        let read_dir = |source: std::io::Error| EvaluationError::Read {
            path: dir.to_path_buf(),
            source,
        };
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(read_dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()
            .map_err(read_dir)?;
        files.sort();

        for file in files {
            let Some(task_id) = task_id_from_file(&file) else {
                continue;
            };
            completions.by_task.entry(task_id.clone()).or_default();

            let reader = open_lines(&file)?;
            for (index, line) in reader.lines().enumerate() {
                let line = line.map_err(|source| EvaluationError::Read {
                    path: file.clone(),
                    source,
                })?;
                let Some(value) = parse_line(&file, index, &line) else {
                    continue;
                };

                // A whole-file object may carry every sample in a `completions` array.
                if let Some(samples) = value.get("completions").and_then(Value::as_array) {
                    for sample in samples.iter().filter_map(Value::as_str) {
                        completions.push(&task_id, sample.to_string());
                    }
                } else {
                    completions.push(&task_id, solution_text(&value));
                }
            }
        }

        completions.log_loaded(dir);
        Ok(completions)
    }

    pub fn for_task(&self, task_id: &str) -> &[String] {
        self.by_task.get(task_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tasks with at least one candidate.
    pub fn tasks_with_candidates(&self) -> usize {
        self.by_task.values().filter(|c| !c.is_empty()).count()
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.by_task.keys().map(String::as_str)
    }

    fn log_loaded(&self, source: &Path) {
        let total: usize = self.by_task.values().map(Vec::len).sum();
        tracing::info!(
            "Loaded {} candidates for {} tasks from {:?}",
            total,
            self.by_task.len(),
            source
        );
    }
}

fn open_lines(path: &Path) -> Result<Box<dyn BufRead>, EvaluationError> {
    let file = File::open(path).map_err(|source| EvaluationError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let inner: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(inner)))
}

fn parse_line(path: &Path, index: usize, line: &str) -> Option<Value> {
    if line.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Skipping malformed line {} in {:?}: {}", index + 1, path, e);
            None
        }
    }
}

fn first_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

fn solution_text(value: &Value) -> String {
    first_str(value, &["solution", "completion", "canonical_solution"])
        .unwrap_or_default()
        .to_string()
}

fn task_id_from_file(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    [".json.gz", ".jsonl.gz", ".jsonl", ".json"]
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compression, write::GzEncoder};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn dataset_falls_back_to_name_and_skips_blank_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("problems.jsonl");
        fs::write(
            &path,
            concat!(
                r#"{"task_id": "HumanEval/0", "prompt": "p0", "tests": "t0"}"#,
                "\n\n",
                r#"{"name": "HumanEval_1_cpp", "prompt": "p1", "tests": "t1"}"#,
                "\n"
            ),
        )
        .unwrap();

        let dataset = Dataset::load(&path).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.get("HumanEval_1_cpp").unwrap().prompt, "p1");
        assert_eq!(dataset.get("HumanEval/0").unwrap().tests, "t0");
    }

    #[test]
    fn dataset_rejects_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("problems.jsonl");
        fs::write(&path, "{\"task_id\": \"a\"}\nnot json\n").unwrap();

        match Dataset::load(&path) {
            Err(EvaluationError::InvalidJson { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected InvalidJson, got {:?}", other),
        }
    }

    #[test]
    fn completion_file_caps_and_picks_solution_field() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("completions.jsonl");
        fs::write(
            &path,
            concat!(
                r#"{"task_id": "a", "solution": "s0"}"#,
                "\n",
                r#"{"task_id": "a", "completion": "s1"}"#,
                "\n",
                "{broken\n",
                r#"{"name": "a", "canonical_solution": "s2"}"#,
                "\n",
                r#"{"task_id": "b", "completion": "b0"}"#,
                "\n"
            ),
        )
        .unwrap();

        let completions = Completions::load_file(&path, 2).unwrap();
        assert_eq!(completions.for_task("a"), &["s0", "s1"]);
        assert_eq!(completions.for_task("b"), &["b0"]);
        assert!(completions.for_task("missing").is_empty());
        assert_eq!(completions.tasks_with_candidates(), 2);
    }

    #[test]
    fn completion_dir_reads_plain_and_gzip_files() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("HumanEval_0_cpp.jsonl"),
            "{\"completion\": \"a\"}\n{\"solution\": \"b\"}\n",
        )
        .unwrap();

        let gz = File::create(dir.path().join("HumanEval_1_cpp.json.gz")).unwrap();
        let mut encoder = GzEncoder::new(gz, Compression::default());
        encoder
            .write_all(br#"{"completions": ["x", "y", "z"]}"#)
            .unwrap();
        encoder.finish().unwrap();

        fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let completions = Completions::load_dir(dir.path(), 2).unwrap();
        assert_eq!(completions.for_task("HumanEval_0_cpp"), &["a", "b"]);
        assert_eq!(completions.for_task("HumanEval_1_cpp"), &["x", "y"]);
        assert_eq!(completions.task_ids().count(), 2);
    }

    #[test]
    fn task_id_strips_known_suffixes() {
        assert_eq!(
            task_id_from_file(Path::new("/x/HumanEval_3_cpp.json.gz")).as_deref(),
            Some("HumanEval_3_cpp")
        );
        assert_eq!(task_id_from_file(Path::new("t.jsonl")).as_deref(), Some("t"));
        assert_eq!(task_id_from_file(Path::new("notes.txt")), None);
    }
}
