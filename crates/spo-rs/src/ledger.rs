//! The results ledger (`results.json`) and cost snapshot (`cost.json`).
//!
//! Every evaluated round appends one [`RoundRecord`]. The ledger is the only
//! state carried between rounds: the next optimization starts from
//! [`ResultsLedger::best_round`], and a restarted run picks up where the
//! file left off.

use crate::api::tracing::CostTracker;
use crate::llm::CostReport;
use crate::template::QaPair;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const RESULTS_FILE: &str = "results.json";
pub const COST_FILE: &str = "cost.json";

/// Outcome of one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub answers: Vec<QaPair>,
    pub prompt: String,
    /// Whether the judge preferred this round over the best before it.
    /// Always `true` for a baseline round.
    pub succeed: bool,
    /// Estimated tokens in `answers`.
    #[serde(default)]
    pub tokens: u64,
    /// Local timestamp of when the record was created.
    #[serde(default)]
    pub time: String,
}

impl RoundRecord {
    /// Build a record stamped with the current local time.
    pub fn new(round: u32, answers: Vec<QaPair>, prompt: impl Into<String>, succeed: bool) -> Self {
        let tokens = crate::tokens::count_answer_tokens(&answers);
        Self {
            round,
            answers,
            prompt: prompt.into(),
            succeed,
            tokens,
            time: chrono::Local::now()
                .format("%Y-%m-%d %H:%M:%S%.6f")
                .to_string(),
        }
    }
}

/// In-memory copy of `results.json` bound to its path.
#[derive(Debug)]
pub struct ResultsLedger {
    path: PathBuf,
    records: Vec<RoundRecord>,
}

impl ResultsLedger {
    /// Load `results.json` from `prompts_dir`.
    ///
    /// A missing file gives an empty ledger. So does a malformed one, with a
    /// warning; the next save overwrites it.
    pub fn load(prompts_dir: &Path) -> Result<Self, String> {
        let path = prompts_dir.join(RESULTS_FILE);
        if !path.exists() {
            return Ok(Self {
                path,
                records: Vec::new(),
            });
        }

        let json = std::fs::read_to_string(&path)
            .map_err(|e| format!("failed to read '{}': {e}", path.display()))?;
        let records = match serde_json::from_str::<Vec<RoundRecord>>(&json) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    "Ignoring malformed results ledger at {}: {e}",
                    path.display()
                );
                Vec::new()
            }
        };
        debug!("Loaded {} round record(s) from {}", records.len(), path.display());
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[RoundRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record (in memory only; call [`save`](Self::save)).
    pub fn append(&mut self, record: RoundRecord) {
        self.records.push(record);
    }

    /// The first record for `round`, if any.
    pub fn record_for(&self, round: u32) -> Option<&RoundRecord> {
        self.records.iter().find(|r| r.round == round)
    }

    /// The succeeded record with the highest round number.
    ///
    /// When a round was recorded more than once, the earliest entry wins.
    pub fn best_round(&self) -> Option<&RoundRecord> {
        // `max_by_key` keeps the last maximum; reversing makes that the earliest.
        self.records
            .iter()
            .rev()
            .filter(|r| r.succeed)
            .max_by_key(|r| r.round)
    }

    /// Atomic write: serialize to a temp file, then rename into place.
    pub fn save(&self) -> Result<(), String> {
        write_json_atomic(&self.path, &self.records)
    }
}

/// Shape of `cost.json`.
#[derive(Serialize)]
struct CostFile<'a> {
    optimize: &'a CostTracker,
    evaluate: &'a CostTracker,
    execute: &'a CostTracker,
    total: CostTracker,
}

/// Write `cost.json` into `prompts_dir`.
pub fn save_cost(prompts_dir: &Path, report: &CostReport) -> Result<(), String> {
    let file = CostFile {
        optimize: &report.optimize,
        evaluate: &report.evaluate,
        execute: &report.execute,
        total: report.total(),
    };
    write_json_atomic(&prompts_dir.join(COST_FILE), &file)
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), String> {
    let dir = path
        .parent()
        .ok_or_else(|| format!("'{}' has no parent directory", path.display()))?;
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("failed to create '{}': {e}", dir.display()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{file_name}.tmp"));

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("failed to serialize '{file_name}': {e}"))?;
    std::fs::write(&tmp_path, json)
        .map_err(|e| format!("failed to write '{}': {e}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| format!("failed to rename into '{}': {e}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tracing::ModelPricing;
    use crate::llm::RequestType;

    fn record(round: u32, succeed: bool) -> RoundRecord {
        RoundRecord::new(
            round,
            vec![QaPair::new("q", format!("answer {round}"))],
            format!("prompt {round}"),
            succeed,
        )
    }

    #[test]
    fn missing_file_is_empty_ledger() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = ResultsLedger::load(tmp.path()).unwrap();
        assert!(ledger.is_empty());
        assert!(ledger.best_round().is_none());
    }

    #[test]
    fn malformed_file_is_empty_ledger() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(RESULTS_FILE), "{ not json").unwrap();
        let ledger = ResultsLedger::load(tmp.path()).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn save_load_roundtrip_no_temp_left() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = ResultsLedger::load(tmp.path()).unwrap();
        ledger.append(record(1, true));
        ledger.append(record(2, false));
        ledger.save().unwrap();

        assert!(!tmp.path().join(".results.json.tmp").exists());

        let loaded = ResultsLedger::load(tmp.path()).unwrap();
        assert_eq!(loaded.records(), ledger.records());
    }

    #[test]
    fn best_round_is_latest_success() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = ResultsLedger::load(tmp.path()).unwrap();
        ledger.append(record(1, true));
        ledger.append(record(2, false));
        ledger.append(record(3, true));
        ledger.append(record(4, false));

        assert_eq!(ledger.best_round().unwrap().round, 3);
    }

    #[test]
    fn best_round_prefers_earlier_duplicate() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = ResultsLedger::load(tmp.path()).unwrap();
        ledger.append(record(1, true));
        let mut first = record(3, true);
        first.prompt = "first".into();
        ledger.append(first);
        let mut second = record(3, true);
        second.prompt = "second".into();
        ledger.append(second);

        assert_eq!(ledger.best_round().unwrap().prompt, "first");
        assert_eq!(ledger.record_for(3).unwrap().prompt, "first");
    }

    #[test]
    fn failed_duplicate_does_not_shadow_success() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = ResultsLedger::load(tmp.path()).unwrap();
        ledger.append(record(2, false));
        let mut retry = record(2, true);
        retry.prompt = "retry".into();
        ledger.append(retry);

        assert_eq!(ledger.best_round().unwrap().prompt, "retry");
        assert!(!ledger.record_for(2).unwrap().succeed);
    }

    #[test]
    fn no_success_means_no_best() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = ResultsLedger::load(tmp.path()).unwrap();
        ledger.append(record(2, false));
        assert!(ledger.best_round().is_none());
    }

    #[test]
    fn record_fields_serialize() {
        let rec = record(1, true);
        assert!(rec.tokens > 0);
        assert!(!rec.time.is_empty());
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["round"], 1);
        assert_eq!(json["succeed"], true);
        assert_eq!(json["answers"][0]["question"], "q");
    }

    #[test]
    fn records_without_tokens_or_time_still_load() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(RESULTS_FILE),
            r#"[{"round": 1, "answers": [], "prompt": "p", "succeed": true}]"#,
        )
        .unwrap();
        let ledger = ResultsLedger::load(tmp.path()).unwrap();
        assert_eq!(ledger.records()[0].tokens, 0);
    }

    #[test]
    fn cost_file_includes_total() {
        let tmp = tempfile::tempdir().unwrap();
        let mut report = CostReport::default();
        report
            .tracker_mut(RequestType::Execute)
            .record(10, 5, &ModelPricing::default());
        save_cost(tmp.path(), &report).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join(COST_FILE)).unwrap())
                .unwrap();
        assert_eq!(json["execute"]["calls"], 1);
        assert_eq!(json["total"]["total_prompt_tokens"], 10);
    }
}
