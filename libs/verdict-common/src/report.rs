use crate::types::{Report, TestcaseRecord};
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::Path;

/// Report location used when the caller does not pick one
pub const DEFAULT_REPORT_PATH: &str = "./typechecker-report.json";

/// Folds completed test records into a [`Report`].
///
/// Purely structural: a duplicate identity overwrites the earlier record.
#[derive(Debug, Default)]
pub struct ReportAssembler {
    report: Report,
}

impl ReportAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one record, returning the record it replaced (if any)
    pub fn insert(&mut self, identity: String, record: TestcaseRecord) -> Option<TestcaseRecord> {
        self.report.testcases.insert(identity, record)
    }

    /// Stamp the report and hand it over
    pub fn finish(mut self) -> Report {
        self.report.generated_at = Some(Utc::now());
        self.report
    }
}

/// Write a report as pretty-printed JSON
pub fn save_report(path: &Path, report: &Report) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory {}", parent.display()))?;
        }
    }

    let payload = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    fs::write(path, payload).with_context(|| format!("Failed to write report {}", path.display()))?;

    Ok(())
}

/// Read a report previously written by [`save_report`]
pub fn load_report(path: &Path) -> Result<Report> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read report {}", path.display()))?;

    serde_json::from_str(&content).with_context(|| format!("Failed to parse report {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Conclusion;

    fn make_record(conclusion: Conclusion, exit_code: i32) -> TestcaseRecord {
        TestcaseRecord {
            conclusion,
            snippet: "language core;\nfn main(n : Nat) -> Nat { return n }".to_string(),
            expected: String::new(),
            actual_stdout: String::new(),
            actual_stderr: String::new(),
            exit_code,
        }
    }

    #[test]
    fn test_assembler_last_write_wins() {
        let mut assembler = ReportAssembler::new();
        assert!(assembler
            .insert("ok.stella".to_string(), make_record(Conclusion::Incorrect, 1))
            .is_none());
        let replaced = assembler.insert("ok.stella".to_string(), make_record(Conclusion::Correct, 0));

        assert_eq!(replaced.map(|r| r.conclusion), Some(Conclusion::Incorrect));

        let report = assembler.finish();
        assert!(report.generated_at.is_some());
        assert_eq!(report.testcases.len(), 1);
        assert_eq!(report.testcases["ok.stella"].conclusion, Conclusion::Correct);
    }

    #[test]
    fn test_assembled_report_sorts_by_name() {
        let mut assembler = ReportAssembler::new();
        assembler.insert("b.stella".to_string(), make_record(Conclusion::Correct, 0));
        assembler.insert("a.stella".to_string(), make_record(Conclusion::Unknown, 2));

        let report = assembler.finish();
        let names: Vec<_> = report.sorted().into_iter().map(|(name, _)| name.clone()).collect();
        assert_eq!(names, vec!["a.stella", "b.stella"]);
    }

    #[test]
    fn test_save_and_load_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");

        let mut assembler = ReportAssembler::new();
        assembler.insert("bad.stella".to_string(), make_record(Conclusion::PartiallyCorrect, 2));
        let report = assembler.finish();

        save_report(&path, &report).unwrap();
        let loaded = load_report(&path).unwrap();

        assert_eq!(loaded, report);
    }

    #[test]
    fn test_load_missing_report_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_report(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read report"));
    }
}
