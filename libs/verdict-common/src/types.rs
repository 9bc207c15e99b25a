use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Final verdict for one test case. Assigned once, never revised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Conclusion {
    Correct,
    Incorrect,
    PartiallyCorrect,
    Unknown,
}

impl Conclusion {
    pub const ALL: [Conclusion; 4] = [
        Conclusion::Correct,
        Conclusion::Incorrect,
        Conclusion::PartiallyCorrect,
        Conclusion::Unknown,
    ];
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Conclusion::Correct => "correct",
            Conclusion::Incorrect => "incorrect",
            Conclusion::PartiallyCorrect => "partially-correct",
            Conclusion::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Everything recorded about a single test case run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestcaseRecord {
    pub conclusion: Conclusion,
    pub snippet: String,
    pub expected: String,
    pub actual_stdout: String,
    pub actual_stderr: String,
    pub exit_code: i32,
}

/// Report keyed by test identity (path relative to the corpus root).
/// Key order carries no meaning; consumers sort for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    pub testcases: HashMap<String, TestcaseRecord>,
}

impl Report {
    /// Test cases sorted by identity
    pub fn sorted(&self) -> Vec<(&String, &TestcaseRecord)> {
        let mut entries: Vec<_> = self.testcases.iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries
    }
}

/// Per-conclusion totals for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub correct: usize,
    pub incorrect: usize,
    pub partially_correct: usize,
    pub unknown: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_report(report: &Report, skipped: usize) -> Self {
        let mut summary = Summary {
            skipped,
            ..Default::default()
        };
        for record in report.testcases.values() {
            summary.record(record.conclusion);
        }
        summary
    }

    pub fn record(&mut self, conclusion: Conclusion) {
        match conclusion {
            Conclusion::Correct => self.correct += 1,
            Conclusion::Incorrect => self.incorrect += 1,
            Conclusion::PartiallyCorrect => self.partially_correct += 1,
            Conclusion::Unknown => self.unknown += 1,
        }
    }

    pub fn count(&self, conclusion: Conclusion) -> usize {
        match conclusion {
            Conclusion::Correct => self.correct,
            Conclusion::Incorrect => self.incorrect,
            Conclusion::PartiallyCorrect => self.partially_correct,
            Conclusion::Unknown => self.unknown,
        }
    }

    /// Number of judged test cases (skipped ones excluded)
    pub fn total(&self) -> usize {
        self.correct + self.incorrect + self.partially_correct + self.unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conclusion_serializes_kebab_case() {
        let json = serde_json::to_string(&Conclusion::PartiallyCorrect).unwrap();
        assert_eq!(json, "\"partially-correct\"");

        let parsed: Conclusion = serde_json::from_str("\"unknown\"").unwrap();
        assert_eq!(parsed, Conclusion::Unknown);
    }

    #[test]
    fn test_conclusion_display_matches_serde() {
        for conclusion in Conclusion::ALL {
            let json = serde_json::to_string(&conclusion).unwrap();
            assert_eq!(json, format!("\"{}\"", conclusion));
        }
    }

    #[test]
    fn test_record_uses_camel_case_fields() {
        let record = TestcaseRecord {
            conclusion: Conclusion::Correct,
            snippet: "language core;".to_string(),
            expected: String::new(),
            actual_stdout: "out".to_string(),
            actual_stderr: "err".to_string(),
            exit_code: 0,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["actualStdout"], "out");
        assert_eq!(value["actualStderr"], "err");
        assert_eq!(value["exitCode"], 0);
        assert_eq!(value["conclusion"], "correct");
    }

    #[test]
    fn test_summary_counts() {
        let mut report = Report::default();
        for (name, conclusion) in [
            ("a.stella", Conclusion::Correct),
            ("b.stella", Conclusion::Correct),
            ("c.stella", Conclusion::PartiallyCorrect),
            ("d.stella", Conclusion::Unknown),
        ] {
            report.testcases.insert(
                name.to_string(),
                TestcaseRecord {
                    conclusion,
                    snippet: String::new(),
                    expected: String::new(),
                    actual_stdout: String::new(),
                    actual_stderr: String::new(),
                    exit_code: 0,
                },
            );
        }

        let summary = Summary::from_report(&report, 3);
        assert_eq!(summary.correct, 2);
        assert_eq!(summary.incorrect, 0);
        assert_eq!(summary.partially_correct, 1);
        assert_eq!(summary.unknown, 1);
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn test_report_without_timestamp_deserializes() {
        let json = r#"{"testcases": {}}"#;
        let report: Report = serde_json::from_str(json).unwrap();
        assert!(report.generated_at.is_none());
        assert!(report.testcases.is_empty());
    }
}
