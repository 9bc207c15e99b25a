// CLI commands for reading verdict reports
use anyhow::{bail, Result};
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;
use verdict_common::report::load_report;
use verdict_common::types::{Conclusion, Report, Summary};

fn marker(conclusion: Conclusion) -> &'static str {
    match conclusion {
        Conclusion::Correct => "✔",
        Conclusion::Incorrect => "✘",
        Conclusion::PartiallyCorrect => "~",
        Conclusion::Unknown => "?",
    }
}

fn parse_conclusion(name: &str) -> Result<Conclusion> {
    match Conclusion::ALL.into_iter().find(|c| c.to_string() == name) {
        Some(conclusion) => Ok(conclusion),
        None => bail!(
            "Unknown conclusion '{}' (expected one of: correct, incorrect, partially-correct, unknown)",
            name
        ),
    }
}

/// Render a report: one line per test sorted by name, then the totals
pub fn render_report(report: &Report, only: Option<Conclusion>) -> String {
    let mut out = String::new();

    for (name, record) in report.sorted() {
        if only.is_some_and(|c| c != record.conclusion) {
            continue;
        }
        let _ = writeln!(out, "{}: {} {}", name, marker(record.conclusion), record.conclusion);
    }

    let summary = Summary::from_report(report, 0);
    let _ = writeln!(out, "=================================");
    for conclusion in Conclusion::ALL {
        let _ = writeln!(out, "{}: {}", conclusion, summary.count(conclusion));
    }
    let _ = writeln!(out, "Total: {}/{}", summary.correct, summary.total());

    out
}

/// Load and print a report
pub fn print_report(report_path: &Path, only: Option<&str>) -> Result<()> {
    let only = only.map(parse_conclusion).transpose()?;
    let report = load_report(report_path)?;
    debug!(
        report = %report_path.display(),
        tests = report.testcases.len(),
        generated_at = ?report.generated_at,
        "Report loaded"
    );

    print!("{}", render_report(&report, only));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_common::types::TestcaseRecord;

    fn report() -> Report {
        let mut report = Report::default();
        for (name, conclusion) in [
            ("well-typed/b.stella", Conclusion::Correct),
            ("ill-typed/a.stella", Conclusion::PartiallyCorrect),
            ("well-typed/a.stella", Conclusion::Incorrect),
        ] {
            report.testcases.insert(
                name.to_string(),
                TestcaseRecord {
                    conclusion,
                    snippet: String::new(),
                    expected: String::new(),
                    actual_stdout: String::new(),
                    actual_stderr: String::new(),
                    exit_code: 1,
                },
            );
        }
        report
    }

    #[test]
    fn test_render_sorted_with_totals() {
        let rendered = render_report(&report(), None);
        let lines: Vec<_> = rendered.lines().collect();

        assert_eq!(lines[0], "ill-typed/a.stella: ~ partially-correct");
        assert_eq!(lines[1], "well-typed/a.stella: ✘ incorrect");
        assert_eq!(lines[2], "well-typed/b.stella: ✔ correct");
        assert_eq!(lines[3], "=================================");
        assert!(rendered.contains("partially-correct: 1"));
        assert!(rendered.ends_with("Total: 1/3\n"));
    }

    #[test]
    fn test_render_filtered() {
        let rendered = render_report(&report(), Some(Conclusion::Incorrect));
        assert!(rendered.starts_with("well-typed/a.stella: ✘ incorrect\n====="));
        assert!(rendered.contains("Total: 1/3"));
    }

    #[test]
    fn test_parse_conclusion() {
        assert_eq!(parse_conclusion("partially-correct").unwrap(), Conclusion::PartiallyCorrect);
        assert!(parse_conclusion("passed").is_err());
    }

    #[test]
    fn test_print_saved_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typechecker-report.json");
        verdict_common::report::save_report(&path, &report()).unwrap();

        assert!(print_report(&path, Some("correct")).is_ok());
        assert!(print_report(&path, Some("bogus")).is_err());
        assert!(print_report(&dir.path().join("missing.json"), None).is_err());
    }
}
