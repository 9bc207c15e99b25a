/// Job Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Coordinate the scheduler, the engines and the evaluator for a whole
/// corpus run.
///
/// **Architecture:**
/// 1. Use TaskScheduler to bound parallelism (scheduler.rs)
/// 2. Use ProcessEngine or BrowserProbe to execute snippets (engine.rs, browser.rs)
/// 3. Use the evaluator to judge candidate outputs (evaluator.rs)
/// 4. Fold records into a Report (verdict-common)
///
/// Per-test failures are logged, counted as skipped and left out of the
/// report; they never stop the run.
use crate::browser::{BrowserHost, BrowserProbe};
use crate::discovery::TestSource;
use crate::engine::ProcessEngine;
use crate::error::HarnessError;
use crate::evaluator;
use crate::probe::TypecheckResult;
use crate::scheduler::TaskScheduler;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info, warn};
use verdict_common::report::ReportAssembler;
use verdict_common::types::{Report, Summary, TestcaseRecord};

async fn read_oracle(test: &TestSource) -> Result<String> {
    let exists = tokio::fs::try_exists(&test.oracle_path)
        .await
        .with_context(|| format!("Failed to check oracle {}", test.oracle_path.display()))?;
    if !exists {
        return Err(HarnessError::MissingOracle {
            path: test.source_path.clone(),
        }
        .into());
    }

    tokio::fs::read_to_string(&test.oracle_path)
        .await
        .with_context(|| format!("Failed to read oracle {}", test.oracle_path.display()))
}

/// Run one snippet through the candidate and judge it
pub async fn run_test(test: &TestSource, engine: &ProcessEngine) -> Result<(String, TestcaseRecord)> {
    let expected = read_oracle(test).await?;
    let snippet = tokio::fs::read_to_string(&test.source_path)
        .await
        .with_context(|| format!("Failed to read test {}", test.source_path.display()))?;

    let output = engine.execute(&snippet).await?;
    let conclusion = evaluator::classify(&expected, &output.stdout, &output.stderr, output.exit_code);

    debug!(
        test = %test.identity,
        exit_code = output.exit_code,
        conclusion = %conclusion,
        "Test judged"
    );

    Ok((
        test.identity.clone(),
        TestcaseRecord {
            conclusion,
            snippet,
            expected,
            actual_stdout: output.stdout,
            actual_stderr: output.stderr,
            exit_code: output.exit_code,
        },
    ))
}

/// Run every test against the candidate and assemble the report
pub async fn run_test_suite(
    tests: &[TestSource],
    engine: &ProcessEngine,
    scheduler: TaskScheduler,
) -> (Report, Summary) {
    info!(
        tests = tests.len(),
        command = %engine.command(),
        parallelism = scheduler.parallelism(),
        "Testing typechecker"
    );

    let mut assembler = ReportAssembler::new();
    let mut skipped = 0usize;

    let stats = scheduler
        .run(
            tests,
            |test| run_test(test, engine),
            |(identity, record)| {
                if assembler.insert(identity.clone(), record).is_some() {
                    warn!(test = %identity, "Duplicate test identity, keeping the latest record");
                }
            },
            |err| {
                skipped += 1;
                warn!("Skipping test: {:#}", err);
            },
        )
        .await;
    debug!(finished = stats.total(), "Test run finished");

    let report = assembler.finish();
    let summary = Summary::from_report(&report, skipped);
    (report, summary)
}

/// Totals for a reference-generation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub well_typed: usize,
    pub ill_typed: usize,
    pub failed: usize,
}

/// Probe one snippet on the reference interpreter and write its oracle file
pub async fn generate_reference<H: BrowserHost>(
    test: &TestSource,
    probe: &BrowserProbe<H>,
) -> Result<TypecheckResult> {
    let snippet = tokio::fs::read_to_string(&test.source_path)
        .await
        .with_context(|| format!("Failed to read test {}", test.source_path.display()))?;

    let result = probe
        .typecheck(&snippet)
        .await
        .with_context(|| format!("Reference run failed for {}", test.identity))?;

    tokio::fs::write(&test.oracle_path, result.oracle_text())
        .await
        .with_context(|| format!("Failed to write oracle {}", test.oracle_path.display()))?;

    debug!(test = %test.identity, well_typed = result.is_well_typed(), "Oracle written");
    Ok(result)
}

/// Generate oracle files for the whole corpus
pub async fn generate_suite<H: BrowserHost>(
    tests: &[TestSource],
    probe: &BrowserProbe<H>,
    scheduler: TaskScheduler,
) -> GenerationStats {
    info!(
        tests = tests.len(),
        parallelism = scheduler.parallelism(),
        "Typechecking with the reference interpreter"
    );

    let mut stats = GenerationStats::default();
    let mut failed = 0usize;

    scheduler
        .run(
            tests,
            |test| generate_reference(test, probe),
            |result| {
                if result.is_well_typed() {
                    stats.well_typed += 1;
                } else {
                    stats.ill_typed += 1;
                }
            },
            |err| {
                failed += 1;
                warn!("Skipping test: {:#}", err);
            },
        )
        .await;

    stats.failed = failed;
    stats
}

/// Delete every oracle file below `root`, returning how many were removed
pub async fn clean_oracles(root: &Path, oracle_suffix: &str) -> Result<usize> {
    let oracles = crate::discovery::find_oracles(root, oracle_suffix)?;

    for path in &oracles {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("Failed to delete {}", path.display()))?;
    }

    Ok(oracles.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn source(root: &Path, oracle_path: PathBuf) -> TestSource {
        TestSource {
            identity: "ok.stella".to_string(),
            source_path: root.join("ok.stella"),
            oracle_path,
        }
    }

    #[tokio::test]
    async fn test_absent_oracle_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let test = source(dir.path(), dir.path().join("ok.stella.out"));

        let err = read_oracle(&test).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HarnessError>(),
            Some(HarnessError::MissingOracle { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreachable_oracle_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("plain-file");
        std::fs::write(&not_a_dir, "").unwrap();
        let test = source(dir.path(), not_a_dir.join("ok.stella.out"));

        let err = read_oracle(&test).await.unwrap_err();
        assert!(err.downcast_ref::<HarnessError>().is_none());
        assert!(err.to_string().contains("Failed to check oracle"));
    }

    #[tokio::test]
    async fn test_present_oracle_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = dir.path().join("ok.stella.out");
        std::fs::write(&oracle, "[ERROR_MISSING_MAIN]").unwrap();

        let expected = read_oracle(&source(dir.path(), oracle)).await.unwrap();
        assert_eq!(expected, "[ERROR_MISSING_MAIN]");
    }
}
