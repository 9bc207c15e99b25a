/// Output Classifier - Typechecker Verdict Logic
///
/// **Core Responsibility:**
/// Turn an oracle's diagnostic text plus a candidate's raw output into a
/// [`Conclusion`].
///
/// **Critical Properties:**
/// - Knows nothing about subprocesses or browsers
/// - Never fails: anything it cannot parse becomes `Conclusion::Unknown`
/// - Pure function: (expected text, stdout, stderr, exit code) → conclusion
///
/// **Expected Output Shapes:**
/// - Blank text: the program is well-typed
/// - Banner + "Primary type error" block + "Alternative type errors" block:
///   tags from the first block win, tags from the second earn partial credit
/// - Anything else carrying exactly one distinct `[ERROR_*]` tag
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use verdict_common::types::Conclusion;

/// Banner the reference interpreter prints before any typechecking failure
pub const TYPECHECK_BANNER: &str = "An error occurred during typechecking!";

lazy_static! {
    static ref ERROR_TAG: Regex =
        Regex::new(r"(?i)\[(ERROR_\w+)\]").expect("error tag pattern is valid");
    static ref PRIMARY_AND_ALTERNATIVE: Regex = Regex::new(
        r"(?is)^An error occurred during typechecking!\s+=+\s*Primary type error:\s*=+(.+?)=+\s*Alternative type errors:\s*=+(.+)$"
    )
    .expect("dual block pattern is valid");
}

/// What the oracle says the candidate should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedResult {
    Ok,
    TypeError {
        primary_tags: BTreeSet<String>,
        alternative_tags: BTreeSet<String>,
    },
    Unknown,
}

/// Collect every bracketed diagnostic tag in `text`, without the brackets
pub fn extract_tags(text: &str) -> BTreeSet<String> {
    ERROR_TAG
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Parse oracle text into an [`ExpectedResult`]
pub fn parse_expected(expected: &str) -> ExpectedResult {
    let expected = expected.trim();

    // Reference typechecker printed nothing
    if expected.is_empty() {
        return ExpectedResult::Ok;
    }

    if let Some(caps) = PRIMARY_AND_ALTERNATIVE.captures(expected) {
        let primary_tags = extract_tags(&caps[1]);
        let alternative_tags = extract_tags(&caps[2]);

        if primary_tags.is_empty() || alternative_tags.is_empty() {
            return ExpectedResult::Unknown;
        }

        return ExpectedResult::TypeError {
            primary_tags,
            alternative_tags,
        };
    }

    let tags = extract_tags(expected);
    if tags.len() != 1 {
        return ExpectedResult::Unknown;
    }

    ExpectedResult::TypeError {
        primary_tags: tags,
        alternative_tags: BTreeSet::new(),
    }
}

/// Combine an expectation with what the candidate actually did.
///
/// `actual_output` is stdout and stderr joined by a newline.
pub fn judge(expected: &ExpectedResult, actual_output: &str, actual_exit_code: i32) -> Conclusion {
    match expected {
        ExpectedResult::Ok => {
            if actual_exit_code == 0 {
                Conclusion::Correct
            } else {
                Conclusion::Incorrect
            }
        }
        ExpectedResult::TypeError {
            primary_tags,
            alternative_tags,
        } => {
            if actual_exit_code == 0 {
                Conclusion::Incorrect
            } else if primary_tags.iter().any(|tag| actual_output.contains(tag.as_str())) {
                Conclusion::Correct
            } else if alternative_tags.iter().any(|tag| actual_output.contains(tag.as_str())) {
                Conclusion::PartiallyCorrect
            } else {
                Conclusion::Incorrect
            }
        }
        ExpectedResult::Unknown => Conclusion::Unknown,
    }
}

/// Classify one candidate run against its oracle text
pub fn classify(expected: &str, actual_stdout: &str, actual_stderr: &str, actual_exit_code: i32) -> Conclusion {
    let actual_output = format!("{}\n{}", actual_stdout, actual_stderr);
    judge(&parse_expected(expected), &actual_output, actual_exit_code)
}
