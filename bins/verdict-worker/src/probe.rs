//! Typecheck-only probing of the reference interpreter.
//!
//! The hosted interpreter cannot be asked "is this well-typed?" directly. A
//! probe instead feeds the program a crafted input value and reads the
//! verdict off how the run fails.

use crate::evaluator::TYPECHECK_BANNER;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Input that makes a well-typed program panic as soon as it starts running
pub const PANIC_INPUT: &str = "panic!";

/// Tag the interpreter reports when evaluation hits an unbound name
pub const UNDEFINED_VARIABLE_TAG: &str = "ERROR_UNDEFINED_VARIABLE";

pub const IDENTIFIER_LEN: usize = 16;

/// Words the interpreter gives meaning to; a probe identifier must avoid them
const RESERVED_WORDS: &[&str] = &[
    "and", "as", "auto", "bool", "bot", "catch", "cast", "cons", "core", "else", "exception",
    "extend", "false", "fix", "fn", "fold", "generic", "if", "in", "inl", "inr", "language",
    "let", "letrec", "list", "match", "nat", "new", "not", "or", "panic", "record", "return",
    "succ", "then", "throw", "top", "true", "try", "type", "unfold", "unit", "variant", "with",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeStrategy {
    /// Feed `panic!`; only the typechecking banner means ill-typed
    Panic,
    /// Feed a fresh unbound identifier; only an undefined-variable error
    /// echoing that identifier means well-typed
    #[default]
    UndefinedIdentifier,
}

/// Outcome of a typecheck probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypecheckResult {
    WellTyped,
    IllTyped { detail: String },
}

impl TypecheckResult {
    pub fn is_well_typed(&self) -> bool {
        matches!(self, TypecheckResult::WellTyped)
    }

    /// Text written to an oracle file: empty when well-typed
    pub fn oracle_text(&self) -> &str {
        match self {
            TypecheckResult::WellTyped => "",
            TypecheckResult::IllTyped { detail } => detail,
        }
    }
}

/// One single-use probe: the input to inject and how to read the result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    strategy: ProbeStrategy,
    input: String,
}

impl Probe {
    pub fn new(strategy: ProbeStrategy) -> Self {
        let input = match strategy {
            ProbeStrategy::Panic => PANIC_INPUT.to_string(),
            ProbeStrategy::UndefinedIdentifier => fresh_identifier(),
        };
        Self { strategy, input }
    }

    pub fn strategy(&self) -> ProbeStrategy {
        self.strategy
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Decide well-typedness from the harness output
    pub fn interpret(&self, raw_output: &str) -> TypecheckResult {
        let output = raw_output.trim();

        let well_typed = match self.strategy {
            ProbeStrategy::Panic => !output
                .to_lowercase()
                .starts_with(&TYPECHECK_BANNER.to_lowercase()),
            ProbeStrategy::UndefinedIdentifier => {
                output.contains(UNDEFINED_VARIABLE_TAG) && output.contains(self.input.as_str())
            }
        };

        if well_typed {
            TypecheckResult::WellTyped
        } else {
            TypecheckResult::IllTyped {
                detail: output.to_string(),
            }
        }
    }
}

const fn longest_word(words: &[&str]) -> usize {
    let mut longest = 0;
    let mut i = 0;
    while i < words.len() {
        if words[i].len() > longest {
            longest = words[i].len();
        }
        i += 1;
    }
    longest
}

// Identifiers are longer than any keyword, so they can never collide with one
const _: () = assert!(IDENTIFIER_LEN > longest_word(RESERVED_WORDS));

/// Largest multiple of 26 that fits in a byte; bytes at or above it are redrawn
const UNBIASED_LIMIT: u8 = 234;

/// Random lowercase identifier that no program or keyword will contain
pub fn fresh_identifier() -> String {
    let mut ident = String::with_capacity(IDENTIFIER_LEN);

    while ident.len() < IDENTIFIER_LEN {
        let uuid = Uuid::new_v4();
        for (i, &byte) in uuid.as_bytes().iter().enumerate() {
            // Bytes 6 and 8 carry the version and variant bits
            if i == 6 || i == 8 || byte >= UNBIASED_LIMIT {
                continue;
            }
            if ident.len() == IDENTIFIER_LEN {
                break;
            }
            ident.push((b'a' + byte % 26) as char);
        }
    }

    ident
}
