//! TOML question-set parser.
//!
//! Loads question sets from TOML files and directories, and validates them.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::bank::default_time_limit;
use crate::model::{check_level, Domain, Expected, Payload, Question, MAX_LEVEL};

/// Fewest questions a level should hold.
pub const MIN_QUESTIONS: usize = 3;
/// Most questions a level should hold.
pub const MAX_QUESTIONS: usize = 8;

/// A parsed question set covering the levels of one domain.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionSet {
    pub name: String,
    pub domain: Domain,
    /// Level number to its ordered questions.
    pub levels: BTreeMap<u8, Vec<Question>>,
}

impl QuestionSet {
    pub fn question_count(&self) -> usize {
        self.levels.values().map(Vec::len).sum()
    }
}

/// Intermediate TOML structure for parsing question-set files.
#[derive(Debug, Deserialize)]
struct TomlQuestionFile {
    question_set: TomlHeader,
    #[serde(default)]
    levels: Vec<TomlLevel>,
}

#[derive(Debug, Deserialize)]
struct TomlHeader {
    name: String,
    domain: String,
    #[serde(default)]
    default_time_limit_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TomlLevel {
    level: u8,
    #[serde(default)]
    time_limit_ms: Option<u64>,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    #[serde(flatten)]
    payload: Payload,
    #[serde(default)]
    expected: Option<toml::Value>,
    #[serde(default)]
    time_limit_ms: Option<u64>,
}

/// Parse a single TOML file into a `QuestionSet`.
pub fn parse_question_set(path: &Path) -> Result<QuestionSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question set file: {}", path.display()))?;

    parse_question_set_str(&content, path)
}

/// Parse a TOML string into a `QuestionSet` (useful for testing).
pub fn parse_question_set_str(content: &str, source_path: &Path) -> Result<QuestionSet> {
    let parsed: TomlQuestionFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let domain: Domain = parsed
        .question_set
        .domain
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{}", e))?;

    let mut levels = BTreeMap::new();
    for l in parsed.levels {
        let level = check_level(l.level)?;
        let level_limit = l
            .time_limit_ms
            .or(parsed.question_set.default_time_limit_ms)
            .map(Duration::from_millis)
            .unwrap_or_else(|| default_time_limit(domain, level));

        let questions = l
            .questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| -> Result<Question> {
                anyhow::ensure!(
                    q.payload.domain() == domain,
                    "level {level} question {i}: a {} question in a {domain} set",
                    q.payload.domain()
                );
                let expected = match q.expected {
                    Some(v) => Expected::parse(domain, &value_text(&v)?)
                        .map_err(|e| anyhow::anyhow!("level {level} question {i}: {e}"))?,
                    None => q.payload.default_expected(),
                };
                let limit = q
                    .time_limit_ms
                    .map(Duration::from_millis)
                    .unwrap_or(level_limit);
                anyhow::ensure!(
                    !limit.is_zero(),
                    "level {level} question {i}: time limit must be positive"
                );
                Ok(Question {
                    payload: q.payload,
                    expected,
                    time_limit_ms: limit.as_millis() as u64,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if levels.insert(level, questions).is_some() {
            anyhow::bail!("level {level} is defined twice");
        }
    }

    Ok(QuestionSet {
        name: parsed.question_set.name,
        domain,
        levels,
    })
}

fn value_text(value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        other => anyhow::bail!("unsupported expected value: {other}"),
    }
}

/// Recursively load all `.toml` question-set files from a directory.
pub fn load_question_directory(dir: &Path) -> Result<Vec<QuestionSet>> {
    let mut sets = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            sets.extend(load_question_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_question_set(&path) {
                Ok(set) => sets.push(set),
                Err(e) => {
                    tracing::warn!("skipping {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(sets)
}

/// Load a single file or every file under a directory.
pub fn load_question_sets(path: &Path) -> Result<Vec<QuestionSet>> {
    if path.is_dir() {
        load_question_directory(path)
    } else {
        Ok(vec![parse_question_set(path)?])
    }
}

/// A warning from question-set validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The level (if applicable).
    pub level: Option<u8>,
    /// Warning message.
    pub message: String,
}

/// Validate a question set for common issues.
pub fn validate_question_set(set: &QuestionSet) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for level in 1..=MAX_LEVEL {
        if !set.levels.contains_key(&level) {
            warnings.push(ValidationWarning {
                level: Some(level),
                message: "level is missing and cannot be started".into(),
            });
        }
    }

    for (&level, questions) in &set.levels {
        if questions.is_empty() {
            warnings.push(ValidationWarning {
                level: Some(level),
                message: "level has no questions and cannot be started".into(),
            });
        } else if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&questions.len()) {
            warnings.push(ValidationWarning {
                level: Some(level),
                message: format!(
                    "level has {} questions, expected {MIN_QUESTIONS} to {MAX_QUESTIONS}",
                    questions.len()
                ),
            });
        }

        for (i, q) in questions.iter().enumerate() {
            if let Some(problem) = unreachable_answer(q) {
                warnings.push(ValidationWarning {
                    level: Some(level),
                    message: format!("question {i}: {problem}"),
                });
            }
        }
    }

    warnings
}

/// Describe why a question's expected answer cannot be given, if it cannot.
fn unreachable_answer(q: &Question) -> Option<String> {
    match (&q.payload, &q.expected) {
        (Payload::LetterPair { target, distractor }, Expected::Letter(e))
            if e != target && e != distractor =>
        {
            Some(format!("expected '{e}' is not one of '{target}' and '{distractor}'"))
        }
        (Payload::LetterPair { target, distractor }, _) if target == distractor => {
            Some(format!("letter pair shows '{target}' twice"))
        }
        (Payload::NumberPair { left, right }, Expected::Number(e)) if e != left && e != right => {
            Some(format!("expected {e} is not one of {left} and {right}"))
        }
        (Payload::Star { cells, .. }, Expected::Target(e)) if e >= cells => {
            Some(format!("target {e} is outside a {cells}-cell grid"))
        }
        _ => None,
    }
}
