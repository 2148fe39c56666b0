//! Built-in and file-backed question banks.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::classifier::reaction_threshold_ms;
use crate::model::{Domain, Payload, Question};
use crate::parser::QuestionSet;
use crate::traits::QuestionBank;

/// Default per-question limit for a domain and level.
///
/// The reaction game gives exactly its reaction threshold; the others are
/// generous since they measure accuracy first.
pub fn default_time_limit(domain: Domain, level: u8) -> Duration {
    match domain {
        Domain::MotorReaction => Duration::from_millis(reaction_threshold_ms(level)),
        Domain::VisualDiscrimination | Domain::NumericComparison => Duration::from_secs(10),
        Domain::Handwriting => Duration::from_secs(60),
    }
}

/// The question sets shipped with learnscreen.
#[derive(Debug, Clone, Default)]
pub struct BuiltinQuestionBank;

impl BuiltinQuestionBank {
    pub fn new() -> Self {
        Self
    }

    fn payloads(domain: Domain, level: u8) -> Vec<Payload> {
        match domain {
            Domain::VisualDiscrimination => {
                let pairs: &[(char, char)] = match level {
                    1 => &[('b', 'd'), ('p', 'q'), ('d', 'b'), ('q', 'p')],
                    2 => &[
                        ('b', 'd'),
                        ('m', 'w'),
                        ('n', 'u'),
                        ('q', 'p'),
                        ('u', 'n'),
                        ('w', 'm'),
                    ],
                    3 => &[
                        ('d', 'b'),
                        ('p', 'q'),
                        ('b', 'p'),
                        ('q', 'd'),
                        ('n', 'h'),
                        ('m', 'n'),
                        ('s', 'z'),
                        ('f', 't'),
                    ],
                    _ => &[],
                };
                pairs
                    .iter()
                    .map(|&(target, distractor)| Payload::LetterPair { target, distractor })
                    .collect()
            }
            Domain::NumericComparison => {
                let pairs: &[(i64, i64)] = match level {
                    1 => &[(3, 7), (9, 2), (4, 5), (8, 6), (1, 10)],
                    2 => &[(23, 32), (45, 54), (67, 76), (18, 81), (39, 93), (50, 15)],
                    3 => &[
                        (123, 132),
                        (456, 465),
                        (789, 798),
                        (301, 310),
                        (999, 1000),
                        (250, 205),
                        (611, 616),
                        (707, 770),
                    ],
                    _ => &[],
                };
                pairs
                    .iter()
                    .map(|&(left, right)| Payload::NumberPair { left, right })
                    .collect()
            }
            Domain::MotorReaction => {
                // 2x2, 3x3, 4x4 grids.
                let cells = (u32::from(level) + 1).pow(2);
                let targets: &[u32] = match level {
                    1 => &[2, 0, 3, 1, 2],
                    2 => &[4, 8, 0, 6, 2, 7],
                    3 => &[5, 15, 0, 10, 3, 12, 9, 6],
                    _ => &[],
                };
                targets
                    .iter()
                    .map(|&index| Payload::Star { index, cells })
                    .collect()
            }
            Domain::Handwriting => {
                let words: &[&str] = match level {
                    1 => &["cat", "sun", "dog"],
                    2 => &["tree", "fish", "book", "milk"],
                    3 => &["apple", "house", "water", "green", "smile"],
                    _ => &[],
                };
                words
                    .iter()
                    .map(|w| Payload::Word {
                        word: (*w).to_string(),
                    })
                    .collect()
            }
        }
    }
}

impl QuestionBank for BuiltinQuestionBank {
    fn name(&self) -> &str {
        "builtin"
    }

    fn questions(&self, domain: Domain, level: u8) -> Vec<Question> {
        let limit = default_time_limit(domain, level);
        Self::payloads(domain, level)
            .into_iter()
            .map(|p| Question::new(p, limit))
            .collect()
    }
}

/// A bank built from parsed question-set files.
///
/// Domains the files do not cover fall back to the built-in bank.
#[derive(Debug, Clone, Default)]
pub struct QuestionSetBank {
    sets: BTreeMap<Domain, QuestionSet>,
    fallback: BuiltinQuestionBank,
}

impl QuestionSetBank {
    /// Later sets for the same domain replace earlier ones.
    pub fn new(sets: Vec<QuestionSet>) -> Self {
        Self {
            sets: sets.into_iter().map(|s| (s.domain, s)).collect(),
            fallback: BuiltinQuestionBank,
        }
    }

    pub fn covers(&self, domain: Domain) -> bool {
        self.sets.contains_key(&domain)
    }
}

impl QuestionBank for QuestionSetBank {
    fn name(&self) -> &str {
        "question-sets"
    }

    fn questions(&self, domain: Domain, level: u8) -> Vec<Question> {
        match self.sets.get(&domain) {
            Some(set) => set.levels.get(&level).cloned().unwrap_or_default(),
            None => self.fallback.questions(domain, level),
        }
    }
}
