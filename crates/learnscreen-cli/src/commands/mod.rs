//! Subcommand implementations and the helpers they share.

pub mod compare;
pub mod init;
pub mod play;
pub mod profile;
pub mod report;
pub mod simulate;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use learnscreen_core::bank::{BuiltinQuestionBank, QuestionSetBank};
use learnscreen_core::parser::load_question_sets;
use learnscreen_core::traits::QuestionBank;
use learnscreen_store::ScreeningConfig;

/// The configured question bank: custom sets where given, built-in otherwise.
pub(crate) fn load_bank(config: &ScreeningConfig) -> Result<Arc<dyn QuestionBank>> {
    match &config.questions.path {
        Some(path) => {
            let sets = load_question_sets(Path::new(path))?;
            let bank = QuestionSetBank::new(sets);
            tracing::debug!("using question sets from {}", path);
            Ok(Arc::new(bank))
        }
        None => Ok(Arc::new(BuiltinQuestionBank::new())),
    }
}
