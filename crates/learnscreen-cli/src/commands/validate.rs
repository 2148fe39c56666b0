//! The `learnscreen validate` command.

use std::path::PathBuf;

use anyhow::Result;

pub fn execute(questions_path: PathBuf) -> Result<()> {
    let sets = if questions_path.is_dir() {
        learnscreen_core::parser::load_question_directory(&questions_path)?
    } else {
        vec![learnscreen_core::parser::parse_question_set(&questions_path)?]
    };

    let mut total_warnings = 0;

    for set in &sets {
        println!(
            "Question set: {} ({}, {} questions)",
            set.name,
            set.domain,
            set.question_count()
        );

        let warnings = learnscreen_core::parser::validate_question_set(set);
        for w in &warnings {
            let prefix = w
                .level
                .map(|level| format!("  [level {level}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All question sets valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
