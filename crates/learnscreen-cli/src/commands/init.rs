//! The `learnscreen init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create learnscreen.toml
    if std::path::Path::new("learnscreen.toml").exists() {
        println!("learnscreen.toml already exists, skipping.");
    } else {
        std::fs::write("learnscreen.toml", SAMPLE_CONFIG)?;
        println!("Created learnscreen.toml");
    }

    // Create example question set and session script
    std::fs::create_dir_all("question-sets")?;
    let example_path = std::path::Path::new("question-sets/example.toml");
    if example_path.exists() {
        println!("question-sets/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_QUESTION_SET)?;
        println!("Created question-sets/example.toml");
    }

    let script_path = std::path::Path::new("session.toml");
    if script_path.exists() {
        println!("session.toml already exists, skipping.");
    } else {
        std::fs::write(script_path, EXAMPLE_SCRIPT)?;
        println!("Created session.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: learnscreen validate --questions question-sets/example.toml");
    println!("  2. Run: learnscreen simulate --script session.toml");
    println!("  3. Run: learnscreen profile --user demo-child");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# learnscreen configuration

[engine]
feedback_delay_ms = 1000
persist_timeout_ms = 5000
persist_retries = 2

# Per-game question time limits, in milliseconds.
# [engine.time_limits]
# numeric_comparison = 10000

[store]
type = "json"
path = "${HOME}/.local/share/learnscreen"

# Uncomment to use the custom question sets.
# [questions]
# path = "question-sets"
"#;

const EXAMPLE_QUESTION_SET: &str = r#"[question_set]
name = "Example number comparison"
domain = "numeric_comparison"
default_time_limit_ms = 10000

[[levels]]
level = 1

[[levels.questions]]
kind = "number_pair"
left = 2
right = 5

[[levels.questions]]
kind = "number_pair"
left = 8
right = 3

[[levels.questions]]
kind = "number_pair"
left = 6
right = 9

[[levels]]
level = 2

[[levels.questions]]
kind = "number_pair"
left = 21
right = 12

[[levels.questions]]
kind = "number_pair"
left = 34
right = 43

[[levels.questions]]
kind = "number_pair"
left = 58
right = 85

[[levels]]
level = 3

[[levels.questions]]
kind = "number_pair"
left = 314
right = 341

[[levels.questions]]
kind = "number_pair"
left = 902
right = 920

[[levels.questions]]
kind = "number_pair"
left = 777
right = 717
"#;

const EXAMPLE_SCRIPT: &str = r#"# A scripted play-through of the built-in number comparison game.
# Trials without an answer let the clock run out.
user_id = "demo-child"
domain = "numeric_comparison"

[[levels]]
level = 1

[[levels.trials]]
answer = "7"
latency_ms = 1200

[[levels.trials]]
answer = "9"
latency_ms = 900

[[levels.trials]]
answer = "4"
latency_ms = 2100

[[levels.trials]]
answer = "8"
latency_ms = 1500

[[levels.trials]]
"#;
