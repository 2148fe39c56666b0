//! The `learnscreen report` command.

use std::path::PathBuf;

use anyhow::Result;

use learnscreen_core::report::ScreeningReport;
use learnscreen_store::config::load_config_from;
use learnscreen_store::create_store;

use super::profile::print_profile;

pub async fn execute(user_id: String, output: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = create_store(&config.store)?;

    let games = store.read_game_summaries(&user_id).await?;
    anyhow::ensure!(!games.is_empty(), "no games recorded for {user_id}");
    let report = ScreeningReport::new(user_id, games);

    print_profile(&report.profile);

    let timestamp = report.created_at.format("%Y-%m-%dT%H%M%S");
    let path = output.join(format!("{}-{timestamp}.json", report.user_id));
    report.save_json(&path)?;
    eprintln!("\nReport saved to: {}", path.display());

    Ok(())
}
