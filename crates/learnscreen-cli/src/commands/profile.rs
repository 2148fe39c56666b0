//! The `learnscreen profile` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use learnscreen_core::aggregate::ChildRiskProfile;
use learnscreen_store::config::load_config_from;
use learnscreen_store::create_store;

pub async fn execute(user_id: String, format: String, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = create_store(&config.store)?;

    let games = store.read_game_summaries(&user_id).await?;
    let profile = ChildRiskProfile::compute(user_id, games);

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&profile)?),
        _ => print_profile(&profile),
    }

    Ok(())
}

pub(crate) fn print_profile(profile: &ChildRiskProfile) {
    if profile.games.is_empty() {
        println!("No games recorded for {}.", profile.user_id);
        return;
    }

    let mut games = Table::new();
    games.set_header(vec![
        "Game",
        "Levels",
        "Questions",
        "Accuracy",
        "Avg Reaction",
        "Risk",
    ]);
    for g in &profile.games {
        let o = &g.overall;
        games.add_row(vec![
            Cell::new(g.domain.title()),
            Cell::new(o.levels_completed),
            Cell::new(o.total_questions),
            Cell::new(format!("{:.1}%", o.overall_accuracy)),
            Cell::new(format!("{:.0}ms", o.overall_avg_reaction_time_ms)),
            Cell::new(o.overall_risk_tier.label()),
        ]);
    }
    println!("{games}");

    let f = &profile.factors;
    let mut factors = Table::new();
    factors.set_header(vec!["Factor", "Measure", "Points"]);
    factors.add_row(vec![
        Cell::new("Completion"),
        Cell::new(format!("{:.0}% of games", f.completion_rate * 100.0)),
        Cell::new(f.completion),
    ]);
    factors.add_row(vec![
        Cell::new("Performance"),
        Cell::new(format!("{:.2} average", f.avg_performance)),
        Cell::new(f.performance),
    ]);
    factors.add_row(vec![
        Cell::new("Consistency"),
        Cell::new(
            f.variance
                .map(|v| format!("{v:.1} variance"))
                .unwrap_or_else(|| "single game type".into()),
        ),
        Cell::new(f.consistency),
    ]);
    factors.add_row(vec![
        Cell::new("Trend"),
        Cell::new(
            f.trend_means
                .map(|(recent, older)| format!("{recent:.1} recent vs {older:.1} before"))
                .unwrap_or_else(|| "fewer than 4 games".into()),
        ),
        Cell::new(f.trend),
    ]);
    println!("\n{factors}");

    println!(
        "\nOverall risk for {}: {} (score {})",
        profile.user_id,
        profile.tier.label(),
        profile.risk_score
    );
}
