//! CLI output formatting.
//!
//! Formatting is kept apart from printing so the text can be tested.

use std::fmt::Write as _;

use crate::domains::championship::SeasonProjection;
use crate::domains::monte_carlo::AggregateResult;
use crate::engine::validator::{Severity, ValidationReport};
use crate::model::EventDescriptor;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Print version information.
pub fn print_version() {
    let revision = env!("RACESIM_GIT_HASH");
    if revision.is_empty() {
        println!("racesim {}", env!("CARGO_PKG_VERSION"));
    } else {
        println!("racesim {} ({revision})", env!("CARGO_PKG_VERSION"));
    }
}

/// Print help message.
pub fn print_help() {
    println!(
        r"racesim - Deterministic race outcome simulation

USAGE:
    racesim <COMMAND> <season.yaml> [OPTIONS]

COMMANDS:
    simulate <season.yaml>      Simulate one round
        --round <N>             Round to simulate (required)
        --seed <N>              Override the master seed
        --trials <N>            Override the trial count
        --json                  Print the aggregate as JSON

    season <season.yaml>        Project the championship
        --seed <N>              Override the master seed

    diagnose <season.yaml>      Run the validator battery

    help                        Show this help message
    version                     Show version information

OPTIONS (all season commands):
    --config <engine.yaml>      Engine configuration (defaults otherwise)

ENVIRONMENT:
    RUST_LOG                    Log filter (default: info)

EXAMPLES:
    racesim simulate seasons/sample_season.yaml --round 1
    racesim simulate seasons/sample_season.yaml --round 8 --seed 7 --trials 5000 --json
    racesim season seasons/sample_season.yaml
    racesim diagnose seasons/sample_season.yaml
"
    );
}

/// Human-readable event prediction.
#[must_use]
pub fn format_aggregate(result: &AggregateResult, event: &EventDescriptor) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Round {}: {} ({})", event.round, event.name, event.id);
    let _ = writeln!(
        out,
        "Trials: {} ({} lap-model), weather: {}, confidence: {:.0}",
        result.trials, result.markov_trials, result.weather, result.confidence
    );
    if result.retried_partitions > 0 {
        let _ = writeln!(out, "Retried partitions: {}", result.retried_partitions);
    }
    let _ = writeln!(out, "{RULE}\n");

    let _ = writeln!(out, "Reference grid:");
    for entry in result.grid.iter().take(10) {
        let penalty = if entry.penalty > 0 {
            format!(" (+{} penalty)", entry.penalty)
        } else {
            String::new()
        };
        let _ = writeln!(out, "  P{:<3}{}{penalty}", entry.position, entry.competitor);
    }

    let _ = writeln!(out, "\n  {:<20} {:>8} {:>8} {:>8} {:>8}", "Competitor", "Win %", "Podium %", "DNF %", "Avg");
    for o in &result.outcomes {
        let _ = writeln!(
            out,
            "  {:<20} {:>7.1}% {:>7.1}% {:>7.1}% {:>8.2}",
            o.competitor,
            o.win_probability * 100.0,
            o.podium_probability * 100.0,
            o.dnf_probability * 100.0,
            o.avg_finish
        );
    }
    let _ = writeln!(out, "\nPole conversion: {:.1}%", result.pole_conversion * 100.0);
    out
}

/// Human-readable championship projection.
#[must_use]
pub fn format_projection(projection: &SeasonProjection) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Championship projection ({} events simulated)", projection.events_simulated);
    let _ = writeln!(out, "{RULE}\n");

    let _ = writeln!(out, "Drivers:");
    for (i, d) in projection.drivers.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {:>2}. {:<20} {:>7.1} pts  ({:.1} confirmed, {:.2} wins, {:.2} podiums)",
            i + 1,
            d.competitor,
            d.projected_points,
            d.confirmed_points,
            d.expected_wins,
            d.expected_podiums
        );
    }
    let _ = writeln!(out, "\nTeams:");
    for (i, t) in projection.teams.iter().enumerate() {
        let _ = writeln!(out, "  {:>2}. {:<20} {:>7.1} pts", i + 1, t.team, t.projected_points);
    }
    let _ = writeln!(out, "\nTitle gap: {:.1} pts", projection.title_gap());
    out
}

/// Human-readable validator report.
#[must_use]
pub fn format_report(report: &ValidationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Validator battery");
    let _ = writeln!(out, "{RULE}\n");
    for check in &report.checks {
        let sym = match check.severity {
            Severity::Acceptable => "✓",
            Severity::Warning => "!",
            Severity::Critical => "✗",
        };
        let _ = writeln!(out, "  {sym} {}: {}", check.name, check.diagnostic);
    }
    let failed = report.failures().count();
    let _ = writeln!(out, "\n{RULE}");
    if failed == 0 {
        let _ = writeln!(out, "✓ All {} checks passed", report.checks.len());
    } else {
        let _ = writeln!(out, "✗ {failed} of {} checks failed (advisory)", report.checks.len());
    }
    let _ = writeln!(out, "{RULE}");
    out
}
