use crate::models::calendar::Location;
use crate::models::conflict::RhythmAnalysis;

/// Measures how far a week-by-week location sequence deviates from the two
/// canonical patterns: strict alternation and a single minority block.
///
/// Balanced counts (difference of at most one week) are treated as strict
/// alternation, anything else as a block rhythm where each minority week run
/// costs one transition in and one out. This is an anomaly signal; it does
/// not try to recover arbitrary N/M rhythms.
pub fn analyze(locations: &[Location]) -> RhythmAnalysis {
    let total_weeks = locations.len();
    let actual_transitions = locations
        .windows(2)
        .filter(|pair| pair[0] != pair[1])
        .count();

    let center_weeks = locations
        .iter()
        .filter(|location| **location == Location::Center)
        .count();
    let company_weeks = total_weeks - center_weeks;

    let expected_transitions = if center_weeks.abs_diff(company_weeks) <= 1 {
        total_weeks.saturating_sub(1)
    } else {
        2 * center_weeks.min(company_weeks)
    };

    let inconsistency_score = if expected_transitions == 0 {
        0.0
    } else {
        let deviation = actual_transitions.abs_diff(expected_transitions) as f64;
        (deviation / expected_transitions as f64).clamp(0.0, 1.0)
    };

    RhythmAnalysis {
        total_weeks,
        actual_transitions,
        expected_transitions,
        inconsistency_score,
        center_weeks,
        company_weeks,
    }
}
