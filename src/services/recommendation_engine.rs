use crate::models::conflict::ConflictReport;
use crate::models::resolution::{Recommendation, RecommendationAction, RecommendationPriority};

/// Maps a conflict report to remediation steps, most urgent first.
///
/// Each category is checked on its own; location gaps have no dedicated
/// action because they usually surface again as missing weeks.
pub fn recommend(report: &ConflictReport) -> Vec<Recommendation> {
    let conflicts = &report.conflicts;
    let mut recommendations = Vec::new();

    if !conflicts.duplicates.is_empty() {
        recommendations.push(Recommendation {
            priority: RecommendationPriority::High,
            action: RecommendationAction::ResolveDuplicates,
            message: format!(
                "{} week(s) are planned more than once; keep one entry per week",
                conflicts.duplicates.len()
            ),
        });
    }

    if !conflicts.missing_weeks.is_empty() {
        recommendations.push(Recommendation {
            priority: RecommendationPriority::High,
            action: RecommendationAction::CreateMissing,
            message: format!(
                "{} contract week(s) have no calendar entry; plan them",
                conflicts.missing_weeks.len()
            ),
        });
    }

    if !conflicts.rhythm_conflicts.is_empty() {
        recommendations.push(Recommendation {
            priority: RecommendationPriority::Medium,
            action: RecommendationAction::RegularizeRhythm,
            message: format!(
                "{} contract(s) drift from their alternation rhythm; review the center/company sequence",
                conflicts.rhythm_conflicts.len()
            ),
        });
    }

    if !conflicts.holiday_conflicts.is_empty() {
        recommendations.push(Recommendation {
            priority: RecommendationPriority::Low,
            action: RecommendationAction::AdjustHolidays,
            message: format!(
                "{} company week(s) are mostly public holidays; check the location",
                conflicts.holiday_conflicts.len()
            ),
        });
    }

    recommendations
}
