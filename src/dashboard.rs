use std::collections::{HashMap, HashSet};

use crate::models::{Lga, Report, ReportStatus, StatusSummary, Team, TeamStanding};
use crate::teams;

/// Standings for every configured team, highest total first. Ties keep the
/// configured team order.
pub fn leaderboard(teams: &[Team], reports: &[Report]) -> Vec<TeamStanding> {
    let mut totals: HashMap<&str, (u64, usize, usize)> = HashMap::new();

    for report in reports {
        let entry = totals.entry(report.team_id.as_str()).or_insert((0, 0, 0));
        entry.0 += u64::from(report.credited_score());
        entry.1 += 1;
        if report.status == ReportStatus::Present {
            entry.2 += 1;
        }
    }

    let mut standings: Vec<TeamStanding> = teams
        .iter()
        .map(|team| {
            let (total_score, report_count, present_count) =
                totals.get(team.id).copied().unwrap_or_default();
            TeamStanding {
                team_id: team.id.to_string(),
                lga: team.lga,
                members: team.members.iter().map(|name| name.to_string()).collect(),
                total_score,
                report_count,
                present_count,
                presence_rate: presence_rate(present_count, report_count),
            }
        })
        .collect();

    standings.sort_by(|a, b| b.total_score.cmp(&a.total_score));
    standings
}

/// Percentage of present reports, rounded to one decimal; 0 with no reports.
pub fn presence_rate(present: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = present as f64 / total as f64 * 100.0;
    (rate * 10.0).round() / 10.0
}

/// Audit view: reports newest first, optionally limited to one LGA. Reports
/// for unknown teams never match an LGA filter.
pub fn filter_records<'a>(teams: &[Team], reports: &'a [Report], lga: Option<Lga>) -> Vec<&'a Report> {
    let mut records: Vec<&Report> = reports
        .iter()
        .filter(|report| match lga {
            Some(lga) => teams::find_team(teams, &report.team_id).is_some_and(|team| team.lga == lga),
            None => true,
        })
        .collect();

    records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    records
}

/// Union of two report sets keyed by id; the first occurrence wins. Result is
/// newest first.
pub fn merge_by_id(primary: &[Report], secondary: &[Report]) -> Vec<Report> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged: Vec<Report> = primary
        .iter()
        .chain(secondary)
        .filter(|report| seen.insert(report.id.as_str()))
        .cloned()
        .collect();

    merged.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    merged
}

pub fn summarize_by_status(reports: &[Report]) -> Vec<StatusSummary> {
    [ReportStatus::Present, ReportStatus::Absent, ReportStatus::NoData]
        .into_iter()
        .map(|status| StatusSummary {
            status,
            count: reports.iter().filter(|report| report.status == status).count(),
        })
        .collect()
}
