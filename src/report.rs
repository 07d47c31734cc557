use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::dashboard;
use crate::models::{Lga, Report, Team};
use crate::teams;

pub fn build_report(
    teams: &[Team],
    lga: Option<Lga>,
    generated_at: DateTime<Utc>,
    reports: &[Report],
) -> String {
    let records = dashboard::filter_records(teams, reports, lga);
    let in_scope: Vec<Report> = records.iter().map(|report| (*report).clone()).collect();
    let scoped_teams: Vec<Team> = teams
        .iter()
        .filter(|team| lga.map_or(true, |lga| team.lga == lga))
        .copied()
        .collect();
    let standings = dashboard::leaderboard(&scoped_teams, &in_scope);
    let statuses = dashboard::summarize_by_status(&in_scope);

    let mut output = String::new();
    let scope_label = lga.map_or("all LGAs", Lga::as_str);

    let _ = writeln!(output, "# DLC Weekly Performance Report");
    let _ = writeln!(
        output,
        "Generated for {} on {} ({} submissions)",
        scope_label,
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        in_scope.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Leaderboard");

    if in_scope.is_empty() {
        let _ = writeln!(output, "No submissions recorded yet.");
    } else {
        for (rank, standing) in standings.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. {} ({}, {}) total {} across {} reports, {:.1}% present",
                rank + 1,
                standing.team_id,
                standing.lga,
                standing.members.join(" & "),
                standing.total_score,
                standing.report_count,
                standing.presence_rate
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Mix");
    for summary in &statuses {
        let _ = writeln!(output, "- {}: {}", summary.status, summary.count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Submissions");

    if records.is_empty() {
        let _ = writeln!(output, "No submissions recorded yet.");
    } else {
        for report in records.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}) {} week {}: {} score {}",
                report.team_id,
                teams::lga_label(teams, &report.team_id),
                report.month,
                report.week,
                report.status,
                report.score
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::sample_report;
    use crate::models::ReportStatus;
    use crate::teams::TEAMS;

    #[test]
    fn report_ranks_teams_within_scope() {
        let reports = vec![
            sample_report("1", "02162", ReportStatus::Present, 40),
            sample_report("2", "02496", ReportStatus::Present, 70),
            sample_report("3", "04101", ReportStatus::Present, 90),
        ];

        let text = build_report(&TEAMS, Some(Lga::Katsina), Utc::now(), &reports);
        assert!(text.contains("Generated for KATSINA"));
        assert!(text.contains("1. 02496 (KATSINA, ALICE AMEH & NIMMYEL FRIDAY) total 70"));
        assert!(text.contains("2. 02162"));
        assert!(!text.contains("04101"));
        assert!(text.contains("- P: 2"));
    }

    #[test]
    fn empty_report_says_so() {
        let text = build_report(&TEAMS, None, Utc::now(), &[]);
        assert!(text.contains("Generated for all LGAs"));
        assert!(text.contains("No submissions recorded yet."));
    }
}
