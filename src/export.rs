use std::io::Write;

use chrono::{DateTime, TimeZone, Utc};

use crate::models::{Report, Team};
use crate::teams;

pub const CSV_HEADER: [&str; 7] = ["Date", "TeamID", "LGA", "Month", "Week", "Status", "Score"];

/// Calendar date as `M/D/YYYY` in the given zone.
pub fn format_date<Tz: TimeZone>(timestamp: &DateTime<Utc>, zone: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    timestamp.with_timezone(zone).format("%-m/%-d/%Y").to_string()
}

pub fn write_csv<W: Write, Tz: TimeZone>(
    writer: W,
    teams: &[Team],
    records: &[&Report],
    zone: &Tz,
) -> anyhow::Result<()>
where
    Tz::Offset: std::fmt::Display,
{
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_HEADER)?;

    for report in records {
        csv.write_record([
            format_date(&report.submitted_at, zone),
            report.team_id.clone(),
            teams::lga_label(teams, &report.team_id).to_string(),
            report.month.clone(),
            report.week.to_string(),
            report.status.to_string(),
            report.score.to_string(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

/// Pretty-printed backup, readable by `ReportCache::import_reports`.
pub fn to_json(reports: &[Report]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(reports)
}
