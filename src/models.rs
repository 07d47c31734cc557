use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Lga {
    Batagarawa,
    Katsina,
    Daura,
    Malumfashi,
    Kankia,
    Mani,
    Matazu,
    Maiadua,
}

impl Lga {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Batagarawa => "BATAGARAWA",
            Self::Katsina => "KATSINA",
            Self::Daura => "DAURA",
            Self::Malumfashi => "MALUMFASHI",
            Self::Kankia => "KANKIA",
            Self::Mani => "MANI",
            Self::Matazu => "MATAZU",
            Self::Maiadua => "MAIADUA",
        }
    }
}

impl fmt::Display for Lga {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lga {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "BATAGARAWA" => Ok(Self::Batagarawa),
            "KATSINA" => Ok(Self::Katsina),
            "DAURA" => Ok(Self::Daura),
            "MALUMFASHI" => Ok(Self::Malumfashi),
            "KANKIA" => Ok(Self::Kankia),
            "MANI" => Ok(Self::Mani),
            "MATAZU" => Ok(Self::Matazu),
            "MAIADUA" => Ok(Self::Maiadua),
            other => Err(format!("unknown LGA '{other}'")),
        }
    }
}

/// Attendance status recorded for one team-week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportStatus {
    #[serde(rename = "P")]
    Present,
    #[serde(rename = "ABS")]
    Absent,
    #[serde(rename = "NDB")]
    NoData,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "P",
            Self::Absent => "ABS",
            Self::NoData => "NDB",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "P" | "PRESENT" => Ok(Self::Present),
            "ABS" | "ABSENT" => Ok(Self::Absent),
            "NDB" | "NO-DATA" | "NO_DATA" => Ok(Self::NoData),
            other => Err(format!("unknown status '{other}' (expected P, ABS or NDB)")),
        }
    }
}

/// A submitted weekly report. The serialized form is the backup/import
/// interchange format, so field names stay camelCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub team_id: String,
    pub month: String,
    pub week: u8,
    pub score: u32,
    pub status: ReportStatus,
    pub submitted_at: DateTime<Utc>,
}

impl Report {
    /// Score that counts toward a team's total.
    pub fn credited_score(&self) -> u32 {
        match self.status {
            ReportStatus::Present => self.score,
            ReportStatus::Absent | ReportStatus::NoData => 0,
        }
    }
}

/// Report fields before an id and timestamp are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReport {
    pub team_id: String,
    pub month: String,
    pub week: u8,
    pub score: u32,
    pub status: ReportStatus,
}

impl NewReport {
    pub fn into_report(self, id: String, submitted_at: DateTime<Utc>) -> Report {
        Report {
            id,
            team_id: self.team_id,
            month: self.month,
            week: self.week,
            score: self.score,
            status: self.status,
            submitted_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Team {
    pub id: &'static str,
    pub lga: Lga,
    pub members: &'static [&'static str],
    pub color: &'static str,
}

#[derive(Debug, Clone)]
pub struct TeamStanding {
    pub team_id: String,
    pub lga: Lga,
    pub members: Vec<String>,
    pub total_score: u64,
    pub report_count: usize,
    pub present_count: usize,
    pub presence_rate: f64,
}

#[derive(Debug, Clone)]
pub struct StatusSummary {
    pub status: ReportStatus,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_uses_camel_case_interchange_fields() {
        let json = r#"{
            "id": "abc",
            "teamId": "02162",
            "month": "Jan-26",
            "week": 1,
            "score": 50,
            "status": "P",
            "submittedAt": "2026-01-05T10:00:00.000Z"
        }"#;
        let report: Report = serde_json::from_str(json).expect("valid report");
        assert_eq!(report.team_id, "02162");
        assert_eq!(report.status, ReportStatus::Present);

        let value = serde_json::to_value(&report).expect("serializes");
        assert_eq!(value["teamId"], "02162");
        assert_eq!(value["status"], "P");
        assert!(value.get("submittedAt").is_some());
    }

    #[test]
    fn non_present_reports_credit_nothing() {
        let mut report = Report {
            id: "x".to_string(),
            team_id: "02162".to_string(),
            month: "Jan-26".to_string(),
            week: 2,
            score: 40,
            status: ReportStatus::Absent,
            submitted_at: Utc::now(),
        };
        assert_eq!(report.credited_score(), 0);
        report.status = ReportStatus::Present;
        assert_eq!(report.credited_score(), 40);
    }

    #[test]
    fn parses_status_and_lga_labels() {
        assert_eq!("abs".parse::<ReportStatus>(), Ok(ReportStatus::Absent));
        assert_eq!("NDB".parse::<ReportStatus>(), Ok(ReportStatus::NoData));
        assert!("late".parse::<ReportStatus>().is_err());
        assert_eq!("katsina".parse::<Lga>(), Ok(Lga::Katsina));
        assert!("lagos".parse::<Lga>().is_err());
    }
}
