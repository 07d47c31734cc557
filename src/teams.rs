use crate::models::{Lga, Team};

/// LGAs currently collecting weekly reports.
pub const REPORTING_LGAS: [Lga; 5] = [
    Lga::Batagarawa,
    Lga::Katsina,
    Lga::Daura,
    Lga::Malumfashi,
    Lga::Kankia,
];

pub const MONTHS: [&str; 12] = [
    "Jan-26", "Feb-26", "Mar-26", "Apr-26", "May-26", "Jun-26", "Jul-26", "Aug-26", "Sep-26",
    "Oct-26", "Nov-26", "Dec-26",
];

pub const WEEKS: std::ops::RangeInclusive<u8> = 1..=4;

pub const TEAMS: [Team; 14] = [
    Team { id: "02162", lga: Lga::Katsina, members: &["ZUWAIRA KALLA", "DOGARA MUSA"], color: "#f97316" },
    Team { id: "02496", lga: Lga::Katsina, members: &["ALICE AMEH", "NIMMYEL FRIDAY"], color: "#0f172a" },
    Team { id: "02492", lga: Lga::Katsina, members: &["JAMES OLATEJU", "PATIENCE GABRIEL"], color: "#0891b2" },
    Team { id: "03101", lga: Lga::Batagarawa, members: &["SANI ABUBAKAR", "YUSUF BELLO"], color: "#ef4444" },
    Team { id: "03102", lga: Lga::Batagarawa, members: &["AMINU LAWAL", "HALIMA IDRIS"], color: "#f43f5e" },
    Team { id: "04101", lga: Lga::Daura, members: &["MUSA DAURA", "IBRAHIM SANI"], color: "#8b5cf6" },
    Team { id: "04102", lga: Lga::Daura, members: &["SAFIYA USMAN", "BELLO ADAMU"], color: "#a78bfa" },
    Team { id: "05101", lga: Lga::Malumfashi, members: &["UMAR FARUK", "AISHA KABIR"], color: "#10b981" },
    Team { id: "05102", lga: Lga::Malumfashi, members: &["GABRIEL OKOH", "MARYAM JIBRIL"], color: "#059669" },
    Team { id: "06101", lga: Lga::Kankia, members: &["SHEHU MUSA", "ZAINAB ALIYU"], color: "#f59e0b" },
    Team { id: "06102", lga: Lga::Kankia, members: &["KABIRU ISAH", "FATIMA AHMED"], color: "#d97706" },
    Team { id: "02495", lga: Lga::Katsina, members: &["SENJONG DAWULENG", "OGAR IYOWO"], color: "#15803d" },
    Team { id: "02166", lga: Lga::Katsina, members: &["FATIMA YUSUF", "VICTOR BALA"], color: "#a21caf" },
    Team { id: "02697", lga: Lga::Katsina, members: &["PEACE JOSEPH", "JAMES AYEREWAJU"], color: "#65a30d" },
];

pub fn find_team<'a>(teams: &'a [Team], team_id: &str) -> Option<&'a Team> {
    teams.iter().find(|team| team.id == team_id)
}

pub fn teams_in(teams: &[Team], lga: Lga) -> impl Iterator<Item = &Team> {
    teams.iter().filter(move |team| team.lga == lga)
}

/// LGA label for display; orphaned team ids render as "unknown".
pub fn lga_label(teams: &[Team], team_id: &str) -> &'static str {
    find_team(teams, team_id)
        .map(|team| team.lga.as_str())
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_ids_are_unique() {
        let mut ids: Vec<&str> = TEAMS.iter().map(|team| team.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), TEAMS.len());
    }

    #[test]
    fn every_team_reports_under_an_active_lga() {
        assert!(TEAMS.iter().all(|team| REPORTING_LGAS.contains(&team.lga)));
        assert_eq!(teams_in(&TEAMS, Lga::Daura).count(), 2);
        assert_eq!(teams_in(&TEAMS, Lga::Mani).count(), 0);
    }

    #[test]
    fn orphaned_team_renders_unknown() {
        assert_eq!(lga_label(&TEAMS, "02162"), "KATSINA");
        assert_eq!(lga_label(&TEAMS, "99999"), "unknown");
    }
}
