use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::cache::{KeyValueStore, ReportCache, LOCAL_ID_PREFIX};
use crate::db::RemoteStore;
use crate::error::StoreError;
use crate::models::{Lga, NewReport, Report, ReportStatus, Team};
use crate::teams::{self, MONTHS, WEEKS};

/// How long a finished submission stays on screen before the form resets.
pub const CONFIRMATION_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("select an LGA")]
    MissingLga,

    #[error("select a team")]
    MissingTeam,

    #[error("team {team_id} does not report under {lga}")]
    TeamNotInLga { team_id: String, lga: Lga },

    #[error("week must be between 1 and 4, got {0}")]
    InvalidWeek(u8),

    #[error("unknown reporting month '{0}'")]
    UnknownMonth(String),
}

/// Raw submission form input.
#[derive(Debug, Clone)]
pub struct ReportDraft {
    pub lga: Option<Lga>,
    pub team_id: Option<String>,
    pub month: String,
    pub week: u8,
    pub score: u32,
    pub status: ReportStatus,
}

impl ReportDraft {
    pub fn validate(&self, teams: &[Team]) -> Result<NewReport, ValidationError> {
        let lga = self.lga.ok_or(ValidationError::MissingLga)?;
        let team_id = self
            .team_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ValidationError::MissingTeam)?;

        if !teams::teams_in(teams, lga).any(|team| team.id == team_id) {
            return Err(ValidationError::TeamNotInLga { team_id: team_id.to_string(), lga });
        }
        if !WEEKS.contains(&self.week) {
            return Err(ValidationError::InvalidWeek(self.week));
        }
        if !MONTHS.contains(&self.month.as_str()) {
            return Err(ValidationError::UnknownMonth(self.month.clone()));
        }

        Ok(NewReport {
            team_id: team_id.to_string(),
            month: self.month.clone(),
            week: self.week,
            score: match self.status {
                ReportStatus::Present => self.score,
                ReportStatus::Absent | ReportStatus::NoData => 0,
            },
            status: self.status,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Accepted by the remote store.
    Synced(Report),
    /// Remote write failed; kept locally until an explicit sync.
    PendingSync { report: Report, error: StoreError },
    /// Remote store refused the write; kept locally, needs an administrator.
    PermissionDenied { report: Report, error: StoreError },
}

impl SubmissionOutcome {
    pub fn report(&self) -> &Report {
        match self {
            Self::Synced(report)
            | Self::PendingSync { report, .. }
            | Self::PermissionDenied { report, .. } => report,
        }
    }
}

/// Saves a validated report: one remote attempt, then on failure one local
/// write. Never retries. A failing local write is returned as an error.
pub async fn submit_report<S: KeyValueStore>(
    remote: &dyn RemoteStore,
    cache: &ReportCache<S>,
    report: NewReport,
) -> anyhow::Result<SubmissionOutcome> {
    let error = match remote.save_report(&report).await {
        Ok(saved) => {
            tracing::info!(id = %saved.id, team_id = %saved.team_id, "report saved remotely");
            return Ok(SubmissionOutcome::Synced(saved));
        }
        Err(error) => error,
    };

    let local = report.into_report(format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4()), Utc::now());
    cache
        .save_report(&local)
        .context("remote save failed and the local fallback could not be written")?;
    tracing::warn!(%error, id = %local.id, "remote save failed, report kept locally");

    Ok(if error.is_permission_denied() {
        SubmissionOutcome::PermissionDenied { report: local, error }
    } else {
        SubmissionOutcome::PendingSync { report: local, error }
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
    Finished(SubmissionOutcome),
}

/// Submission form lifecycle: idle, submitting, a finished outcome shown for
/// `display_delay`, then idle again.
///
/// This models the form for interactive embedders. The one-shot CLI prints
/// the outcome and exits without waiting out [`SubmissionFlow::settle`].
#[derive(Debug)]
pub struct SubmissionFlow {
    state: SubmissionState,
    display_delay: Duration,
}

impl Default for SubmissionFlow {
    fn default() -> Self {
        Self::new(CONFIRMATION_DELAY)
    }
}

impl SubmissionFlow {
    pub fn new(display_delay: Duration) -> Self {
        Self { state: SubmissionState::Idle, display_delay }
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    /// Validation failures leave the flow idle without touching either store.
    pub async fn submit<S: KeyValueStore>(
        &mut self,
        remote: &dyn RemoteStore,
        cache: &ReportCache<S>,
        teams: &[Team],
        draft: &ReportDraft,
    ) -> anyhow::Result<SubmissionOutcome> {
        let report = draft.validate(teams)?;

        self.state = SubmissionState::Submitting;
        match submit_report(remote, cache, report).await {
            Ok(outcome) => {
                self.state = SubmissionState::Finished(outcome.clone());
                Ok(outcome)
            }
            Err(error) => {
                self.state = SubmissionState::Idle;
                Err(error)
            }
        }
    }

    /// Waits out the confirmation display and returns to idle.
    pub async fn settle(&mut self) {
        if matches!(self.state, SubmissionState::Finished(_)) {
            tokio::time::sleep(self.display_delay).await;
        }
        self.state = SubmissionState::Idle;
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub pushed: usize,
    pub remaining: usize,
    pub error: Option<StoreError>,
}

/// Pushes cached reports the remote store does not hold yet, oldest first,
/// one attempt each. Each report keeps its id and submission time. Stops at
/// the first failure.
pub async fn sync_pending<S: KeyValueStore>(
    remote: &dyn RemoteStore,
    cache: &ReportCache<S>,
) -> anyhow::Result<SyncSummary> {
    let pending = cache.pending_reports();
    let mut summary = SyncSummary { remaining: pending.len(), ..SyncSummary::default() };

    for report in pending {
        match remote.restore_report(&report).await {
            Ok(saved) => {
                cache.mark_synced(&saved.id)?;
                tracing::info!(id = %saved.id, "pending report synced");
                summary.pushed += 1;
                summary.remaining -= 1;
            }
            Err(error) => {
                tracing::warn!(%error, id = %report.id, "sync stopped");
                summary.error = Some(error);
                break;
            }
        }
    }

    Ok(summary)
}

/// What happened to the remote copy of a deleted report.
#[derive(Debug, PartialEq, Eq)]
pub enum RemoteDeletion {
    Deleted,
    NotFound,
    /// The remote store was unreachable; its copy, if any, is still there.
    Untouched(StoreError),
}

#[derive(Debug, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub remote: RemoteDeletion,
    pub local: bool,
}

impl DeleteOutcome {
    pub fn removed(&self) -> bool {
        self.local || self.remote == RemoteDeletion::Deleted
    }
}

/// Deletes a report from the remote store and the cache. An unreachable
/// remote still lets the cached copy go; a permission or unknown error
/// leaves both stores alone and is returned.
pub async fn delete_report<S: KeyValueStore>(
    remote: &dyn RemoteStore,
    cache: &ReportCache<S>,
    id: &str,
) -> anyhow::Result<DeleteOutcome> {
    let remote = match remote.delete_report(id).await {
        Ok(true) => RemoteDeletion::Deleted,
        Ok(false) => RemoteDeletion::NotFound,
        Err(StoreError::Unavailable(reason)) => {
            tracing::warn!(%reason, id, "remote unavailable, deleting the cached copy only");
            RemoteDeletion::Untouched(StoreError::Unavailable(reason))
        }
        Err(error) => return Err(error.into()),
    };
    let local = cache.delete_report(id)?;
    Ok(DeleteOutcome { remote, local })
}
