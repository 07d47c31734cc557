use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use dlc_weekly_reports::cache::{FileStore, ReportCache};
use dlc_weekly_reports::config::Config;
use dlc_weekly_reports::db::{OfflineStore, PgReportStore, RemoteStore};
use dlc_weekly_reports::error::{self, StoreError};
use dlc_weekly_reports::models::{Lga, Report, ReportStatus, TeamStanding};
use dlc_weekly_reports::session::{self, SessionStore, UserRole};
use dlc_weekly_reports::submit::{self, RemoteDeletion, ReportDraft, SubmissionFlow, SubmissionOutcome};
use dlc_weekly_reports::teams::{self, REPORTING_LGAS, TEAMS};
use dlc_weekly_reports::{dashboard, export, report};

#[derive(Parser)]
#[command(name = "dlc-reports")]
#[command(about = "Weekly DLC team reporting portal for DL4ALL Katsina State", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the remote report collection
    InitDb,
    /// Load sample reports into the remote collection
    Seed,
    /// List the configured teams
    Teams {
        #[arg(long)]
        lga: Option<Lga>,
    },
    /// Start a session as an administrator or field officer
    Login {
        #[arg(long, default_value = "FIELD_OFFICER")]
        role: UserRole,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        lga: Option<Lga>,
        #[arg(long)]
        passcode: Option<String>,
    },
    /// End the current session
    Logout,
    /// Show the current session
    Whoami,
    /// Submit a weekly team report
    Submit {
        #[arg(long)]
        lga: Option<Lga>,
        #[arg(long)]
        team: String,
        #[arg(long, default_value = "Jan-26")]
        month: String,
        #[arg(long, default_value_t = 1)]
        week: u8,
        #[arg(long, default_value = "P")]
        status: ReportStatus,
        #[arg(long, default_value_t = 0)]
        score: u32,
    },
    /// Rank teams by total score
    Leaderboard {
        #[arg(long, default_value_t = 15)]
        limit: usize,
    },
    /// List individual submissions, newest first
    Records {
        #[arg(long)]
        lga: Option<Lga>,
    },
    /// Delete one report by id
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Remove every locally cached report, including unsynced ones
    ClearCache,
    /// Merge a JSON backup into the local cache
    Import {
        #[arg(long)]
        json: PathBuf,
    },
    /// Export submissions as CSV
    ExportCsv {
        #[arg(long)]
        lga: Option<Lga>,
        #[arg(long, default_value = "dlc-reports.csv")]
        out: PathBuf,
    },
    /// Export every report as a JSON backup
    ExportJson {
        #[arg(long, default_value = "dlc-reports-backup.json")]
        out: PathBuf,
    },
    /// Push locally saved reports to the remote collection
    Sync,
    /// Follow the leaderboard live until interrupted
    Watch {
        #[arg(long, default_value_t = 15)]
        limit: usize,
    },
    /// Generate a markdown summary
    Report {
        #[arg(long)]
        lga: Option<Lga>,
        #[arg(long, default_value = "dlc-report.md")]
        out: PathBuf,
    },
}

struct Portal {
    config: Config,
    cache: ReportCache<FileStore>,
    sessions: SessionStore<FileStore>,
    remote: Option<PgReportStore>,
}

impl Portal {
    fn open(config: Config) -> anyhow::Result<Self> {
        let store = FileStore::open(&config.cache_dir).with_context(|| {
            format!("failed to open the local cache at {}", config.cache_dir.display())
        })?;
        let remote = config
            .database_url
            .as_deref()
            .map(|url| PgReportStore::connect_lazy(url, config.remote_timeout))
            .transpose()?;

        Ok(Self {
            cache: ReportCache::new(store.clone()),
            sessions: SessionStore::new(store),
            remote,
            config,
        })
    }

    fn remote(&self) -> &dyn RemoteStore {
        match &self.remote {
            Some(store) => store as &dyn RemoteStore,
            None => &OfflineStore,
        }
    }

    fn postgres(&self) -> anyhow::Result<&PgReportStore> {
        self.remote
            .as_ref()
            .context("DATABASE_URL must be set to the portal's Postgres instance")
    }

    /// Remote snapshot plus pending local reports, or the cache alone when the
    /// remote store cannot be read.
    async fn current_reports(&self) -> Vec<Report> {
        match self.remote().fetch_reports().await {
            Ok(remote) => {
                if let Err(error) = self.cache.mirror_remote(&remote) {
                    tracing::warn!(%error, "could not refresh the local cache");
                }
                dashboard::merge_by_id(&remote, &self.cache.pending_reports())
            }
            Err(error) => {
                report_store_error(&error);
                println!("(showing locally cached data)");
                dashboard::merge_by_id(&self.cache.get_reports(), &[])
            }
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn report_store_error(error: &StoreError) {
    if error.is_permission_denied() {
        eprintln!("{}", error::permission_banner(error));
    } else {
        tracing::warn!(%error, "remote store unreachable");
    }
}

fn print_leaderboard(standings: &[TeamStanding], limit: usize) {
    println!("Team leaderboard (highest to lowest):");
    for (rank, standing) in standings.iter().take(limit).enumerate() {
        println!(
            "{:>2}. {} [{}] {} total {} from {} reports ({:.1}% present)",
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let portal = Portal::open(Config::from_env()?)?;

    match cli.command {
        Commands::InitDb => {
            portal.sessions.require_admin()?;
            portal.postgres()?.init_db().await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            portal.sessions.require_admin()?;
            let inserted = portal.postgres()?.seed().await?;
            println!("Inserted {inserted} seed reports.");
        }
        Commands::Teams { lga: wanted } => {
            for lga in REPORTING_LGAS.into_iter().filter(|lga| wanted.map_or(true, |w| *lga == w)) {
                println!("{lga}:");
                for team in teams::teams_in(&TEAMS, lga) {
                    println!("  {} {} ({})", team.id, team.members.join(" & "), team.color);
                }
            }
        }
        Commands::Login {
            role,
            name,
            lga,
            passcode,
        } => {
            let user = session::login(
                role,
                &name,
                lga,
                passcode.as_deref(),
                &portal.config.admin_passcode,
            )?;
            portal.sessions.save(&user)?;
            println!("Logged in as {} ({}).", user.name, user.role);
        }
        Commands::Logout => {
            portal.sessions.clear()?;
            println!("Logged out.");
        }
        Commands::Whoami => match portal.sessions.current() {
            Some(user) => match user.lga {
                Some(lga) => println!("{} ({}, {lga})", user.name, user.role),
                None => println!("{} ({})", user.name, user.role),
            },
            None => println!("Not logged in."),
        },
        Commands::Submit {
            lga,
            team,
            month,
            week,
            status,
            score,
        } => {
            let user = portal.sessions.require_user()?;
            let draft = ReportDraft {
                lga: lga.or(user.lga),
                team_id: Some(team),
                month,
                week,
                score,
                status,
            };

            let mut flow = SubmissionFlow::default();
            let outcome = flow.submit(portal.remote(), &portal.cache, &TEAMS, &draft).await?;
            tracing::debug!(state = ?flow.state(), "submission finished");
            match &outcome {
                SubmissionOutcome::Synced(report) => {
                    println!("Report {} submitted for team {}.", report.id, report.team_id);
                }
                SubmissionOutcome::PendingSync { report, error } => {
                    println!(
                        "Remote store unreachable ({error}). Report {} saved locally, pending sync.",
                        report.id
                    );
                }
                SubmissionOutcome::PermissionDenied { report, error } => {
                    eprintln!("{}", error::permission_banner(error));
                    println!("Report {} saved locally until access is restored.", report.id);
                }
            }
        }
        Commands::Leaderboard { limit } => {
            portal.sessions.require_user()?;
            let reports = portal.current_reports().await;
            print_leaderboard(&dashboard::leaderboard(&TEAMS, &reports), limit);
        }
        Commands::Records { lga } => {
            portal.sessions.require_user()?;
            let reports = portal.current_reports().await;
            let records = dashboard::filter_records(&TEAMS, &reports, lga);

            if records.is_empty() {
                println!("No records found for this selection.");
                return Ok(());
            }

            println!("{} records:", records.len());
            for report in records {
                println!(
                    "- {} {} [{}] {} week {} {:<3} score {} ({})",
                    report.submitted_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    report.team_id,
                    teams::lga_label(&TEAMS, &report.team_id),
                    report.month,
                    report.week,
                    report.status.as_str(),
                    report.score,
                    report.id
                );
            }
        }
        Commands::Delete { id } => {
            portal.sessions.require_admin()?;
            let outcome = match submit::delete_report(portal.remote(), &portal.cache, &id).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    if let Some(store_error) = error.downcast_ref::<StoreError>() {
                        report_store_error(store_error);
                    }
                    return Err(error).context("remote delete failed");
                }
            };

            if outcome.removed() {
                println!("Deleted report {id}.");
            } else {
                println!("No report with id {id}.");
            }
            if let RemoteDeletion::Untouched(error) = &outcome.remote {
                println!("Remote copy not touched ({error}); it will reappear on the next remote read if it exists there.");
            }
        }
        Commands::ClearCache => {
            portal.sessions.require_admin()?;
            let pending = portal.cache.pending_reports().len();
            portal.cache.clear_all()?;
            if pending > 0 {
                println!("Local cache cleared ({pending} unsynced reports discarded).");
            } else {
                println!("Local cache cleared.");
            }
        }
        Commands::Import { json } => {
            portal.sessions.require_admin()?;
            let text = std::fs::read_to_string(&json)
                .with_context(|| format!("failed to read {}", json.display()))?;
            let added = portal.cache.import_reports(&text)?;
            println!("Imported {added} new reports from {}.", json.display());
        }
        Commands::ExportCsv { lga, out } => {
            portal.sessions.require_user()?;
            let reports = portal.current_reports().await;
            let records = dashboard::filter_records(&TEAMS, &reports, lga);
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            export::write_csv(file, &TEAMS, &records, &Local)?;
            println!("Exported {} records to {}.", records.len(), out.display());
        }
        Commands::ExportJson { out } => {
            portal.sessions.require_admin()?;
            let reports = portal.current_reports().await;
            std::fs::write(&out, export::to_json(&reports)?)?;
            println!("Backed up {} reports to {}.", reports.len(), out.display());
        }
        Commands::Sync => {
            portal.sessions.require_admin()?;
            let summary = submit::sync_pending(portal.remote(), &portal.cache).await?;
            println!(
                "Synced {} pending reports, {} still pending.",
                summary.pushed, summary.remaining
            );
            if let Some(error) = &summary.error {
                report_store_error(error);
            }
        }
        Commands::Watch { limit } => {
            portal.sessions.require_user()?;
            let (data_tx, mut data_rx) = mpsc::unbounded_channel();
            let (error_tx, mut error_rx) = mpsc::unbounded_channel();
            let subscription = portal.remote().subscribe_to_reports(
                Box::new(move |reports| {
                    let _ = data_tx.send(reports);
                }),
                Box::new(move |error| {
                    let _ = error_tx.send(error);
                }),
            );

            loop {
                tokio::select! {
                    Some(reports) = data_rx.recv() => {
                        if let Err(error) = portal.cache.mirror_remote(&reports) {
                            tracing::warn!(%error, "could not refresh the local cache");
                        }
                        let merged = dashboard::merge_by_id(&reports, &portal.cache.pending_reports());
                        println!("\n[{}] {} reports", Local::now().format("%H:%M:%S"), merged.len());
                        print_leaderboard(&dashboard::leaderboard(&TEAMS, &merged), limit);
                    }
                    Some(error) = error_rx.recv() => {
                        report_store_error(&error);
                        println!("(live updates stopped, showing locally cached data)");
                        let cached = portal.cache.get_reports();
                        print_leaderboard(&dashboard::leaderboard(&TEAMS, &cached), limit);
                        break;
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }

            subscription.cancel();
        }
        Commands::Report { lga, out } => {
            portal.sessions.require_user()?;
            let reports = portal.current_reports().await;
            let report = report::build_report(&TEAMS, lga, Utc::now(), &reports);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
