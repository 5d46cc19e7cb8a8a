//! Scheduler entry point for the debate engine.
//!
//! Each subcommand performs one bounded unit of work and exits, so an
//! external cron or job runner can invoke it on any cadence. `watch` runs
//! the same work on its own interval instead. Overlapping invocations are
//! safe: every debate mutation is a conditional write.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use debate_engine::{
    DebateEngine, DebateId, EngineConfig, EventFilter, StateStore, SystemClock, UnlimitedQuota,
};
use debate_judges::{check_endpoint, default_panel, load_panel, HttpAdjudicator, JudgeConfig};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the RocksDB state directory
    #[arg(long, default_value = "./arena-state")]
    state_path: PathBuf,

    /// Engine config TOML (ARENA_* environment variables still apply on top)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Judge panel TOML replacing the built-in personas
    #[arg(long)]
    panel: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Advance or end every resolved round, then retry pending verdicts
    Sweep,
    /// Adjudicate ended debates still waiting for their verdict
    Drain,
    /// Process pending and stuck appeals
    ProcessAppeals,
    /// Force-reclaim and re-run one stuck appeal
    Retrigger { debate_id: String },
    /// Reject an open appeal on policy grounds
    DenyAppeal { debate_id: String, reason: String },
    /// Print the lifecycle state of a debate
    State { debate_id: String },
    /// Print a debate's verdicts grouped by adjudication pass
    Verdicts { debate_id: String },
    /// Print recent events
    Events {
        /// How far back to look
        #[arg(long, default_value_t = 60)]
        minutes: i64,
        /// Only events of this debate
        #[arg(long)]
        debate: Option<String>,
        /// Print counts instead of events
        #[arg(long, default_value_t = false)]
        stats: bool,
    },
    /// Sweep and process appeals on an interval, printing each matching
    /// event as a JSON line until interrupted
    Watch {
        /// Seconds between sweeps
        #[arg(long, default_value_t = 30)]
        interval_secs: u64,
        /// Only events of this debate
        #[arg(long)]
        debate: Option<String>,
        /// Only the transitions fanned out to users
        #[arg(long, default_value_t = false)]
        notifications: bool,
    },
    /// Delete events older than the given number of days
    PruneEvents {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
    /// Check that the judge endpoint answers
    CheckJudges,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn event_filter(debate: Option<&str>) -> EventFilter {
    match debate {
        Some(id) => EventFilter::new().debate(&DebateId::from(id)),
        None => EventFilter::new(),
    }
}

/// Run sweeps and appeal processing until ctrl-c, echoing events.
async fn watch(engine: &DebateEngine, interval: Duration, filter: EventFilter) -> Result<()> {
    anyhow::ensure!(!interval.is_zero(), "--interval-secs must be > 0");
    let mut events = engine.subscribe_filtered(filter);
    let mut ticker = tokio::time::interval(interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let sweep = engine.sweep_expired_rounds().await;
                let appeals = engine.process_appeals().await;
                if sweep.error_count() > 0 {
                    warn!(errors = sweep.error_count(), "Sweep finished with errors");
                }
                info!(
                    completed = sweep.completed,
                    adjudicated = sweep.adjudicated,
                    appeals_resolved = appeals.resolved,
                    "Watch tick"
                );
            }
            received = events.recv() => match received {
                Ok(event) => println!(
                    "{}",
                    serde_json::to_string(&event).context("Failed to serialize event")?
                ),
                Err(RecvError::Lagged(missed)) => warn!(missed, "Event watcher lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut shutdown => {
                info!("Interrupted, stopping watch");
                break;
            }
        }
    }
    Ok(())
}

fn build_engine(args: &Args, judges: JudgeConfig) -> Result<DebateEngine> {
    let config = EngineConfig::load_layered(args.config.as_deref())
        .context("Failed to load engine config")?;
    let panel = match &args.panel {
        Some(path) => load_panel(path)?,
        None => default_panel(),
    };
    let store = StateStore::open(args.state_path.clone())
        .with_context(|| format!("Failed to open state at {}", args.state_path.display()))?
        .shared();
    let adjudicator = HttpAdjudicator::new(judges).context("Failed to build judge client")?;

    // Appeal requests come from the platform, not from this binary, so
    // the quota is never consulted here.
    Ok(DebateEngine::new(
        store,
        Arc::new(adjudicator),
        panel,
        Arc::new(SystemClock),
        config,
        Arc::new(UnlimitedQuota),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let judges = JudgeConfig::default();
    info!(
        url = %judges.url,
        model = %judges.model,
        prompt_version = debate_judges::PROMPT_VERSION,
        state = %args.state_path.display(),
        "Debate scheduler starting"
    );

    if let Command::CheckJudges = args.command {
        let ok = check_endpoint(&judges.url).await;
        print_json(&serde_json::json!({ "url": judges.url, "reachable": ok }))?;
        if !ok {
            anyhow::bail!("judge endpoint {} is unreachable", judges.url);
        }
        return Ok(());
    }

    let engine = build_engine(&args, judges)?;

    match &args.command {
        Command::Sweep => {
            let summary = engine.sweep_expired_rounds().await;
            if summary.error_count() > 0 {
                warn!(errors = summary.error_count(), "Sweep finished with errors");
            }
            print_json(&summary)?;
        }
        Command::Drain => print_json(&engine.drain_pending_verdicts().await)?,
        Command::ProcessAppeals => print_json(&engine.process_appeals().await)?,
        Command::Retrigger { debate_id } => {
            let outcome = engine
                .retrigger_appeal(&DebateId::from(debate_id.as_str()))
                .await
                .with_context(|| format!("Failed to retrigger appeal of {}", debate_id))?;
            print_json(&outcome)?;
        }
        Command::DenyAppeal { debate_id, reason } => {
            let state = engine
                .deny_appeal(&DebateId::from(debate_id.as_str()), reason)
                .with_context(|| format!("Failed to deny appeal of {}", debate_id))?;
            print_json(&state)?;
        }
        Command::State { debate_id } => {
            let state = engine
                .get_debate_state(&DebateId::from(debate_id.as_str()))
                .with_context(|| format!("Failed to read debate {}", debate_id))?;
            print_json(&state)?;
        }
        Command::Verdicts { debate_id } => {
            let sheet = engine
                .verdicts(&DebateId::from(debate_id.as_str()))
                .with_context(|| format!("Failed to read verdicts of {}", debate_id))?;
            print_json(&sheet)?;
        }
        Command::Events {
            minutes,
            debate,
            stats,
        } => {
            let end = Utc::now();
            let start = end - chrono::Duration::minutes(*minutes);
            let history = engine.history();
            let filter = event_filter(debate.as_deref());
            if *stats {
                let stats = history
                    .get_stats(start, end, &filter)
                    .context("Failed to read event history")?;
                print_json(&stats)?;
            } else {
                let events = history
                    .get_matching(start, end, &filter)
                    .context("Failed to read event history")?;
                print_json(&events)?;
            }
        }
        Command::Watch {
            interval_secs,
            debate,
            notifications,
        } => {
            let mut filter = event_filter(debate.as_deref());
            if *notifications {
                filter = filter.notifications();
            }
            watch(&engine, Duration::from_secs(*interval_secs), filter).await?;
        }
        Command::PruneEvents { days } => {
            let cutoff = Utc::now() - chrono::Duration::days(*days);
            let pruned = engine
                .history()
                .prune_before(cutoff)
                .context("Failed to prune events")?;
            print_json(&serde_json::json!({ "pruned": pruned }))?;
        }
        Command::CheckJudges => {}
    }

    Ok(())
}
