//! Command-line front end for expanding recurring calendar events.

use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use recurrence_engine::{
    expand_with_options, list_events, request_occurrence_deletion, to_ical, upcoming,
    validate_event, DateWindow, DstPolicy, EventRecord, ExpandOptions, ListQuery, QueryConfig,
};

/// Expand recurring calendar events into concrete occurrences.
#[derive(Parser, Debug)]
#[command(name = "recur")]
#[command(version, about, long_about = None)]
struct Cli {
    /// IANA time zone for calendar arithmetic and date windows
    #[arg(long, global = true, default_value = "UTC", value_parser = parse_tz)]
    tz: Tz,

    /// Reference "now" (RFC 3339); defaults to the system clock
    #[arg(long, global = true, value_parser = parse_instant)]
    now: Option<DateTime<Utc>>,

    /// Days of synthetic horizon for rules with no count, until or window end
    #[arg(long, global = true, default_value_t = 730)]
    horizon_days: i64,

    /// What to do with occurrences that fall in a DST gap
    #[arg(long, global = true, value_enum, default_value_t = DstArg::WallClock)]
    dst_policy: DstArg,

    /// Log expansion details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Expand one event record into its occurrences
    Expand {
        /// JSON event record file, or "-" for stdin
        input: String,
        /// First day of the window (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,
        /// Last day of the window (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<String>,
        /// Occurrence start to leave out (RFC 3339); repeatable
        #[arg(long, value_parser = parse_instant)]
        exclude: Vec<DateTime<Utc>>,
    },
    /// List a user's events from an array of event records
    List {
        /// JSON array of event records, or "-" for stdin
        input: String,
        #[arg(long)]
        user: u64,
        #[arg(long)]
        start_date: Option<String>,
        #[arg(long)]
        end_date: Option<String>,
        /// Attach expanded occurrences to each event
        #[arg(long)]
        show_occurrences: bool,
    },
    /// A user's events over the next N days, with occurrences
    Upcoming {
        /// JSON array of event records, or "-" for stdin
        input: String,
        #[arg(long)]
        user: u64,
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
    /// Print an event record's rule as iCalendar text
    Ical {
        /// JSON event record file, or "-" for stdin
        input: String,
    },
    /// Check an event record against the write-time invariants
    Validate {
        /// JSON event record file, or "-" for stdin
        input: String,
    },
    /// Validate a request to delete one occurrence of a recurring event
    DeleteOccurrence {
        /// JSON event record file, or "-" for stdin
        input: String,
        /// Local occurrence time (YYYY-MM-DDTHH:MM:SS)
        #[arg(long)]
        at: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DstArg {
    Skip,
    ShiftForward,
    WallClock,
}

impl From<DstArg> for DstPolicy {
    fn from(arg: DstArg) -> Self {
        match arg {
            DstArg::Skip => DstPolicy::Skip,
            DstArg::ShiftForward => DstPolicy::ShiftForward,
            DstArg::WallClock => DstPolicy::WallClock,
        }
    }
}

fn parse_tz(s: &str) -> Result<Tz, String> {
    s.parse::<Tz>().map_err(|_| format!("unknown time zone '{s}'"))
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("'{s}': {e}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let anchor = cli.now.unwrap_or_else(Utc::now);
    tracing::debug!(tz = %cli.tz, %anchor, "resolved clock settings");
    let config = QueryConfig {
        timezone: cli.tz,
        horizon: Duration::try_days(cli.horizon_days)
            .with_context(|| format!("--horizon-days {} is out of range", cli.horizon_days))?,
        dst_policy: cli.dst_policy.into(),
        ..QueryConfig::default()
    };
    let options = ExpandOptions::default()
        .with_anchor(anchor)
        .with_timezone(cli.tz)
        .with_horizon(config.horizon)
        .with_dst_policy(config.dst_policy);

    match cli.command {
        Command::Expand {
            input,
            start_date,
            end_date,
            exclude,
        } => {
            let record: EventRecord = read_json(&input)?;
            let window =
                DateWindow::from_dates(start_date.as_deref(), end_date.as_deref(), &cli.tz)?;
            let options = exclude
                .into_iter()
                .fold(options, |opts, at| opts.with_exclusion(at));
            let occurrences = expand_with_options(
                &record.event,
                record.rule(),
                window.start,
                window.end,
                &options,
            )?;
            print_json(&occurrences)
        }
        Command::List {
            input,
            user,
            start_date,
            end_date,
            show_occurrences,
        } => {
            let records: Vec<EventRecord> = read_json(&input)?;
            let query = ListQuery {
                start_date,
                end_date,
                show_occurrences,
            };
            print_json(&list_events(&records, user, &query, &config, anchor)?)
        }
        Command::Upcoming { input, user, days } => {
            let records: Vec<EventRecord> = read_json(&input)?;
            let config = QueryConfig {
                upcoming_days: days,
                ..config
            };
            print_json(&upcoming(&records, user, &config, anchor)?)
        }
        Command::Ical { input } => {
            let record: EventRecord = read_json(&input)?;
            let rule = record
                .rule()
                .with_context(|| format!("event {} has no recurrence rule", record.event.id))?;
            println!("{}", to_ical(&record.event, rule, &options)?);
            Ok(())
        }
        Command::Validate { input } => {
            let record: EventRecord = read_json(&input)?;
            validate_event(&record.event, record.rule())?;
            print_json(&json!({ "valid": true, "event_id": record.event.id }))
        }
        Command::DeleteOccurrence { input, at } => {
            let record: EventRecord = read_json(&input)?;
            print_json(&request_occurrence_deletion(&record.event, &at, &cli.tz)?)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn read_json<T: serde::de::DeserializeOwned>(input: &str) -> Result<T> {
    let text = if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        fs::read_to_string(input).with_context(|| format!("failed to read {input}"))?
    };
    serde_json::from_str(&text).with_context(|| format!("invalid event JSON in {input}"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
