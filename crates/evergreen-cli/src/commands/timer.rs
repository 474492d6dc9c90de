use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use evergreen_core::error::Result;
use evergreen_core::{
    Cadence, Clock, Config, CoreError, Event, LapBudget, LedgerStore, MemoryStore, PomodoroPlan,
    PomodoroState, Priority, StudySession,
};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Interval;

use crate::clock::{ticker, TokioClock};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print the Pomodoro plan for a study budget as JSON
    Plan {
        /// Study hours to fit laps into
        #[arg(long)]
        hours: f64,
        /// Explicit lap count (overrides hours)
        #[arg(long)]
        laps: Option<u32>,
    },
    /// Record today's hours and run a live session
    Run {
        /// Study hours for today
        #[arg(long)]
        hours: f64,
        /// Explicit lap count (overrides hours)
        #[arg(long)]
        laps: Option<u32>,
        /// Simulated seconds per real second
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
        /// Task to add before starting (repeatable)
        #[arg(long = "task")]
        tasks: Vec<String>,
        /// Date to record hours under (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Keep the ledger in memory only
        #[arg(long)]
        ephemeral: bool,
        /// How long to keep running after the last lap, in milliseconds
        #[arg(long, default_value_t = 3000)]
        linger_ms: u64,
    },
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Plan { hours, laps } => {
            let config = Config::load()?;
            let budget = laps.map_or(LapBudget::Hours(hours), LapBudget::Laps);
            let plan = PomodoroPlan::build(
                budget,
                config.pomodoro.work_duration_secs,
                config.pomodoro.break_duration_secs,
            )?;
            super::print_json(&json!({
                "total_laps": plan.total_laps,
                "work_duration_secs": plan.work_duration_secs,
                "break_duration_secs": plan.break_duration_secs,
                "total_duration_secs": plan.total_duration_secs(),
                "blocks": plan.blocks,
            }))?;
        }
        TimerAction::Run {
            hours,
            laps,
            speed,
            tasks,
            date,
            ephemeral,
            linger_ms,
        } => {
            let options = RunOptions {
                date: super::date_or_today(date),
                hours,
                laps,
                speed,
                tasks,
                linger: Duration::from_millis(linger_ms),
            };
            run_live(options, ephemeral)?;
        }
    }
    Ok(())
}

struct RunOptions {
    date: String,
    hours: f64,
    laps: Option<u32>,
    speed: f64,
    tasks: Vec<String>,
    linger: Duration,
}

fn run_live(options: RunOptions, ephemeral: bool) -> Result<()> {
    if !options.speed.is_finite() || options.speed <= 0.0 {
        return Err(CoreError::Custom(format!(
            "speed must be a positive number, got {}",
            options.speed
        )));
    }
    let config = Config::load()?;
    let store: Arc<dyn LedgerStore> = if ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        super::ledger_store(&config)?
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let result = runtime.block_on(run_session(&config, store, options));
    // The stdin reader may still be parked on a blocking read.
    runtime.shutdown_background();
    result
}

/// Outcome of one stdin command.
#[derive(Debug, PartialEq)]
enum Control {
    Continue,
    Quit,
}

async fn run_session(
    config: &Config,
    store: Arc<dyn LedgerStore>,
    options: RunOptions,
) -> Result<()> {
    let clock = Rc::new(TokioClock::new());
    let mut session = StudySession::new(config, store, clock.clone())?;

    let printer = Rc::new(|event: &Event| match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(error = %e, "failed to encode event"),
    });
    session.subscribe_all(&printer);

    // The plan write is superseded by the final flush.
    drop(session.plan(&options.date, options.hours, options.laps)?);
    for title in &options.tasks {
        session.add_task(title, Priority::default())?;
    }
    session.start();

    let mut seconds = ticker(Cadence::EverySecond, options.speed);
    let mut minutes = ticker(Cadence::EveryMinute, options.speed);
    let mut seconds_armed = true;
    let mut minutes_armed = true;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let linger = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(linger);
    let mut lingering = false;

    loop {
        rearm(&mut seconds, clock.is_armed(Cadence::EverySecond), &mut seconds_armed);
        rearm(&mut minutes, clock.is_armed(Cadence::EveryMinute), &mut minutes_armed);
        if !lingering && session.pomodoro().state() == PomodoroState::Done {
            linger
                .as_mut()
                .reset(tokio::time::Instant::now() + options.linger);
            lingering = true;
        }

        tokio::select! {
            _ = seconds.tick(), if clock.is_armed(Cadence::EverySecond) => {
                session.on_second();
            }
            _ = minutes.tick(), if clock.is_armed(Cadence::EveryMinute) => {
                session.on_minute();
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if handle_command(&mut session, &line) == Control::Quit {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin closed");
                    stdin_open = false;
                }
            },
            _ = &mut linger, if lingering => break,
            // Paused with no input left: nothing can wake the loop.
            else => break,
        }
    }

    session.stop();
    if let Err(e) = session.flush() {
        tracing::warn!(error = %e, "failed to save ledger on exit");
    }

    let growth = session.growth();
    println!(
        "{}",
        json!({
            "type": "summary",
            "laps_completed": session.pomodoro().laps_completed(),
            "total_laps": session.pomodoro().total_laps(),
            "stage": growth.current_stage(),
            "score": growth.score(),
            "total_hours": session.ledger().total_hours(),
            "elapsed_minutes": session.ledger().elapsed_minutes(),
            "achievements": session.achievements().unlocked(),
        })
    );
    Ok(())
}

/// Restart `ticker` a full period out when its cadence has just been
/// re-armed, so a resume never fires a missed deadline at once.
fn rearm(ticker: &mut Interval, armed: bool, was_armed: &mut bool) {
    if armed && !*was_armed {
        ticker.reset();
    }
    *was_armed = armed;
}

fn handle_command(session: &mut StudySession, line: &str) -> Control {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Control::Continue;
    };
    let args: Vec<&str> = words.collect();

    let result: Result<(), Box<dyn std::error::Error>> = match command {
        "add" => add_task(session, &args),
        "complete" => task_at(session, &args).and_then(|id| {
            session.complete_task(&id)?;
            Ok(())
        }),
        "delete" => task_at(session, &args).map(|id| {
            session.delete_task(&id);
        }),
        "reset" => {
            session.reset_tasks();
            Ok(())
        }
        "list" => print_line(&json!({ "type": "task_list", "tasks": session.tasks().list() })),
        "status" => print_line(&json!({ "type": "status", "pomodoro": session.pomodoro().snapshot() })),
        "pause" => {
            session.stop();
            Ok(())
        }
        "resume" => {
            session.start();
            Ok(())
        }
        "quit" | "exit" => return Control::Quit,
        other => Err(format!("unknown command: {other}").into()),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
    }
    Control::Continue
}

/// `add <title...> [low|medium|high]`
fn add_task(session: &mut StudySession, args: &[&str]) -> Result<(), Box<dyn std::error::Error>> {
    let (title_words, priority) = match args.split_last() {
        Some((last, rest)) if !rest.is_empty() => match last.parse::<Priority>() {
            Ok(priority) => (rest, priority),
            Err(_) => (args, Priority::default()),
        },
        _ => (args, Priority::default()),
    };
    session.add_task(&title_words.join(" "), priority)?;
    Ok(())
}

/// Resolve a 1-based position in the listed order to a task id.
fn task_at(session: &StudySession, args: &[&str]) -> Result<String, Box<dyn std::error::Error>> {
    let raw = args.first().ok_or("expected a task number")?;
    let n: usize = raw
        .parse()
        .map_err(|_| format!("not a task number: {raw}"))?;
    let tasks = session.tasks().list();
    n.checked_sub(1)
        .and_then(|i| tasks.get(i))
        .map(|t| t.id.clone())
        .ok_or_else(|| format!("no task #{n}").into())
}

fn print_line(value: &serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
