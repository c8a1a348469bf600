use crate::shared_data::{format_clock, Decision, Order, ScheduleEntry};
use crate::simulation_engine::schedule::InMemorySchedule;
use crate::simulation_engine::Engine;
use crate::trains::TrainId;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands:
  state                                   print the corridor snapshot
  plans                                   list plans awaiting a decision
  accept <id> | reject <id>               decide a pending plan
  delay <id> <seconds>                    take a train out of service
  history [newest]                        print the decision log
  explain <id>                            why is this train held?
  add <id> <name> <class> <priority> <speed> <departure>
  remove <id>                             edit the schedule feed
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    State,
    Plans,
    Decide(TrainId, Decision),
    Delay(TrainId, Duration),
    History(Order),
    Explain(TrainId),
    Add(ScheduleEntry),
    Remove(TrainId),
    Help,
    Quit,
}

fn arg<'a>(parts: &[&'a str], idx: usize, what: &str) -> Result<&'a str, String> {
    parts
        .get(idx)
        .copied()
        .ok_or_else(|| format!("missing {}", what))
}

fn number<T: std::str::FromStr>(parts: &[&str], idx: usize, what: &str) -> Result<T, String> {
    let raw = arg(parts, idx, what)?;
    raw.parse()
        .map_err(|_| format!("{} must be a number, got '{}'", what, raw))
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(&verb) = parts.first() else {
        return Ok(Command::Help);
    };
    let id = |idx| arg(&parts, idx, "train id").map(TrainId::from);

    match verb.to_lowercase().as_str() {
        "state" => Ok(Command::State),
        "plans" => Ok(Command::Plans),
        "accept" => Ok(Command::Decide(id(1)?, Decision::Accept)),
        "reject" => Ok(Command::Decide(id(1)?, Decision::Reject)),
        "delay" => {
            let seconds: u64 = number(&parts, 2, "seconds")?;
            Ok(Command::Delay(id(1)?, Duration::from_secs(seconds)))
        }
        "history" => match parts.get(1) {
            Some(&"newest") => Ok(Command::History(Order::NewestFirst)),
            Some(other) => Err(format!("unknown history order '{}'", other)),
            None => Ok(Command::History(Order::OldestFirst)),
        },
        "explain" => Ok(Command::Explain(id(1)?)),
        "add" => Ok(Command::Add(ScheduleEntry {
            id: id(1)?,
            name: arg(&parts, 2, "name")?.replace('_', " "),
            class: arg(&parts, 3, "class")?.to_string(),
            priority: number(&parts, 4, "priority")?,
            speed_kmh: number(&parts, 5, "speed")?,
            departure_time_seconds: number(&parts, 6, "departure")?,
        })),
        "remove" => Ok(Command::Remove(id(1)?)),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command '{}'", other)),
    }
}

/// Runs one command and returns what to print.
pub async fn execute(
    engine: &Engine,
    schedule: Option<&InMemorySchedule>,
    command: Command,
) -> String {
    match command {
        Command::State => serde_json::to_string_pretty(&engine.snapshot())
            .unwrap_or_else(|e| format!("could not render state: {}", e)),
        Command::Plans => {
            let plans = engine.pending_plans();
            if plans.is_empty() {
                return "No plans awaiting a decision.".to_string();
            }
            plans
                .iter()
                .map(|p| p.describe())
                .collect::<Vec<_>>()
                .join("\n")
        }
        Command::Decide(id, decision) => match engine.decide(&id, decision) {
            Ok(plan) => format!("{:?}: {}", decision, plan.describe()),
            Err(e) => format!("Error: {}", e),
        },
        Command::Delay(id, duration) => match engine.inject_delay(&id, duration) {
            Ok(_) => format!("{} delayed for {}s", id, duration.as_secs()),
            Err(e) => format!("Error: {}", e),
        },
        Command::History(order) => {
            let history = engine.decision_history(order);
            if history.is_empty() {
                return "Decision log is empty.".to_string();
            }
            history
                .iter()
                .map(|r| format!("[{}] {}", format_clock(r.simulation_seconds), r.text))
                .collect::<Vec<_>>()
                .join("\n")
        }
        Command::Explain(id) => match engine.explain(&id).await {
            Ok(text) => text,
            Err(e) => format!("Error: {}", e),
        },
        Command::Add(entry) => match schedule {
            Some(schedule) => {
                let id = entry.id.clone();
                schedule.upsert(entry);
                format!("Scheduled {}", id)
            }
            None => "Schedule is read from a file; edit the file instead.".to_string(),
        },
        Command::Remove(id) => match schedule {
            Some(schedule) if schedule.remove(&id) => format!("Removed {} from the schedule", id),
            Some(_) => format!("Error: {} is not in the schedule", id),
            None => "Schedule is read from a file; edit the file instead.".to_string(),
        },
        Command::Help => HELP.to_string(),
        Command::Quit => "Bye.".to_string(),
    }
}

/// Reads commands from stdin until `quit` or end of input.
pub async fn run_console(engine: Engine, schedule: Option<InMemorySchedule>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("Console input failed: {}", e);
                break;
            }
        };
        match parse_command(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => println!("{}", execute(&engine, schedule.as_ref(), command).await),
            Err(e) => println!("Error: {} (type 'help')", e),
        }
    }
}
