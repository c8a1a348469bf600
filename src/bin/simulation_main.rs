// simulation_main.rs
use clap::Parser;
use rail_corridor::control_system::advisor::PriorityAdvisor;
use rail_corridor::corridor::Corridor;
use rail_corridor::global_variables::{
    DEFAULT_ADVISOR_TIMEOUT_SECS, DEFAULT_TICK_INTERVAL_MS, DEFAULT_TIME_SCALE,
};
use rail_corridor::monitoring::state_publisher::publish_state;
use rail_corridor::operator_console::run_console;
use rail_corridor::shared_data::ScheduleEntry;
use rail_corridor::simulation_engine::schedule::{CsvSchedule, InMemorySchedule, ScheduleSource};
use rail_corridor::simulation_engine::{Engine, EngineConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "simulation_main", about = "Mumbai-Pune corridor simulation and control")]
struct Cli {
    /// Departure schedule CSV; re-read every tick. Without it a demo schedule is used.
    #[arg(long)]
    schedule: Option<PathBuf>,
    /// Wall-clock milliseconds between ticks
    #[arg(long, default_value_t = DEFAULT_TICK_INTERVAL_MS, value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,
    /// Simulated seconds per wall-clock second
    #[arg(long, default_value_t = DEFAULT_TIME_SCALE)]
    time_scale: u32,
    /// Upper bound on one advisor call, in seconds
    #[arg(long, default_value_t = DEFAULT_ADVISOR_TIMEOUT_SECS)]
    advisor_timeout: u64,
    /// Execute proposed plans without waiting for the operator
    #[arg(long)]
    auto_accept: bool,
    /// Publish state and decisions to RabbitMQ
    #[arg(long)]
    publish: bool,
}

fn demo_schedule() -> Vec<ScheduleEntry> {
    let entry = |id: &str, name: &str, class: &str, priority, speed_kmh, departure| {
        ScheduleEntry {
            id: id.into(),
            name: name.to_string(),
            class: class.to_string(),
            priority,
            speed_kmh,
            departure_time_seconds: departure,
        }
    };
    vec![
        entry("GDS01", "Container Goods", "freight", 1, 60.0, 0),
        entry("LOC07", "Karjat Local", "suburban", 3, 80.0, 600),
        entry("11007", "Deccan Express", "express", 8, 110.0, 1200),
        entry("12127", "Intercity Express", "express", 9, 120.0, 2400),
    ]
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = EngineConfig {
        tick_interval: Duration::from_millis(cli.tick_ms),
        time_scale: cli.time_scale,
        advisor_timeout: Duration::from_secs(cli.advisor_timeout),
        auto_accept: cli.auto_accept,
    };

    let (schedule, editable): (Arc<dyn ScheduleSource>, Option<InMemorySchedule>) =
        match cli.schedule {
            Some(path) => {
                log::info!("Reading schedule from {}", path.display());
                (Arc::new(CsvSchedule::new(path)), None)
            }
            None => {
                let schedule = InMemorySchedule::new(demo_schedule());
                (Arc::new(schedule.clone()), Some(schedule))
            }
        };

    let engine = Engine::new(
        Corridor::mumbai_pune(),
        schedule,
        Arc::new(PriorityAdvisor),
        config,
    );

    tokio::spawn(engine.clone().run());

    if cli.publish {
        let publisher = engine.clone();
        let period = publisher.config().tick_interval;
        tokio::spawn(async move {
            if let Err(e) = publish_state(publisher, period).await {
                log::error!("State publication stopped: {}", e);
            }
        });
    }

    run_console(engine, editable).await;
    // The publisher runs on a blocking thread that never returns.
    std::process::exit(0);
}
