use crate::corridor::stations::ROUTE_LENGTH_KM;
use crate::error::BrokerError;
use crate::global_variables::{
    AMQP_URL, DECISIONS_CSV, POSITIONS_CSV, QUEUE_CORRIDOR_DECISIONS, QUEUE_CORRIDOR_STATE,
    TIME_DISTANCE_PNG,
};
use crate::shared_data::{current_timestamp, DecisionRecord, StateSnapshot};
use amiquip::{Connection, ConsumerMessage, ConsumerOptions, QueueDeclareOptions};
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::{stdin, stdout, Write};
use std::path::Path;

/// One train's position at one published instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub timestamp: u64,
    pub simulation_seconds: u64,
    pub train_id: String,
    pub name: String,
    pub position_km: f64,
    pub speed_kmh: f64,
    pub status: String,
}

/// Appends a record to a CSV file, writing the header on first use.
fn log_to_csv<T: Serialize>(filename: &str, record: &T) -> Result<(), Box<dyn Error>> {
    let file_exists = Path::new(filename).exists();
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(filename)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    wtr.serialize(record)?;
    wtr.flush()?;
    Ok(())
}

pub fn flatten_snapshot(snapshot: &StateSnapshot, timestamp: u64) -> Vec<PositionRecord> {
    snapshot
        .trains
        .iter()
        .map(|t| PositionRecord {
            timestamp,
            simulation_seconds: snapshot.simulation_seconds,
            train_id: t.id.to_string(),
            name: t.name.clone(),
            position_km: t.position_km,
            speed_kmh: t.speed_kmh,
            status: t.status.to_string(),
        })
        .collect()
}

/// Groups position rows into one `(simulated minutes, km)` series per train.
pub fn group_series(records: &[PositionRecord]) -> BTreeMap<String, Vec<(f64, f64)>> {
    let mut series: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();
    for record in records {
        series
            .entry(record.name.clone())
            .or_default()
            .push((record.simulation_seconds as f64 / 60.0, record.position_km));
    }
    for points in series.values_mut() {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        points.dedup_by(|a, b| a.0 == b.0);
    }
    series
}

fn consume_queue<F>(queue_name: &str, mut handle: F) -> Result<(), BrokerError>
where
    F: FnMut(&str),
{
    let mut connection = Connection::insecure_open(AMQP_URL)?;
    let channel = connection.open_channel(None)?;
    let queue = channel.queue_declare(queue_name, QueueDeclareOptions::default())?;
    let consumer = queue.consume(ConsumerOptions::default())?;
    log::info!("Listening on '{}'...", queue_name);
    for message in consumer.receiver() {
        match message {
            ConsumerMessage::Delivery(delivery) => {
                if let Ok(json_str) = std::str::from_utf8(&delivery.body) {
                    handle(json_str);
                }
                consumer.ack(delivery)?;
            }
            other => {
                log::warn!("Consumer on '{}' ended: {:?}", queue_name, other);
                break;
            }
        }
    }
    connection.close()?;
    Ok(())
}

/// Logs every published snapshot to the positions CSV.
pub async fn listen_state() -> Result<(), BrokerError> {
    tokio::task::spawn_blocking(|| {
        consume_queue(QUEUE_CORRIDOR_STATE, |json_str| {
            match serde_json::from_str::<StateSnapshot>(json_str) {
                Ok(snapshot) => {
                    for record in flatten_snapshot(&snapshot, current_timestamp()) {
                        if let Err(e) = log_to_csv(POSITIONS_CSV, &record) {
                            log::error!("Error logging train position: {}", e);
                        }
                    }
                }
                Err(e) => log::warn!("Dropping malformed snapshot: {}", e),
            }
        })
    })
    .await?
}

/// Logs every published decision to the decisions CSV.
pub async fn listen_decisions() -> Result<(), BrokerError> {
    tokio::task::spawn_blocking(|| {
        consume_queue(QUEUE_CORRIDOR_DECISIONS, |json_str| {
            let record = serde_json::from_str::<DecisionRecord>(json_str).unwrap_or(
                DecisionRecord {
                    timestamp: current_timestamp(),
                    simulation_seconds: 0,
                    text: json_str.to_string(),
                },
            );
            if let Err(e) = log_to_csv(DECISIONS_CSV, &record) {
                log::error!("Error logging decision: {}", e);
            }
        })
    })
    .await?
}

pub fn load_positions(filename: &str) -> Result<Vec<PositionRecord>, Box<dyn Error>> {
    let mut rdr = csv::Reader::from_reader(File::open(filename)?);
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        records.push(result?);
    }
    Ok(records)
}

/// Draws a time-distance (string-line) diagram, one line per train.
pub fn render_time_distance(
    records: &[PositionRecord],
    output: &str,
    route_length_km: f64,
) -> Result<(), Box<dyn Error>> {
    let series = group_series(records);
    let max_minutes = series
        .values()
        .flat_map(|points| points.iter().map(|p| p.0))
        .fold(1.0, f64::max);

    let backend = BitMapBackend::new(output, (1024, 640));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Corridor Time-Distance Diagram", ("sans-serif", 20))
        .margin(30)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..max_minutes, 0.0..route_length_km)?;

    chart
        .configure_mesh()
        .x_desc("Simulated minutes")
        .y_desc("Position (km)")
        .draw()?;

    for (idx, (name, points)) in series.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        chart
            .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?
            .label(name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    println!("Time-distance diagram saved to {}", output);
    Ok(())
}

pub fn show_decision_history() -> Result<(), Box<dyn Error>> {
    let mut rdr = csv::Reader::from_reader(File::open(DECISIONS_CSV)?);
    println!("Decision History:");
    for result in rdr.deserialize() {
        let record: DecisionRecord = result?;
        println!("[{}s] {}", record.simulation_seconds, record.text);
    }
    Ok(())
}

fn count_csv_records(filename: &str) -> Result<usize, Box<dyn Error>> {
    let mut rdr = csv::Reader::from_reader(File::open(filename)?);
    Ok(rdr.records().count())
}

pub fn generate_report() -> Result<(), Box<dyn Error>> {
    let positions = load_positions(POSITIONS_CSV)?;
    let trains = group_series(&positions).len();
    let arrived = positions
        .iter()
        .filter(|r| r.status == "ARRIVED")
        .map(|r| r.train_id.as_str())
        .collect::<std::collections::BTreeSet<_>>()
        .len();
    let decisions = count_csv_records(DECISIONS_CSV).unwrap_or(0);
    println!("Report Summary:");
    println!("Position samples: {}", positions.len());
    println!("Trains observed: {}", trains);
    println!("Trains arrived: {}", arrived);
    println!("Decisions logged: {}", decisions);
    Ok(())
}

fn read_choice() -> Option<u32> {
    print!("Enter your choice: ");
    stdout().flush().ok();
    let mut input = String::new();
    match stdin().read_line(&mut input) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(input.trim().parse::<u32>().unwrap_or(0)),
    }
}

/// Admin menu over the CSV logs.
pub async fn run_cli() {
    loop {
        println!("\nCorridor Monitor Admin CLI");
        println!("1. Display Decision History");
        println!("2. Generate Report");
        println!("3. Render Time-Distance Diagram");
        println!("4. Exit");
        let Some(choice) = read_choice() else {
            break;
        };
        match choice {
            1 => {
                if let Err(e) = show_decision_history() {
                    eprintln!("Error displaying decision history: {}", e);
                }
            }
            2 => {
                if let Err(e) = generate_report() {
                    eprintln!("Error generating report: {}", e);
                }
            }
            3 => {
                let rendered = load_positions(POSITIONS_CSV).and_then(|records| {
                    render_time_distance(&records, TIME_DISTANCE_PNG, ROUTE_LENGTH_KM)
                });
                if let Err(e) = rendered {
                    eprintln!("Error rendering diagram: {}", e);
                }
            }
            4 => {
                println!("Exiting CLI.");
                break;
            }
            _ => println!("Invalid choice. Try again."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corridor::Corridor;
    use crate::trains::Train;

    fn record(name: &str, seconds: u64, km: f64) -> PositionRecord {
        PositionRecord {
            timestamp: 0,
            simulation_seconds: seconds,
            train_id: name.to_string(),
            name: name.to_string(),
            position_km: km,
            speed_kmh: 60.0,
            status: "ON_SCHEDULE".to_string(),
        }
    }

    #[test]
    fn test_flatten_snapshot_rows() {
        let corridor = Corridor::mumbai_pune();
        let snapshot = StateSnapshot {
            simulation_time: "00:02:00".to_string(),
            simulation_seconds: 120,
            trains: vec![
                Train::new("A".into(), "Alpha", "express", 5, 100.0)
                    .at_position(12.3456)
                    .view(&corridor),
                Train::new("B".into(), "Bravo", "freight", 1, 60.0).view(&corridor),
            ],
        };

        let rows = flatten_snapshot(&snapshot, 1_700_000_000);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].train_id, "A");
        assert_eq!(rows[0].position_km, 12.35);
        assert_eq!(rows[0].simulation_seconds, 120);
        assert_eq!(rows[1].status, "ON_SCHEDULE");
    }

    #[test]
    fn test_group_series_sorts_and_dedups() {
        let rows = vec![
            record("Alpha", 120, 4.0),
            record("Bravo", 60, 1.0),
            record("Alpha", 60, 2.0),
            record("Alpha", 60, 2.0),
        ];
        let series = group_series(&rows);
        assert_eq!(series.len(), 2);
        assert_eq!(series["Alpha"], vec![(1.0, 2.0), (2.0, 4.0)]);
        assert_eq!(series["Bravo"], vec![(1.0, 1.0)]);
    }

    #[test]
    fn test_csv_log_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "rail_corridor_positions_{}.csv",
            std::process::id()
        ));
        let filename = path.to_string_lossy().to_string();
        std::fs::remove_file(&path).ok();

        log_to_csv(&filename, &record("Alpha", 60, 1.5)).unwrap();
        log_to_csv(&filename, &record("Alpha", 120, 3.0)).unwrap();
        let loaded = load_positions(&filename).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].position_km, 3.0);
    }
}
