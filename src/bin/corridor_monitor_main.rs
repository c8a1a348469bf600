use rail_corridor::monitoring::corridor_monitor::{listen_decisions, listen_state, run_cli};

#[tokio::main]
async fn main() {
    env_logger::init();

    // Spawn listeners for both RabbitMQ queues concurrently.
    tokio::spawn(async {
        if let Err(e) = listen_state().await {
            log::error!("Error in corridor state listener: {}", e);
        }
    });
    tokio::spawn(async {
        if let Err(e) = listen_decisions().await {
            log::error!("Error in decisions listener: {}", e);
        }
    });

    run_cli().await;
    // The blocking consumers never return on their own.
    std::process::exit(0);
}
