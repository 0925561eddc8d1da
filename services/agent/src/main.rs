use anyhow::{Context, Result};
use perimeter_agent::config::{AgentConfig, AgentMode, LoggingConfig};
use perimeter_agent::{
    DetectionLines, FaceReporter, SensorPoller, SimulatedSensor, TelemetryClient, Throttle,
};
use tokio::io::BufReader;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AgentConfig::load().context("Failed to load configuration")?;

    init_logging(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?config.mode,
        server = %config.server.base_url,
        "Starting Perimeter agent"
    );

    config.validate().context("Invalid configuration")?;

    let client = TelemetryClient::new(&config.server).context("Failed to create HTTP client")?;

    match config.mode {
        AgentMode::Sensors => {
            SensorPoller::new(SimulatedSensor::new(), client, config.sensor.poll_interval())
                .run(shutdown_signal())
                .await;
        }
        AgentMode::Faces => {
            let feed = DetectionLines::new(BufReader::new(tokio::io::stdin()));
            let throttle = Throttle::new(config.face.throttle_interval());

            FaceReporter::new(client, throttle, config.face.min_confidence)
                .run(feed, shutdown_signal())
                .await;
        }
    }

    info!("Agent stopped");

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);

    match config.format.as_str() {
        "json" => registry.with(fmt::layer().json()).init(),
        _ => registry.with(fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}
