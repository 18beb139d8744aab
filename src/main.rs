use env_logger::Env;
use log::info;

use chlmatch::config::{Config, DEFAULT_CONFIG_PATH};
use chlmatch::matchup::BatchProcessor;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger_env = Env::new().filter_or("CHLMATCH_LOG_LEVEL", "info");
    env_logger::Builder::from_env(logger_env)
        .format_timestamp_millis()
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    info!("Starting satellite/in-situ chlorophyll matchup with {}", config_path);

    let config = Config::from_file(&config_path)?;
    let processor = BatchProcessor::new(config);
    let summary = processor.process()?;

    info!("{}", summary);
    for output in &summary.outputs {
        info!("Wrote {}", output.display());
    }

    Ok(())
}
