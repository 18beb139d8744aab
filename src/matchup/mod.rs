pub mod aggregate;
pub mod batch_process;
pub mod engine;
pub mod export;
pub mod table;

pub use aggregate::{SensorAggregation, WindowAggregator, WindowColumns, nan_mean_filter};
pub use batch_process::{BatchProcessor, RunSummary, SensorSummary};
pub use engine::{
    MatchupEngine, MatchupSettings, PixelMatch, Raster, SensorMatch, SensorStatus, load_from_disk,
};
pub use export::write_raster_csv;
pub use table::MatchedTable;
