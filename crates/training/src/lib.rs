//! Run configuration, optimizer selection, and result bookkeeping for
//! caption-conditioned patch classification runs.

pub mod logging;
pub mod optim;
pub mod prepare;
pub mod records;
pub mod run_config;

pub use logging::init_logging;
pub use optim::{OptimizerConfig, OptimizerKind, OptimizerSettings};
pub use prepare::{run_prepare, PrepareReport};
pub use records::{save_config_and_metric, save_info, EpochLog, PredictionPair};
pub use run_config::{process_run_config, run_stamp, skip_layers_tag, RunConfig};

/// Backend used for loader tensors.
pub type TrainBackend = burn_ndarray::NdArray<f32>;
