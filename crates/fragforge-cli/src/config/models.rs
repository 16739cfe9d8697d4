use fragforge::engine::config as core_config;
use std::path::PathBuf;

pub struct AppConfig {
    pub library_path: PathBuf,
    pub ring_closures_path: Option<PathBuf>,
    pub size_penalty: f64,
    pub core_config: core_config::GaConfig,
}
