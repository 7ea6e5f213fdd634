//! Application state shared by all CLI handlers.

use std::path::PathBuf;

use recallbench_infra::config::{load_config, resolve_data_dir};
use recallbench_infra::dataset::JsonDatasetStore;
use recallbench_types::config::AppConfig;

pub struct AppState {
    pub config: AppConfig,
    pub store: JsonDatasetStore,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Resolve the data directory and load configuration.
    ///
    /// Infallible: a missing or broken config falls back to defaults with a
    /// warning, and dataset files are only touched by the commands that need
    /// them.
    pub async fn init() -> Self {
        let data_dir = resolve_data_dir();
        let config = load_config(&data_dir).await;
        let store = JsonDatasetStore::new(&data_dir);

        Self {
            config,
            store,
            data_dir,
        }
    }
}
