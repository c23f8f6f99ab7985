use std::sync::Arc;

use crate::config::Settings;
use crate::data::JsonBarStore;
use crate::engine::{ForecastApi, PredictionService};
use crate::ml::{ManualGenerator, ModelConfig};

/// Shared by every handler; nothing in it is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<ForecastApi<JsonBarStore>>,
    /// Model settings applied to fields a request leaves out.
    pub model_defaults: ModelConfig,
}

impl AppState {
    pub fn new(api: ForecastApi<JsonBarStore>, model_defaults: ModelConfig) -> Self {
        Self {
            api: Arc::new(api),
            model_defaults,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let store = JsonBarStore::new(&settings.data.dir);
        let service = PredictionService::new(ManualGenerator::new(settings.manual.default_seed));
        Self::new(ForecastApi::new(store, service), settings.model.clone())
    }
}
