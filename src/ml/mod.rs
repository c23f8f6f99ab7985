pub mod features;
pub mod forest;
pub mod manual;
pub mod model;
pub mod ridge;

pub use features::{FeatureBuilder, FeatureRow, FeatureSchema, FeatureTable, MARKET_CORRELATION};
pub use forest::{ForestConfig, RandomForestRegressor};
pub use manual::{ManualGenerator, ManualParams};
pub use model::{
    Forecast, ForecastModel, ModelArtifact, ModelConfig, ModelKind, Regressor, TrainingReport, DEFAULT_WINDOW,
};
pub use ridge::RidgeRegressor;
