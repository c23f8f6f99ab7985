use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use super::features::{FeatureBuilder, FeatureRow, FeatureTable};
use super::forest::{ForestConfig, RandomForestRegressor};
use super::ridge::RidgeRegressor;
use crate::error::{ForecastError, Result};
use crate::types::{BarSeries, PredictionPoint};

/// Fewest complete, targeted rows a model will train on.
pub const MIN_TRAINING_ROWS: usize = 10;
pub const DEFAULT_WINDOW: usize = 60;
pub const DEFAULT_ALPHA: f64 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    Ridge,
    RandomForest,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Ridge => "ridge",
            ModelKind::RandomForest => "random_forest",
        }
    }
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ridge" => Ok(ModelKind::Ridge),
            "rf" | "random_forest" | "forest" => Ok(ModelKind::RandomForest),
            other => Err(ForecastError::InvalidModelConfig(format!("unknown model '{}'", other))),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    /// Trailing feature rows considered for training.
    pub window: usize,
    /// Ridge penalty; ignored by the forest.
    pub alpha: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::Ridge,
            window: DEFAULT_WINDOW,
            alpha: DEFAULT_ALPHA,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(ForecastError::InvalidModelConfig("window must be at least 1".to_string()));
        }
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(ForecastError::InvalidModelConfig(format!(
                "alpha must be a positive number, got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// Fitted regressor behind a single predict capability.
#[derive(Debug, Clone)]
pub enum Regressor {
    Ridge(RidgeRegressor),
    RandomForest(RandomForestRegressor),
}

impl Regressor {
    pub fn fit(config: &ModelConfig, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        match config.kind {
            ModelKind::Ridge => Ok(Regressor::Ridge(RidgeRegressor::fit(x, y, config.alpha)?)),
            ModelKind::RandomForest => Ok(Regressor::RandomForest(RandomForestRegressor::fit(
                x,
                y,
                ForestConfig::default(),
            )?)),
        }
    }

    pub fn predict_row(&self, row: &Array1<f64>) -> f64 {
        match self {
            Regressor::Ridge(m) => m.predict_row(row),
            Regressor::RandomForest(m) => m.predict_row(row.view()),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Regressor::Ridge(_) => ModelKind::Ridge,
            Regressor::RandomForest(_) => ModelKind::RandomForest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub kind: ModelKind,
    pub rows_used: usize,
    pub rows_dropped: usize,
    pub rmse: f64,
}

/// A fitted regressor plus the column order and z-score statistics it was trained with.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    regressor: Regressor,
    feature_names: Vec<&'static str>,
    means: Vec<f64>,
    stds: Vec<f64>,
    training_rows: usize,
}

impl ModelArtifact {
    /// Trains on the trailing `config.window` rows. The target of row `t` is the
    /// close of row `t + 1`, so the final row never trains.
    pub fn train(table: &FeatureTable, config: &ModelConfig) -> Result<(Self, TrainingReport)> {
        config.validate()?;

        let close_idx = table
            .schema()
            .index_of("close")
            .ok_or_else(|| ForecastError::ModelFit("feature table has no close column".to_string()))?;
        let rows = table.rows();
        let start = rows.len().saturating_sub(config.window);

        let mut samples: Vec<&FeatureRow> = Vec::new();
        let mut targets: Vec<f64> = Vec::new();
        for t in start..rows.len() {
            let target = rows.get(t + 1).and_then(|next| next.values[close_idx]);
            if let (Some(target), true) = (target, rows[t].is_complete()) {
                samples.push(&rows[t]);
                targets.push(target);
            }
        }
        let considered = rows.len() - start;

        if samples.len() < MIN_TRAINING_ROWS {
            return Err(ForecastError::InsufficientTrainingData {
                required: MIN_TRAINING_ROWS,
                available: samples.len(),
            });
        }

        let n = samples.len();
        let p = table.schema().len();
        let mut raw = Array2::<f64>::zeros((n, p));
        for (i, row) in samples.iter().enumerate() {
            for (j, value) in row.values.iter().enumerate() {
                raw[[i, j]] = value.unwrap_or(0.0);
            }
        }

        let mut means = Vec::with_capacity(p);
        let mut stds = Vec::with_capacity(p);
        for col in raw.columns() {
            let mean = col.sum() / n as f64;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
            means.push(mean);
            stds.push(var.sqrt());
        }

        let mut x = Array2::<f64>::zeros((n, p));
        for i in 0..n {
            for j in 0..p {
                x[[i, j]] = standardize(raw[[i, j]], means[j], stds[j]);
            }
        }
        let y = Array1::from(targets);

        let regressor = Regressor::fit(config, &x, &y)?;

        let sq_err: f64 = (0..n)
            .map(|i| (regressor.predict_row(&x.row(i).to_owned()) - y[i]).powi(2))
            .sum();
        let report = TrainingReport {
            kind: config.kind,
            rows_used: n,
            rows_dropped: considered - n,
            rmse: (sq_err / n as f64).sqrt(),
        };

        info!(
            "Model trained: {} on {} rows ({} dropped), in-sample RMSE {:.4}",
            report.kind, report.rows_used, report.rows_dropped, report.rmse
        );

        let artifact = Self {
            regressor,
            feature_names: table.schema().columns().to_vec(),
            means,
            stds,
            training_rows: n,
        };
        Ok((artifact, report))
    }

    /// Predicts the next close from one row. Undefined features take the training
    /// mean of their column.
    pub fn predict(&self, row: &FeatureRow) -> Result<f64> {
        if row.schema().columns() != self.feature_names.as_slice() {
            return Err(ForecastError::ModelFit("feature row schema differs from training schema".to_string()));
        }

        let mut imputed = 0;
        let input: Array1<f64> = row
            .values
            .iter()
            .enumerate()
            .map(|(j, v)| match v {
                Some(v) => standardize(*v, self.means[j], self.stds[j]),
                None => {
                    imputed += 1;
                    0.0
                }
            })
            .collect();
        if imputed > 0 {
            debug!("Imputed {} undefined features for {} with training means", imputed, row.date);
        }

        let prediction = self.regressor.predict_row(&input);
        if !prediction.is_finite() || prediction <= 0.0 {
            return Err(ForecastError::ModelFit(format!(
                "{} produced an unusable price {} for {}",
                self.regressor.kind(),
                prediction,
                row.date
            )));
        }
        Ok(prediction)
    }

    pub fn kind(&self) -> ModelKind {
        self.regressor.kind()
    }

    pub fn feature_names(&self) -> &[&'static str] {
        &self.feature_names
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }
}

fn standardize(value: f64, mean: f64, std: f64) -> f64 {
    if std > 1e-10 {
        (value - mean) / std
    } else {
        0.0
    }
}

/// Result of one multi-step forecast.
#[derive(Debug, Clone)]
pub struct Forecast {
    pub points: Vec<PredictionPoint>,
    pub report: TrainingReport,
    /// Last feature row of the caller's series, before any synthetic bars.
    pub latest_features: FeatureRow,
}

/// Trains once on the request's history, then walks forward one bar at a time.
#[derive(Debug, Clone)]
pub struct ForecastModel {
    config: ModelConfig,
    builder: FeatureBuilder,
}

impl ForecastModel {
    pub fn new(config: ModelConfig, with_market: bool) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            builder: FeatureBuilder::new(with_market),
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn builder(&self) -> &FeatureBuilder {
        &self.builder
    }

    /// `horizon` predictions at consecutive frequency steps after the last bar.
    /// Each step appends a flat synthetic bar at the predicted price to a private
    /// copy of the series and rebuilds features from it.
    pub fn forecast(
        &self,
        series: &BarSeries,
        market: Option<&BarSeries>,
        horizon: usize,
    ) -> Result<Forecast> {
        let table = self.builder.build(series, market)?;
        let (artifact, report) = ModelArtifact::train(&table, &self.config)?;

        let latest_features = table
            .latest()
            .cloned()
            .ok_or_else(|| ForecastError::InvalidSeries(format!("{} has no bars", series.symbol())))?;
        let mut working = series.clone();
        let mut latest = latest_features.clone();
        let mut points = Vec::with_capacity(horizon);

        for step in 1..=horizon {
            let price = artifact.predict(&latest)?;
            let point = PredictionPoint::from_f64(
                working
                    .next_date()
                    .ok_or_else(|| ForecastError::InvalidSeries("date overflow while extending series".to_string()))?,
                price,
            )?;
            debug!("Step {}/{} for {}: {} -> {}", step, horizon, series.symbol(), point.date, point.price);

            if step < horizon {
                working.push_synthetic(point.price)?;
                let extended = self.builder.build(&working, market)?;
                latest = extended
                    .latest()
                    .cloned()
                    .ok_or_else(|| ForecastError::ModelFit("empty feature table while forecasting".to_string()))?;
            }
            points.push(point);
        }

        Ok(Forecast {
            points,
            report,
            latest_features,
        })
    }
}
