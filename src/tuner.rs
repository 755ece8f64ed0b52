//! Hyperparameter tuning of the genetic algorithm through a surrogate model.

use crate::config::{GaConfig, GaParams, OptimizationConfig, ParamGrid, FEATURE_NAMES};
use crate::distance::DistanceMatrix;
use crate::error::{Error, Result};
use crate::solver::GeneticAlgorithm;
use crate::surrogate::{mean_absolute_error, r2_score, train_test_split, SurrogateModel};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Best fitness achieved by one solver run at a grid point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperparamSample {
    pub params: GaParams,
    pub best_fit: f64,
}

/// Held-out quality of a fitted surrogate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub r2_score: f64,
    pub mae: f64,
    /// Features ranked by importance, most important first
    pub feature_importance: Vec<(String, f64)>,
    pub n_train: usize,
    pub n_test: usize,
    /// Samples dropped for having a non-finite fitness
    pub n_dropped: usize,
}

/// The grid point with the lowest predicted fitness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub params: GaParams,
    pub predicted_fit: f64,
}

/// A solver objective that runs the genetic algorithm deterministically on a fixed matrix.
pub fn ga_objective(
    config: GaConfig,
    matrix: DistanceMatrix,
) -> impl FnMut(&GaParams) -> Result<f64> {
    let mut ga = GeneticAlgorithm::new(config.with_deterministic(true));
    move |params| Ok(ga.optimize(&matrix, *params)?.distance)
}

/// Sweeps a hyperparameter grid, fits a surrogate, and recommends parameters from it.
pub struct HyperparameterTuner {
    pub config: OptimizationConfig,
    samples: Vec<HyperparamSample>,
    model: Option<SurrogateModel>,
}

impl HyperparameterTuner {
    pub fn new(config: OptimizationConfig) -> Self {
        HyperparameterTuner {
            config,
            samples: Vec::new(),
            model: None,
        }
    }

    /// Evaluate `objective` at every grid point, in grid order.
    ///
    /// Uses the configured search space when `grid` is `None`.
    pub fn sweep<F>(&mut self, mut objective: F, grid: Option<&ParamGrid>) -> Result<&[HyperparamSample]>
    where
        F: FnMut(&GaParams) -> Result<f64>,
    {
        let grid = grid.unwrap_or(&self.config.ga.search_space);
        let combinations = grid.combinations();
        let total = combinations.len();

        info!("Starting hyperparameter search: {} combinations", total);

        let mut samples = Vec::with_capacity(total);
        for (i, params) in combinations.into_iter().enumerate() {
            debug!(
                "GA {}/{}: PopSize={}, Gens={}, MutRate={:.2}, CrossRate={:.2}",
                i + 1,
                total,
                params.pop_size,
                params.generations,
                params.mutation_rate,
                params.crossover_rate
            );
            let best_fit = objective(&params)?;
            samples.push(HyperparamSample { params, best_fit });
        }

        info!(
            "Hyperparameter search completed: {} samples collected",
            samples.len()
        );
        self.samples = samples;
        Ok(&self.samples)
    }

    pub fn samples(&self) -> &[HyperparamSample] {
        &self.samples
    }

    /// Fit the surrogate on the samples of the last sweep.
    pub fn fit(&mut self) -> Result<FitReport> {
        if self.samples.is_empty() {
            return Err(Error::precondition(
                "no training data, run the hyperparameter sweep first",
            ));
        }
        let samples = std::mem::take(&mut self.samples);
        let report = self.fit_samples(&samples);
        self.samples = samples;
        report
    }

    /// Fit the surrogate on explicit samples and evaluate it on a held-out partition.
    pub fn fit_samples(&mut self, samples: &[HyperparamSample]) -> Result<FitReport> {
        let finite: Vec<HyperparamSample> = samples
            .iter()
            .filter(|s| s.best_fit.is_finite())
            .copied()
            .collect();
        let n_dropped = samples.len() - finite.len();
        if n_dropped > 0 {
            warn!("Dropping {} samples with non-finite fitness", n_dropped);
        }
        if finite.len() < 2 {
            return Err(Error::precondition(format!(
                "need at least 2 finite samples to fit, found {}",
                finite.len()
            )));
        }

        let (train, test) =
            train_test_split(&finite, self.config.surrogate.test_size, self.config.random_state);

        info!("Training surrogate model on {} samples...", train.len());
        let (x_train, y_train) = Self::columns(&train);
        let model = SurrogateModel::fit(&FEATURE_NAMES, &x_train, &y_train, &self.config.surrogate)?;

        let (x_test, y_test) = Self::columns(&test);
        let predicted = model.predict_batch(&x_test);
        let r2 = r2_score(&y_test, &predicted);
        let mae = mean_absolute_error(&y_test, &predicted);
        let feature_importance = model.feature_importance();

        info!("Model Evaluation: R²={:.4}, MAE={:.4}", r2, mae);
        debug!("Feature Importances: {:?}", feature_importance);

        self.model = Some(model);

        Ok(FitReport {
            r2_score: r2,
            mae,
            feature_importance,
            n_train: train.len(),
            n_test: test.len(),
            n_dropped,
        })
    }

    /// Pick the grid point with the lowest predicted fitness.
    ///
    /// Uses the configured recommendation space when `grid` is `None`. No solver runs
    /// happen here; the answer is only as good as the surrogate.
    pub fn recommend(&self, grid: Option<&ParamGrid>) -> Result<Recommendation> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| Error::precondition("model not trained, call fit first"))?;
        let grid = grid.unwrap_or(&self.config.ga.recommendation_space);

        let best = grid
            .combinations()
            .into_iter()
            .map(|params| Recommendation {
                predicted_fit: model.predict(&params.features()),
                params,
            })
            .min_by(|a, b| a.predicted_fit.total_cmp(&b.predicted_fit))
            .ok_or_else(|| Error::precondition("recommendation grid is empty"))?;

        info!(
            "Optimal hyperparameters found: PopSize={}, Gens={}, MutRate={:.3}, CrossRate={:.3}, PredictedFit={:.4}",
            best.params.pop_size,
            best.params.generations,
            best.params.mutation_rate,
            best.params.crossover_rate,
            best.predicted_fit
        );

        Ok(best)
    }

    pub fn model(&self) -> Option<&SurrogateModel> {
        self.model.as_ref()
    }

    pub fn set_model(&mut self, model: SurrogateModel) {
        self.model = Some(model);
    }

    /// Persist the fitted model; defaults to the configured cache file.
    pub fn save_model(&self, path: Option<&Path>) -> Result<PathBuf> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| Error::precondition("no model to save, train the model first"))?;
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.surrogate.model_cache_file.clone());

        model.save(&path)?;
        info!("Model saved to: {}", path.display());
        Ok(path)
    }

    /// Load a persisted model; defaults to the configured cache file.
    pub fn load_model(&mut self, path: Option<&Path>) -> Result<()> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.surrogate.model_cache_file.clone());

        self.model = Some(SurrogateModel::load(&path)?);
        info!("Model loaded from: {}", path.display());
        Ok(())
    }

    /// The configured genetic algorithm settings with recommended hyperparameters applied.
    pub fn optimal_config(&self, recommendation: &Recommendation) -> GaConfig {
        self.config.ga.clone().with_params(recommendation.params)
    }

    fn columns(samples: &[HyperparamSample]) -> (Vec<Vec<f64>>, Vec<f64>) {
        samples
            .iter()
            .map(|s| (s.params.features().to_vec(), s.best_fit))
            .unzip()
    }
}
