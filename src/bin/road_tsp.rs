//! Command-line front end: optimize a route, tune the solver, or query a saved surrogate.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use road_tsp::distance::DistanceOracle;
use road_tsp::tuner::ga_objective;
use road_tsp::utils::{format_duration, save_route_report};
use road_tsp::{
    Coordinate, GraphLoader, HyperparameterTuner, OptimizationConfig, OptimizeOptions,
    RouteOptimizer,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "road-tsp", version, about = "Road-network aware tour optimization")]
struct Cli {
    /// JSON configuration file; defaults apply to missing fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find a short tour through the given coordinates, starting at the first
    Optimize {
        /// Road network snapshot (JSON)
        #[arg(long)]
        graph: PathBuf,
        /// Stop as "lat,lon"; repeat for every stop
        #[arg(
            long = "coord",
            required = true,
            allow_hyphen_values = true,
            value_parser = parse_coordinate
        )]
        coords: Vec<Coordinate>,
        /// Use hyperparameters recommended by this saved surrogate
        #[arg(long)]
        model: Option<PathBuf>,
        /// Write a plain-text report here
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Sweep the search space, fit the surrogate and save it
    Tune {
        /// Road network snapshot (JSON)
        #[arg(long)]
        graph: PathBuf,
        /// Where to save the model; defaults to the configured cache file
        #[arg(long)]
        model: Option<PathBuf>,
        /// Number of graph nodes in the benchmark matrix
        #[arg(long)]
        nodes: Option<usize>,
    },
    /// Recommend hyperparameters from a saved surrogate
    Recommend {
        #[arg(long)]
        model: Option<PathBuf>,
    },
}

fn parse_coordinate(s: &str) -> std::result::Result<Coordinate, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lon\", got \"{}\"", s))?;
    let latitude: f64 = lat.trim().parse().map_err(|e| format!("latitude: {}", e))?;
    let longitude: f64 = lon.trim().parse().map_err(|e| format!("longitude: {}", e))?;
    Coordinate::checked(latitude, longitude).map_err(|e| e.to_string())
}

fn load_graph(config: &OptimizationConfig, path: &Path) -> Result<Arc<GraphLoader>> {
    let loader = GraphLoader::from_snapshot_file(config.map.clone(), path);
    loader
        .load_graph()
        .with_context(|| format!("loading road network from {}", path.display()))?;
    Ok(Arc::new(loader))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => OptimizationConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => OptimizationConfig::new(),
    };

    match cli.command {
        Command::Optimize {
            graph,
            coords,
            model,
            report,
        } => {
            let loader = load_graph(&config, &graph)?;
            let mut optimizer = RouteOptimizer::new(config.ga.clone(), loader);

            if let Some(model) = model {
                let mut tuner = HyperparameterTuner::new(config.clone());
                tuner.load_model(Some(model.as_path()))?;
                let recommendation = tuner.recommend(None)?;
                optimizer = optimizer.with_tuned_params(recommendation.params);
            }

            let start = Instant::now();
            let result = optimizer
                .optimize(&coords, OptimizeOptions::default())
                .context("optimization failed")?;
            info!("Optimization finished in {}", format_duration(start.elapsed()));

            if let Some(report) = report {
                save_route_report(&result, &coords, &report)
                    .with_context(|| format!("writing report {}", report.display()))?;
            }

            let output = serde_json::json!({
                "optimized_order": result.route_indices,
                "waypoints": result.waypoints(&coords),
                "total_distance": result.total_distance,
                "total_duration": result.estimated_time_minutes * 60.0,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Tune {
            graph,
            model,
            nodes,
        } => {
            let loader = load_graph(&config, &graph)?;
            let network = loader.graph().context("road network not loaded")?;
            let n_nodes = nodes.unwrap_or(config.surrogate.training_n_nodes);

            let matrix = DistanceOracle::new(network).sample_matrix(n_nodes)?;
            info!("Training configuration: {} nodes sample", matrix.size());

            let start = Instant::now();
            let mut tuner = HyperparameterTuner::new(config.clone());
            tuner.sweep(ga_objective(config.ga.clone(), matrix), None)?;
            let report = tuner.fit()?;
            let recommendation = tuner.recommend(None)?;
            let saved = tuner.save_model(model.as_deref())?;
            info!("Tuning finished in {}", format_duration(start.elapsed()));

            let output = serde_json::json!({
                "model": saved,
                "report": report,
                "recommendation": recommendation,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Recommend { model } => {
            let mut tuner = HyperparameterTuner::new(config);
            tuner.load_model(model.as_deref())?;
            let recommendation = tuner.recommend(None)?;
            println!("{}", serde_json::to_string_pretty(&recommendation)?);
        }
    }

    Ok(())
}
