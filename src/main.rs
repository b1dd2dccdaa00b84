//! Forecast engine runner.
//!
//! A thin file-based front end over the engine library:
//! 1. Materializes the JSON input collections from a data directory
//! 2. Loads (or creates) the persisted regression model
//! 3. Runs training or a forecast
//! 4. Writes the model / forecast tables back to disk
//!
//! Usage:
//!   hydrocast train    --data DIR --model FILE [--config FILE]
//!   hydrocast forecast --data DIR --model FILE --out DIR [--config FILE]
//!
//! Data directory layout (all JSON arrays of flat records):
//!   stations.json observations.json history.json
//!   reaches.json rating_curves.json basins.json
//! Missing auxiliary files (reaches/curves/basins) are treated as empty
//! lists, which steers the run onto the regression fallback.

use chrono::Utc;
use hydrocast::config::EngineConfig;
use hydrocast::forecast::{run_forecast, ForecastInputs};
use hydrocast::ingest::records;
use hydrocast::model::EngineError;
use hydrocast::regression::{train, RegressionModel};
use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();
    let Some(command) = args.get(1) else {
        usage(&args[0]);
        process::exit(1);
    };

    let result = match command.as_str() {
        "train" => run_train(&args),
        "forecast" => run_forecast_cmd(&args),
        _ => {
            usage(&args[0]);
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("\n❌ {}\n", e);
        process::exit(1);
    }
}

fn usage(program: &str) {
    eprintln!("Usage:");
    eprintln!("  {} train    --data DIR --model FILE [--config FILE]", program);
    eprintln!("  {} forecast --data DIR --model FILE --out DIR [--config FILE]", program);
}

/// Returns the value following `flag`, if present.
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn required_flag(args: &[String], flag: &str) -> Result<PathBuf, Box<dyn Error>> {
    flag_value(args, flag)
        .map(PathBuf::from)
        .ok_or_else(|| format!("{} is required", flag).into())
}

fn load_engine_config(args: &[String]) -> Result<EngineConfig, Box<dyn Error>> {
    match flag_value(args, "--config") {
        Some(path) => Ok(EngineConfig::load_from_path(Path::new(&path))?),
        None => Ok(EngineConfig::default()),
    }
}

/// Reads an input collection, treating a missing file as an empty list.
fn read_optional(dir: &Path, file: &str) -> Result<String, Box<dyn Error>> {
    let path = dir.join(file);
    if !path.exists() {
        return Ok("[]".to_string());
    }
    Ok(fs::read_to_string(&path)?)
}

fn read_required(dir: &Path, file: &str) -> Result<String, Box<dyn Error>> {
    let path = dir.join(file);
    if !path.exists() {
        return Err(Box::new(EngineError::MissingInput(format!(
            "required input file {} not found",
            path.display()
        ))));
    }
    Ok(fs::read_to_string(&path)?)
}

fn load_model(path: &Path) -> Result<RegressionModel, Box<dyn Error>> {
    if !path.exists() {
        return Ok(RegressionModel::default());
    }
    Ok(RegressionModel::from_json(&fs::read_to_string(path)?)?)
}

// ---------------------------------------------------------------------------
// train
// ---------------------------------------------------------------------------

fn run_train(args: &[String]) -> Result<(), Box<dyn Error>> {
    println!("🌊 hydrocast — model training");
    println!("=============================\n");

    let data_dir = required_flag(args, "--data")?;
    let model_path = required_flag(args, "--model")?;
    let cfg = load_engine_config(args)?;

    println!("📊 Loading input collections from {} ...", data_dir.display());
    let stations = records::parse_stations(&read_optional(&data_dir, "stations.json")?)?;
    let history = records::parse_history(&read_required(&data_dir, "history.json")?)?;
    println!("✓ {} stations, {} historical records\n", stations.len(), history.len());

    let mut model = load_model(&model_path)?;
    let report = train(&mut model, &history, &stations, Utc::now(), &cfg)?;
    fs::write(&model_path, model.to_json()?)?;

    println!(
        "✓ Training complete: {} station(s) refit, {} skipped",
        report.stations_fitted, report.stations_skipped
    );
    println!("✓ Model written to {}", model_path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// forecast
// ---------------------------------------------------------------------------

fn run_forecast_cmd(args: &[String]) -> Result<(), Box<dyn Error>> {
    println!("🌊 hydrocast — 72-hour forecast");
    println!("===============================\n");

    let data_dir = required_flag(args, "--data")?;
    let model_path = required_flag(args, "--model")?;
    let out_dir = required_flag(args, "--out")?;
    let cfg = load_engine_config(args)?;

    println!("📊 Loading input collections from {} ...", data_dir.display());
    let stations = records::parse_stations(&read_optional(&data_dir, "stations.json")?)?;
    let observations =
        records::parse_observations(&read_required(&data_dir, "observations.json")?)?;
    let reaches = records::parse_reaches(&read_optional(&data_dir, "reaches.json")?)?;
    let rating_curves =
        records::parse_rating_curves(&read_optional(&data_dir, "rating_curves.json")?)?;
    let basins = records::parse_basins(&read_optional(&data_dir, "basins.json")?)?;
    println!(
        "✓ {} stations, {} observations, {} reaches, {} curves, {} basins\n",
        stations.len(),
        observations.len(),
        reaches.len(),
        rating_curves.len(),
        basins.len()
    );

    let model = load_model(&model_path)?;
    let inputs = ForecastInputs {
        stations: &stations,
        observations: &observations,
        reaches: &reaches,
        rating_curves: &rating_curves,
        basins: &basins,
    };
    let output = run_forecast(&inputs, &model, Utc::now(), &cfg)?;

    fs::create_dir_all(&out_dir)?;
    fs::write(out_dir.join("hourly.json"), serde_json::to_string_pretty(&output.hourly)?)?;
    fs::write(out_dir.join("daily.json"), serde_json::to_string_pretty(&output.daily)?)?;
    fs::write(out_dir.join("series.json"), serde_json::to_string_pretty(&output.series)?)?;

    println!(
        "✓ Forecast complete: {} hourly rows, {} daily rows, {} station series",
        output.hourly.len(),
        output.daily.len(),
        output.series.len()
    );
    println!("✓ Tables written to {}", out_dir.display());
    Ok(())
}
