//! CLI driver: trains an `Ivfadc` index from a TOML config, populates it
//! with a base set, queries it, and reports recall@R against ground
//! truth. Mirrors `original_source/src/main.py::main` step for step.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use ivfadc::error::Result;
use ivfadc::io::config::AppConfig;
use ivfadc::io::{recall, texmex};
use ivfadc::ivfadc::Ivfadc;

/// Trains and evaluates an IVFADC index against a TEXMEX benchmark.
#[derive(Parser)]
#[command(name = "ivfadc", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    config_path: PathBuf,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    match run(&cli.config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(2)
        }
    }
}

fn run(config_path: &PathBuf) -> Result<()> {
    let config = AppConfig::from_path(config_path)?;
    init_logging(&config.misc.log_level);

    let train_data = texmex::read_vector_dataset(&config.datasets.train_set)?;
    let mut index = Ivfadc::new(config.to_ivfadc_config());
    tracing::info!(n = train_data.len(), dim = train_data.first().map(|v| v.len()).unwrap_or(0),
        "beginning ivfadc training");
    index.train(&train_data)?;
    drop(train_data);
    tracing::info!("finished training ivfadc");

    let base_data = texmex::read_vector_dataset(&config.datasets.base_set)?;
    tracing::info!(n = base_data.len(), "populating ivfadc with base set");
    for (id, vector) in base_data.iter().enumerate() {
        index.insert(id as u64, vector)?;
    }
    drop(base_data);
    tracing::info!("ivfadc populated");

    let query_data = texmex::read_vector_dataset(&config.datasets.query_set)?;
    let k = config.ivfadc.nearest_neighbors;
    tracing::info!(n = query_data.len(), k, "querying nearest neighbors");
    let results = search_queries(&index, &query_data, k)?;
    drop(query_data);
    tracing::info!("results computed for {k} nearest neighbors");

    let ground_truth = texmex::read_ground_truth(&config.datasets.ground_truth)?;
    let recalls = recall::evaluate(&ground_truth, &results, &config.misc.recall_rs);

    report_config(&config);
    report_recalls(&config.misc.recall_rs, &recalls);

    Ok(())
}

fn search_queries(index: &Ivfadc, queries: &[ivfadc::vector::Vector], k: usize) -> Result<Vec<Vec<u64>>> {
    queries.iter().map(|query| index.search(query, k)).collect()
}

fn report_config(config: &AppConfig) {
    println!("[Datasets]");
    println!("dataset_name={}", config.datasets.dataset_name);
    println!("[Coarse Quantizer]");
    println!(
        "number_centroids={}, max_iterations={}, seed={}",
        config.coarse_quantizer.number_centroids,
        config.coarse_quantizer.max_iterations,
        config.coarse_quantizer.seed
    );
    println!("[Product Quantizer]");
    println!(
        "number_subquantizers={}, number_centroids={}, max_iterations={}, seed={}",
        config.product_quantizer.number_subquantizers,
        config.product_quantizer.number_centroids,
        config.product_quantizer.max_iterations,
        config.product_quantizer.seed
    );
    println!("[IVFADC]");
    println!(
        "coarse_neighbors_lookup={}, nearest_neighbors={}",
        config.ivfadc.coarse_neighbors_lookup, config.ivfadc.nearest_neighbors
    );
}

fn report_recalls(recall_rs: &[usize], recalls: &[f64]) {
    for (r, value) in recall_rs.iter().zip(recalls.iter()) {
        println!("recall@{r}: {value}");
    }
}

fn init_logging(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
