#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, Parser, Subcommand, ValueEnum};
use dcorr::{ConfigError, DcaConfig, DcaError, DcaFit, OptimizerMode, ProjectedDistance, fit_dca};
use ndarray::{Array2, Axis};
use std::path::{Path, PathBuf};
use std::process;
use thiserror::Error;

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeCli {
    Batch,
    Stochastic,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DistanceCli {
    Absolute,
    Signed,
}

#[derive(Parser)]
#[command(
    name = "dcorr",
    about = "Distance Covariance Analysis for supervised dimensionality reduction",
    long_about = "Finds orthogonal directions of a feature table whose projections have maximal \
                 squared distance covariance with one or more response columns."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit DCA directions to a tab-separated table
    #[command(about = "Fit DCA (outputs: <prefix>.basis.tsv, <prefix>.scores.tsv)")]
    Fit(FitArgs),
}

#[derive(Args)]
pub struct FitArgs {
    /// Path to a TSV file with a header row; every cell must be numeric
    pub input: PathBuf,

    /// Response column name(s), comma separated
    #[arg(long, required = true, value_delimiter = ',')]
    pub response: Vec<String>,

    /// Feature column name(s); defaults to every non-response column
    #[arg(long, value_delimiter = ',')]
    pub features: Option<Vec<String>>,

    /// TOML file with DCA settings; command-line flags take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of directions to extract
    #[arg(long, value_name = "K")]
    pub components: Option<usize>,

    /// Step size of the projected gradient ascent
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Stop when the squared change of the score falls to this value
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Maximum ascent steps per direction
    #[arg(long)]
    pub max_iterations: Option<usize>,

    #[arg(long, value_enum)]
    pub mode: Option<ModeCli>,

    #[arg(long, value_enum)]
    pub projected_distance: Option<DistanceCli>,

    /// Level of the significance gate between successive directions
    #[arg(long)]
    pub significance_p: Option<f64>,

    /// Stop at the first direction rejected by the significance gate
    #[arg(long)]
    pub enforce_significance: bool,

    /// Seed for direction initialization and stochastic sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Prefix for the output files
    #[arg(long, default_value = "dca")]
    pub output_prefix: String,

    /// Also write the data projected onto the extracted directions
    #[arg(long)]
    pub transform: bool,
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to read or write TSV: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dca(#[from] DcaError),
    #[error("Table has inconsistent dimensions: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("The required column '{0}' was not found in the input file.")]
    MissingColumn(String),
    #[error("Non-numeric value '{value}' in column '{column}' on data row {row}.")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },
    #[error("The input file contains no data rows.")]
    EmptyTable,
    #[error("No feature columns remain after removing the response columns.")]
    NoFeatures,
}

/// A numeric table read from a TSV file.
#[derive(Debug)]
pub struct Table {
    pub headers: Vec<String>,
    pub values: Array2<f64>,
}

impl Table {
    fn column_indices(&self, names: &[String]) -> Result<Vec<usize>, CliError> {
        names
            .iter()
            .map(|name| {
                self.headers
                    .iter()
                    .position(|h| h == name)
                    .ok_or_else(|| CliError::MissingColumn(name.clone()))
            })
            .collect()
    }
}

pub fn read_table(path: &Path) -> Result<Table, CliError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut data = Vec::new();
    let mut rows = 0usize;
    for record in reader.records() {
        let record = record?;
        rows += 1;
        for (field, column) in record.iter().zip(headers.iter()) {
            let value = field.parse::<f64>().map_err(|_| CliError::NonNumeric {
                column: column.clone(),
                row: rows,
                value: field.to_string(),
            })?;
            data.push(value);
        }
    }
    if rows == 0 {
        return Err(CliError::EmptyTable);
    }
    let values = Array2::from_shape_vec((rows, headers.len()), data)?;
    Ok(Table { headers, values })
}

fn build_config(args: &FitArgs) -> Result<DcaConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => DcaConfig::load(path)?,
        None => DcaConfig::default(),
    };
    if let Some(k) = args.components {
        config.target_dim = k;
    }
    if let Some(lr) = args.learning_rate {
        config.learning_rate = lr;
    }
    if let Some(tol) = args.tolerance {
        config.tolerance = tol;
    }
    if let Some(cap) = args.max_iterations {
        config.max_iterations = cap;
    }
    if let Some(mode) = args.mode {
        config.mode = match mode {
            ModeCli::Batch => OptimizerMode::Batch,
            ModeCli::Stochastic => OptimizerMode::Stochastic,
        };
    }
    if let Some(kind) = args.projected_distance {
        config.projected_distance = match kind {
            DistanceCli::Absolute => ProjectedDistance::Absolute,
            DistanceCli::Signed => ProjectedDistance::Signed,
        };
    }
    if let Some(p) = args.significance_p {
        config.significance_p = p;
    }
    if args.enforce_significance {
        config.enforce_significance = true;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

fn component_names(k: usize) -> Vec<String> {
    (1..=k).map(|i| format!("DC{i}")).collect()
}

fn tsv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>, CliError> {
    Ok(csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?)
}

fn write_fit(
    fit: &DcaFit,
    feature_names: &[String],
    prefix: &str,
) -> Result<(PathBuf, PathBuf), CliError> {
    let components = component_names(fit.n_components());

    let basis_path = PathBuf::from(format!("{prefix}.basis.tsv"));
    let mut writer = tsv_writer(&basis_path)?;
    let mut header = vec!["feature".to_string()];
    header.extend(components.iter().cloned());
    writer.write_record(&header)?;
    for (name, row) in feature_names.iter().zip(fit.basis.outer_iter()) {
        let mut record = vec![name.clone()];
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;

    let scores_path = PathBuf::from(format!("{prefix}.scores.tsv"));
    let mut writer = tsv_writer(&scores_path)?;
    writer.write_record(["component", "score"])?;
    for (name, score) in components.iter().zip(fit.scores.iter()) {
        writer.write_record([name.clone(), score.to_string()])?;
    }
    writer.flush()?;

    Ok((basis_path, scores_path))
}

fn write_projection(projected: &Array2<f64>, prefix: &str) -> Result<PathBuf, CliError> {
    let path = PathBuf::from(format!("{prefix}.projected.tsv"));
    let mut writer = tsv_writer(&path)?;
    writer.write_record(component_names(projected.ncols()))?;
    for row in projected.outer_iter() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(path)
}

pub fn fit_command(args: &FitArgs) -> Result<DcaFit, CliError> {
    let config = build_config(args)?;
    let table = read_table(&args.input)?;

    let response_idx = table.column_indices(&args.response)?;
    let feature_names: Vec<String> = match &args.features {
        Some(names) => names.clone(),
        None => table
            .headers
            .iter()
            .filter(|h| !args.response.contains(h))
            .cloned()
            .collect(),
    };
    if feature_names.is_empty() {
        return Err(CliError::NoFeatures);
    }
    let feature_idx = table.column_indices(&feature_names)?;

    let x = table.values.select(Axis(1), &feature_idx);
    let y = table.values.select(Axis(1), &response_idx);
    log::info!(
        "Loaded {} rows from {}: {} features, {} response columns",
        x.nrows(),
        args.input.display(),
        x.ncols(),
        y.ncols()
    );

    let fit = fit_dca(x.view(), y.view(), &config)?;
    let (basis_path, scores_path) = write_fit(&fit, &feature_names, &args.output_prefix)?;
    println!(
        "Extracted {} direction(s). Basis written to {}, scores to {}",
        fit.n_components(),
        basis_path.display(),
        scores_path.display()
    );

    if args.transform {
        let projected = fit.transform(x.view())?;
        let path = write_projection(&projected, &args.output_prefix)?;
        println!("Projected data written to {}", path.display());
    }
    Ok(fit)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fit(args) => fit_command(&args).map(|_| ()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
