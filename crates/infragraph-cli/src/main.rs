mod registry;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use infragraph_core::{
    Error as CoreError, ScaleConfig, TopologyEstimate, estimate, load_config, validate_config,
};
use infragraph_eval::{EvalError, EvaluateOptions, EvaluationEngine};
use infragraph_generate::{
    CsvExportSink, CypherScriptSink, DEFAULT_BATCH_SIZE, GenerateOptions, GenerationEngine,
    GenerationError, GenerationResult, GraphSink, IdentifierScheme, InMemoryGraphStore, LayerTask,
    SinkError, plan_layers,
};
use registry::{
    RunContext, RunOptions, RunPaths, init_console_logging, init_run_logging, start_run,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

const CYPHER_SCRIPT_FILE: &str = "topology.cypher";
const CSV_EXPORT_DIR: &str = "import";

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvalError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Parser, Debug)]
#[command(name = "infragraph", version, about = "Infragraph topology generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a topology into a sink.
    Generate(GenerateArgs),
    /// Print expected entity and edge counts without generating.
    Estimate(EstimateArgs),
    /// Check a CSV export against its configuration.
    Evaluate(EvaluateArgs),
    /// Print the configuration JSON Schema.
    ConfigSchema,
}

/// Output of `infragraph estimate`.
#[derive(Debug, Serialize)]
struct EstimateOutput {
    layers: Vec<LayerTask>,
    estimate: TopologyEstimate,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SinkKind {
    Memory,
    Cypher,
    Csv,
}

impl SinkKind {
    fn as_str(self) -> &'static str {
        match self {
            SinkKind::Memory => "memory",
            SinkKind::Cypher => "cypher",
            SinkKind::Csv => "csv",
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum IdentifiersArg {
    Uuid,
    Sequential,
}

impl From<IdentifiersArg> for IdentifierScheme {
    fn from(value: IdentifiersArg) -> Self {
        match value {
            IdentifiersArg::Uuid => IdentifierScheme::Uuid,
            IdentifiersArg::Sequential => IdentifierScheme::Sequential,
        }
    }
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Scale configuration file (TOML or JSON).
    #[arg(long)]
    config: PathBuf,
    /// Seed overriding the configuration's seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Where generated operations are committed.
    #[arg(long, value_enum, default_value_t = SinkKind::Memory)]
    sink: SinkKind,
    /// Operations per committed batch.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
    /// Identifier allocation scheme.
    #[arg(long, value_enum, default_value_t = IdentifiersArg::Uuid)]
    identifiers: IdentifiersArg,
    /// Prefix for sequential identifiers.
    #[arg(long)]
    id_prefix: Option<String>,
    /// Clear the target graph before loading the Cypher script.
    #[arg(long, default_value_t = false)]
    reset: bool,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    runs_dir: PathBuf,
}

#[derive(Args, Debug)]
struct EstimateArgs {
    /// Scale configuration file (TOML or JSON).
    #[arg(long)]
    config: PathBuf,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Directory holding a CSV export.
    #[arg(long)]
    export: PathBuf,
    /// Configuration the export was generated from.
    #[arg(long)]
    config: PathBuf,
    /// Where metrics.json and report.md are written.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Fail when any violation is found.
    #[arg(long, default_value_t = false)]
    strict: bool,
    /// Largest accepted |z| for binomial counts.
    #[arg(long, default_value_t = 6.0)]
    z_tolerance: f64,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Estimate(args) => run_estimate(args),
        Command::Evaluate(args) => run_evaluate(args),
        Command::ConfigSchema => run_config_schema(),
    }
}

fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let GenerateArgs {
        config: config_path,
        seed,
        sink,
        batch_size,
        identifiers,
        id_prefix,
        reset,
        runs_dir,
    } = args;

    if batch_size == 0 {
        return Err(CliError::InvalidConfig(
            "batch size must be at least 1".to_string(),
        ));
    }
    if reset && !matches!(sink, SinkKind::Cypher) {
        return Err(CliError::InvalidConfig(
            "--reset only applies to the cypher sink".to_string(),
        ));
    }

    let config = load_config(&config_path)?;
    let identifiers = IdentifierScheme::from(identifiers);

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        runs_dir,
        config_path,
        options: RunOptions {
            sink: sink.as_str().to_string(),
            batch_size,
            identifiers,
            id_prefix: id_prefix.clone(),
            seed,
            reset,
        },
    };

    let run_paths = start_run(&run_ctx, &config)?;
    init_run_logging(&run_paths.logs_path)?;

    tracing::info!(event = "run_started", run_id = %run_id, sink = sink.as_str());
    let timer = Instant::now();

    let options = GenerateOptions {
        out_dir: run_paths.root.clone(),
        batch_size,
        identifiers,
        id_prefix,
        seed,
    };
    let engine = GenerationEngine::new(options);

    let outcome = match sink {
        SinkKind::Memory => generate_in_memory(&engine, &config, &run_paths),
        SinkKind::Cypher => {
            let script_path = run_paths.root.join(CYPHER_SCRIPT_FILE);
            let mut sink = CypherScriptSink::create(&script_path, reset)?;
            let result = run_engine(&engine, &config, &mut sink);
            tracing::info!(
                event = "script_written",
                path = %script_path.display(),
                transactions = sink.transactions(),
                bytes = sink.bytes_written()
            );
            result
        }
        SinkKind::Csv => {
            let export_dir = run_paths.root.join(CSV_EXPORT_DIR);
            let mut sink = CsvExportSink::create(&export_dir)?;
            let result = run_engine(&engine, &config, &mut sink);
            tracing::info!(
                event = "export_written",
                path = %export_dir.display(),
                bytes = sink.bytes_written()
            );
            result
        }
    };

    let duration_ms = timer.elapsed().as_millis();
    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            tracing::warn!(
                event = "run_finished",
                status = "failure",
                duration_ms = duration_ms,
                error = %err
            );
            return Err(err);
        }
    };

    tracing::info!(event = "run_finished", status = "success", duration_ms = duration_ms);
    println!("run_dir={}", run_paths.root.display());
    println!("seed={}", result.seed);
    println!(
        "entities={} edges={}",
        result.report.entity_total(),
        result.report.edge_total()
    );
    Ok(())
}

fn run_engine(
    engine: &GenerationEngine,
    config: &ScaleConfig,
    sink: &mut dyn GraphSink,
) -> Result<GenerationResult, CliError> {
    engine.run(config, sink).map_err(CliError::from)
}

fn generate_in_memory(
    engine: &GenerationEngine,
    config: &ScaleConfig,
    run_paths: &RunPaths,
) -> Result<GenerationResult, CliError> {
    let mut store = InMemoryGraphStore::new();
    let result = run_engine(engine, config, &mut store)?;

    let resolved = ScaleConfig {
        seed: Some(result.seed),
        ..config.clone()
    };
    let evaluation = EvaluationEngine::new(EvaluateOptions {
        out_dir: Some(run_paths.root.clone()),
        ..EvaluateOptions::default()
    })
    .evaluate(&store.into_snapshot(), &resolved)?;

    if evaluation.passed() {
        tracing::info!(event = "evaluation_finished", violations = 0);
    } else {
        tracing::warn!(
            event = "evaluation_finished",
            violations = evaluation.violations.len()
        );
    }
    Ok(result)
}

fn run_estimate(args: EstimateArgs) -> Result<(), CliError> {
    init_console_logging()?;
    let config = load_config(&args.config)?;
    validate_config(&config)?;

    let expected = estimate(&config);
    tracing::info!(
        event = "estimate",
        expected_entities = expected.expected_entities(),
        expected_edges = expected.expected_edges(),
        max_candidates = expected.max_candidates()
    );
    let output = EstimateOutput {
        layers: plan_layers(&config),
        estimate: expected,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<(), CliError> {
    init_console_logging()?;
    let config = load_config(&args.config)?;

    let options = EvaluateOptions {
        strict: args.strict,
        z_tolerance: args.z_tolerance,
        out_dir: args.out,
        ..EvaluateOptions::default()
    };
    let result = EvaluationEngine::new(options).evaluate_export(&args.export, &config)?;

    tracing::info!(
        event = "evaluation_finished",
        entities = result.metrics.entity_total,
        edges = result.metrics.edge_total,
        violations = result.violations.len()
    );
    if let Some(path) = &result.metrics_path {
        println!("metrics_path={}", path.display());
    }
    if let Some(path) = &result.report_path {
        println!("report_path={}", path.display());
    }
    if result.report_path.is_none() {
        println!("{}", result.report);
    }
    Ok(())
}

fn run_config_schema() -> Result<(), CliError> {
    let schema = schemars::schema_for!(ScaleConfig);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
