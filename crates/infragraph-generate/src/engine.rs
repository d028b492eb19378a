use std::any::Any;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, warn};

use infragraph_core::{ScaleConfig, estimate, validate_config};

use crate::builder::TopologyBuilder;
use crate::errors::GenerationError;
use crate::model::{FailureReport, GenerateOptions, GenerationReport};
use crate::sink::GraphSink;

pub const RESOLVED_CONFIG_FILE: &str = "resolved_config.json";
pub const REPORT_FILE: &str = "generation_report.json";

/// Result of a generation run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub out_dir: PathBuf,
    pub seed: u64,
    pub report: GenerationReport,
}

/// Entry point for generating a topology into a sink.
#[derive(Debug, Clone)]
pub struct GenerationEngine {
    options: GenerateOptions,
}

impl GenerationEngine {
    pub fn new(options: GenerateOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub fn run(
        &self,
        config: &ScaleConfig,
        sink: &mut dyn GraphSink,
    ) -> Result<GenerationResult, GenerationError> {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let out_dir = self.options.out_dir.clone();
        std::fs::create_dir_all(&out_dir)?;

        let seed = self
            .options
            .seed
            .or(config.seed)
            .unwrap_or_else(rand::random);
        let resolved = ScaleConfig {
            seed: Some(seed),
            ..config.clone()
        };
        validate_config(&resolved)?;

        let config_path = out_dir.join(RESOLVED_CONFIG_FILE);
        std::fs::write(&config_path, serde_json::to_vec_pretty(&resolved)?)?;

        let expected = estimate(&resolved);
        let ids = self
            .options
            .identifiers
            .allocator(self.options.id_prefix.clone());
        let mut builder =
            TopologyBuilder::seeded(resolved, seed, ids, self.options.batch_size)?;
        let mut report = GenerationReport::new(
            run_id.clone(),
            seed,
            self.options.identifiers,
            self.options.batch_size,
        );

        info!(
            run_id = %run_id,
            seed,
            layers = builder.tasks().len(),
            expected_entities = expected.expected_entities(),
            expected_edges = expected.expected_edges(),
            identifiers = self.options.identifiers.as_str(),
            batch_size = self.options.batch_size,
            "generation started"
        );

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(
            || -> Result<(), GenerationError> {
                builder.build(sink)?;
                sink.flush()?;
                Ok(())
            },
        ));

        for layer in builder.reports() {
            report.record_layer(layer);
        }
        report.duration_ms = start.elapsed().as_millis() as u64;

        let report_path = out_dir.join(REPORT_FILE);
        let write_report = |report: &GenerationReport| -> Result<(), GenerationError> {
            std::fs::write(&report_path, serde_json::to_vec_pretty(report)?)?;
            Ok(())
        };

        match outcome {
            Ok(Ok(())) => {
                write_report(&report)?;
                info!(
                    run_id = %run_id,
                    entities = report.entity_total(),
                    edges = report.edge_total(),
                    batches = report.batches,
                    duration_ms = report.duration_ms,
                    "generation completed"
                );
                Ok(GenerationResult {
                    out_dir,
                    seed,
                    report,
                })
            }
            Ok(Err(err)) => {
                report.record_failure(FailureReport::from_error(&err));
                write_report(&report)?;
                warn!(run_id = %run_id, error = %err, "generation failed");
                Err(err)
            }
            Err(panic) => {
                report.record_failure(FailureReport::message(
                    "generation_panicked",
                    panic_message(panic),
                ));
                write_report(&report)?;
                warn!(run_id = %run_id, "generation panicked");
                Err(GenerationError::Failed(report))
            }
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during generation".to_string()
    }
}
