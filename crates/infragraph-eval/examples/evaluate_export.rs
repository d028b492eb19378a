use std::env;
use std::path::PathBuf;

use infragraph_core::load_config;
use infragraph_eval::{EvaluateOptions, EvaluationEngine};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut export_dir: Option<PathBuf> = None;
    let mut out_dir: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = args.next().map(PathBuf::from),
            "--export" => export_dir = args.next().map(PathBuf::from),
            "--out" => out_dir = args.next().map(PathBuf::from),
            _ => {
                if config_path.is_none() {
                    config_path = Some(PathBuf::from(arg));
                } else {
                    return Err("unexpected argument".into());
                }
            }
        }
    }

    let config_path = config_path.ok_or("missing --config path")?;
    let export_dir = export_dir.ok_or("missing --export directory")?;
    let config = load_config(&config_path)?;

    let options = EvaluateOptions {
        out_dir,
        ..EvaluateOptions::default()
    };
    let engine = EvaluationEngine::new(options);
    let result = engine.evaluate_export(&export_dir, &config)?;

    if let Some(path) = &result.metrics_path {
        println!("metrics_path={}", path.display());
    }
    if let Some(path) = &result.report_path {
        println!("report_path={}", path.display());
    }
    println!("violations={}", result.violations.len());
    Ok(())
}
