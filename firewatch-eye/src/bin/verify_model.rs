//! Binary for checking model artifacts from the command line

use firewatch_eye::config::VisionConfig;
use firewatch_eye::error::VisionError;
use firewatch_eye::models::manager::{sha256_file, ModelManager};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> Result<(), VisionError> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: verify_model <model.onnx> [expected-sha256]");
        std::process::exit(1);
    }

    let path = PathBuf::from(&args[1]);
    let manager = ModelManager::new(Arc::new(VisionConfig::default()));
    manager.ensure_model(&path)?;

    match args.get(2) {
        Some(expected) => {
            manager.verify_checksum(&path, expected)?;
            println!("{}: checksum OK", path.display());
        }
        None => {
            println!("{}  {}", sha256_file(&path)?, path.display());
        }
    }

    Ok(())
}
