use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::TrainArgs;
use crate::error::{Error, Result};
use crate::utils::{ensure_directory, write_json};

// Run directory created under the output project
pub const RUN_NAME: &str = "run";
const MAP50_COLUMN: &str = "metrics/mAP50(B)";

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRequest {
    pub data: PathBuf,
    pub epochs: u32,
    pub imgsz: u32,
    pub model: String,
    pub output: PathBuf,
}

impl From<&TrainArgs> for TrainingRequest {
    fn from(args: &TrainArgs) -> Self {
        Self {
            data: args.data.clone(),
            epochs: args.epochs,
            imgsz: args.imgsz,
            model: args.model.clone(),
            output: args.output.clone(),
        }
    }
}

impl TrainingRequest {
    pub fn run_dir(&self) -> PathBuf {
        self.output.join(RUN_NAME)
    }
}

/// Something that can fit a detection model for a request
pub trait Trainer {
    /// Train and return the run directory holding weights and results
    fn train(&self, request: &TrainingRequest) -> Result<PathBuf>;
}

/// Trains through the Ultralytics `yolo` command-line tool
pub struct UltralyticsCli {
    program: String,
}

impl UltralyticsCli {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    pub fn command_args(request: &TrainingRequest) -> Vec<String> {
        vec![
            "detect".to_string(),
            "train".to_string(),
            format!("data={}", request.data.display()),
            format!("model={}", request.model),
            format!("epochs={}", request.epochs),
            format!("imgsz={}", request.imgsz),
            format!("project={}", request.output.display()),
            format!("name={}", RUN_NAME),
            "exist_ok=True".to_string(),
        ]
    }
}

impl Trainer for UltralyticsCli {
    fn train(&self, request: &TrainingRequest) -> Result<PathBuf> {
        let status = Command::new(&self.program)
            .args(Self::command_args(request))
            .status()
            .map_err(|e| Error::Command {
                program: self.program.clone(),
                message: format!("could not start training ({}); is Ultralytics installed?", e),
            })?;
        if !status.success() {
            return Err(Error::Command {
                program: self.program.clone(),
                message: format!("training exited with {}", status),
            });
        }
        Ok(request.run_dir())
    }
}

/// Summary persisted next to the trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub epochs: u32,
    pub imgsz: u32,
    pub best_map50: Option<f64>,
}

/// Best mAP@0.5 over all epochs of an Ultralytics `results.csv`
pub fn best_map50(results_csv: &str) -> Option<f64> {
    let mut lines = results_csv.lines();
    let header = lines.next()?;
    let column = header.split(',').position(|name| name.trim() == MAP50_COLUMN)?;

    lines
        .filter_map(|line| line.split(',').nth(column))
        .filter_map(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .fold(None, |best: Option<f64>, value| {
            Some(best.map_or(value, |b| b.max(value)))
        })
}

fn read_best_map50(run_dir: &Path) -> Option<f64> {
    let path = run_dir.join("results.csv");
    match fs::read_to_string(&path) {
        Ok(contents) => best_map50(&contents),
        Err(e) => {
            warn!("No training results at {}: {}", path.display(), e);
            None
        }
    }
}

/// Train with `trainer` and write `metrics.json` into the output directory.
///
/// Training errors propagate; failing to write the metrics file does not.
pub fn train_model(trainer: &dyn Trainer, request: &TrainingRequest) -> Result<TrainingMetrics> {
    ensure_directory(&request.output)?;
    info!("Output directory: {}", request.output.display());
    info!(
        "Starting YOLO training | model={} | data={} | epochs={} | imgsz={}",
        request.model,
        request.data.display(),
        request.epochs,
        request.imgsz
    );

    let run_dir = trainer.train(request)?;

    let metrics = TrainingMetrics {
        epochs: request.epochs,
        imgsz: request.imgsz,
        best_map50: read_best_map50(&run_dir),
    };
    let metrics_path = request.output.join("metrics.json");
    match write_json(&metrics_path, &metrics) {
        Ok(()) => {
            info!("Metrics saved: {:?}", metrics);
            info!("Saved metrics to {}", metrics_path.display());
        }
        Err(e) => warn!("Failed to write metrics.json: {}", e),
    }

    info!("Training complete");
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS: &str = "                  epoch,      train/box_loss,   metrics/precision(B),       metrics/mAP50(B),    metrics/mAP50-95(B)
                      1,              1.2345,                0.51,                 0.412,                 0.25
                      2,              1.1000,                0.55,                 0.538,                 0.31
                      3,              1.0500,                0.57,                 0.521,                 0.30
";

    #[test]
    fn test_best_map50() {
        assert_eq!(best_map50(RESULTS), Some(0.538));
        assert_eq!(best_map50("epoch,loss\n1,0.5\n"), None);
        assert_eq!(best_map50(""), None);
    }

    #[test]
    fn test_command_args() {
        let request = TrainingRequest {
            data: PathBuf::from("/data/data.yaml"),
            epochs: 5,
            imgsz: 320,
            model: "yolov8s.pt".to_string(),
            output: PathBuf::from("/out"),
        };
        let args = UltralyticsCli::command_args(&request);
        assert_eq!(&args[..2], &["detect", "train"]);
        assert!(args.contains(&"data=/data/data.yaml".to_string()));
        assert!(args.contains(&"epochs=5".to_string()));
        assert!(args.contains(&"imgsz=320".to_string()));
        assert!(args.contains(&"model=yolov8s.pt".to_string()));
        assert!(args.contains(&"project=/out".to_string()));
        assert!(args.contains(&"name=run".to_string()));
    }

    #[test]
    fn missing_executable_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let request = TrainingRequest {
            data: temp.path().join("data.yaml"),
            epochs: 1,
            imgsz: 64,
            model: "yolov8n.pt".to_string(),
            output: temp.path().join("out"),
        };
        let trainer = UltralyticsCli::new("definitely-not-a-yolo-binary");
        assert!(matches!(
            train_model(&trainer, &request),
            Err(Error::Command { .. })
        ));
        assert!(!request.output.join("metrics.json").exists());
    }
}
