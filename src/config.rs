use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

/// Detect whether a dataset folder holds COCO or YOLO annotations.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct DetectArgs {
    /// Input dataset folder
    #[arg(long = "input-data")]
    pub input_data: PathBuf,

    /// Output file for the format decision (JSON)
    #[arg(long = "format-info")]
    pub format_info: PathBuf,

    /// Output file for the detailed detection report (JSON)
    #[arg(long = "format-report")]
    pub format_report: PathBuf,
}

/// Convert COCO to YOLO or copy a YOLO dataset, driven by the detector's decision.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct ProcessArgs {
    /// Input dataset folder
    #[arg(long = "input-data")]
    pub input_data: PathBuf,

    /// Format decision file written by detect-format
    #[arg(long = "detected-format")]
    pub detected_format: PathBuf,

    /// Output folder for the YOLO dataset
    #[arg(long = "output-data")]
    pub output_data: PathBuf,

    /// Output file for the processing report (JSON)
    #[arg(long = "processing-report")]
    pub processing_report: PathBuf,
}

/// Train a YOLO detection model on a prepared dataset.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct TrainArgs {
    /// Path to the YOLO data.yaml
    #[arg(long = "data")]
    pub data: PathBuf,

    /// Number of training epochs
    #[arg(long = "epochs", default_value_t = 10, value_parser = validate_positive)]
    pub epochs: u32,

    /// Training image size
    #[arg(long = "imgsz", default_value_t = 640, value_parser = validate_positive)]
    pub imgsz: u32,

    /// Base model weights
    #[arg(long = "model", default_value = "yolov8n.pt")]
    pub model: String,

    /// Output directory for the trained model
    #[arg(long = "output")]
    pub output: PathBuf,

    /// Ultralytics executable used to run the training
    #[arg(long = "yolo-bin", default_value = "yolo")]
    pub yolo_bin: String,
}

/// Register a trained model in the Azure ML workspace of the current job.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct RegisterArgs {
    /// Name under which the model is registered
    #[arg(long = "model_name")]
    pub model_name: String,

    /// Local or mounted path to the model files (directory or file)
    #[arg(long = "model_path")]
    pub model_path: PathBuf,

    /// Directory receiving model_info.json
    #[arg(long = "model_info_output_path")]
    pub model_info_output_path: PathBuf,

    /// Azure CLI executable
    #[arg(long = "az-bin", default_value = "az")]
    pub az_bin: String,
}

/// Fallbacks applied when COCO metadata is incomplete
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionDefaults {
    pub image_width: f64,
    pub image_height: f64,
    /// Class name written to classes.txt when no categories were found
    pub class_name: String,
}

impl Default for ConversionDefaults {
    fn default() -> Self {
        Self {
            image_width: 640.0,
            image_height: 480.0,
            class_name: "object".to_string(),
        }
    }
}

// Validate that a numeric option is strictly positive
pub fn validate_positive(s: &str) -> Result<u32, String> {
    match u32::from_str(s) {
        Ok(val) if val > 0 => Ok(val),
        _ => Err("value must be a positive integer".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_positive() {
        assert_eq!(validate_positive("10"), Ok(10));
        assert!(validate_positive("0").is_err());
        assert!(validate_positive("-3").is_err());
        assert!(validate_positive("abc").is_err());
    }

    #[test]
    fn train_args_defaults() {
        let args = TrainArgs::parse_from(["train", "--data", "data.yaml", "--output", "out"]);
        assert_eq!(args.epochs, 10);
        assert_eq!(args.imgsz, 640);
        assert_eq!(args.model, "yolov8n.pt");
        assert_eq!(args.yolo_bin, "yolo");
    }

    #[test]
    fn register_args_use_underscored_flags() {
        let args = RegisterArgs::parse_from([
            "register",
            "--model_name",
            "detector",
            "--model_path",
            "runs/weights",
            "--model_info_output_path",
            "info",
        ]);
        assert_eq!(args.model_name, "detector");
        assert_eq!(args.model_path, PathBuf::from("runs/weights"));
    }

    #[test]
    fn process_args_require_all_flags() {
        let parsed = ProcessArgs::try_parse_from(["process-data", "--input-data", "in"]);
        assert!(parsed.is_err());
    }
}
