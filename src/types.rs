use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// Image formats recognized by both the detector and the converter
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "webp"];

// File names that mark a YOLO class list
pub const CLASS_LIST_NAMES: &[&str] = &["classes.txt", "class.names", "obj.names"];

// Upper bound on `files_analyzed` entries in the diagnostic report
pub const MAX_REPORTED_FILES: usize = 20;

/// RFC 3339 timestamp used in every report
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Annotation format declared by the detector.
///
/// Serialized as a plain lowercase string. Strings other than the four
/// known labels survive a round trip through `Other`, so the processor can
/// echo whatever the decision file contained.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DetectedFormat {
    Coco,
    Yolo,
    #[default]
    Unknown,
    Error,
    Other(String),
}

impl DetectedFormat {
    pub fn as_str(&self) -> &str {
        match self {
            DetectedFormat::Coco => "coco",
            DetectedFormat::Yolo => "yolo",
            DetectedFormat::Unknown => "unknown",
            DetectedFormat::Error => "error",
            DetectedFormat::Other(label) => label,
        }
    }
}

impl From<String> for DetectedFormat {
    fn from(label: String) -> Self {
        match label.as_str() {
            "coco" => DetectedFormat::Coco,
            "yolo" => DetectedFormat::Yolo,
            "unknown" => DetectedFormat::Unknown,
            "error" => DetectedFormat::Error,
            _ => DetectedFormat::Other(label),
        }
    }
}

impl From<DetectedFormat> for String {
    fn from(format: DetectedFormat) -> Self {
        format.as_str().to_string()
    }
}

impl fmt::Display for DetectedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A report section that is either fully populated or an ad-hoc map
/// (`{}` or `{"error": ...}`) when the analysis never ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Section<T> {
    Filled(T),
    Unavailable(BTreeMap<String, Value>),
}

impl<T> Default for Section<T> {
    fn default() -> Self {
        Section::Unavailable(BTreeMap::new())
    }
}

impl<T> Section<T> {
    pub fn error(message: &str) -> Self {
        let mut map = BTreeMap::new();
        map.insert("error".to_string(), Value::String(message.to_string()));
        Section::Unavailable(map)
    }

    pub fn filled(&self) -> Option<&T> {
        match self {
            Section::Filled(inner) => Some(inner),
            Section::Unavailable(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatIndicators {
    pub coco_score: u32,
    pub yolo_score: u32,
    pub json_files_found: usize,
    pub txt_files_found: usize,
    pub image_files_found: usize,
    pub classes_file_found: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub total_json_files: usize,
    pub total_txt_files: usize,
    pub total_image_files: usize,
    pub yolo_annotation_files: usize,
    pub classes_file_path: Option<String>,
}

fn default_true() -> bool {
    true
}

/// The detector's verdict, read back by the processor.
///
/// Every field has a default so a partial decision file still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatDecision {
    #[serde(default)]
    pub detected_format: DetectedFormat,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub format_indicators: Section<FormatIndicators>,
    #[serde(default)]
    pub file_analysis: Section<FileAnalysis>,
    #[serde(default = "default_true")]
    pub conversion_needed: bool,
    #[serde(default)]
    pub skip_conversion: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for FormatDecision {
    fn default() -> Self {
        Self {
            detected_format: DetectedFormat::Unknown,
            confidence: 0.0,
            format_indicators: Section::default(),
            file_analysis: Section::default(),
            conversion_needed: true,
            skip_conversion: false,
            error: None,
        }
    }
}

/// Human-oriented trace of a detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub analysis_timestamp: String,
    pub input_path: String,
    pub files_analyzed: Vec<String>,
    pub detection_logic: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DiagnosticReport {
    pub fn new(input_path: &str) -> Self {
        Self {
            analysis_timestamp: timestamp(),
            input_path: input_path.to_string(),
            files_analyzed: Vec::new(),
            detection_logic: Vec::new(),
            error: None,
        }
    }

    /// Remember a file, silently dropping it once the list is full
    pub fn record_file(&mut self, path: impl Into<String>) {
        if self.files_analyzed.len() < MAX_REPORTED_FILES {
            self.files_analyzed.push(path.into());
        }
    }

    pub fn note(&mut self, line: impl Into<String>) {
        self.detection_logic.push(line.into());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingType {
    CocoToYoloConversion,
    YoloDirectCopy,
    UnknownFormat,
    None,
}

/// Result of a single unit of work (one file, one image).
///
/// `Skipped` lands in the report's warnings, `Failed` in its errors; neither
/// stops the stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub processing_type: ProcessingType,
    pub success: bool,
    pub detected_format: DetectedFormat,
    pub files_processed: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations_converted: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images_copied: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_copied: Option<usize>,
}

impl ProcessingReport {
    pub fn new(detected_format: DetectedFormat) -> Self {
        Self {
            processing_type: ProcessingType::None,
            success: false,
            detected_format,
            files_processed: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            timestamp: timestamp(),
            annotations_converted: None,
            images_copied: None,
            files_copied: None,
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.errors.push(message);
    }

    /// Fold a per-item outcome into the report, handing back the value on success
    pub fn absorb<T>(&mut self, outcome: Outcome<T>) -> Option<T> {
        match outcome {
            Outcome::Done(value) => Some(value),
            Outcome::Skipped(reason) => {
                self.warn(reason);
                None
            }
            Outcome::Failed(reason) => {
                self.fail(reason);
                None
            }
        }
    }
}

// Counters gathered during a COCO to YOLO conversion
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConversionStats {
    pub annotation_files: usize,
    pub label_files_written: usize,
    pub annotations_converted: usize,
    pub images_copied: usize,
}

impl ConversionStats {
    pub fn print_summary(&self) {
        info!("=== Conversion Summary ===");
        info!("Annotation files read: {}", self.annotation_files);
        info!("Label files written: {}", self.label_files_written);
        info!("Annotations converted: {}", self.annotations_converted);
        info!("Images copied: {}", self.images_copied);
    }
}
