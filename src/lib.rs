//! Object-detection dataset preparation
//!
//! This library detects whether a dataset folder holds COCO or YOLO
//! annotations, normalizes it into a YOLO layout, and drives the training and
//! model registration steps that follow.

pub mod coco;
pub mod config;
pub mod conversion;
pub mod detection;
pub mod error;
pub mod processor;
pub mod registry;
pub mod training;
pub mod types;
pub mod utils;
pub mod workspace;

// Re-export commonly used types and functions
pub use config::{ConversionDefaults, DetectArgs, ProcessArgs, RegisterArgs, TrainArgs};
pub use detection::detect_data_format;
pub use error::{Error, Result};
pub use processor::process_data;
pub use types::{
    DetectedFormat, DiagnosticReport, FormatDecision, Outcome, ProcessingReport, ProcessingType,
};
