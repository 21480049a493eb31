//! Unified processing stage: turns the detector's decision into a YOLO dataset

use log::{error, info, warn};
use std::path::Path;

use crate::config::ConversionDefaults;
use crate::conversion::convert_coco_to_yolo;
use crate::error::Result;
use crate::types::{DetectedFormat, FormatDecision, ProcessingReport, ProcessingType};
use crate::utils::{copy_tree, count_entries, ensure_directory, read_json, remove_path, write_report};

/// Load the detector's decision, falling back to `unknown` when it is missing or unreadable
pub fn load_decision(path: &Path) -> FormatDecision {
    if !path.exists() {
        warn!("Format detection file not found: {}", path.display());
        return FormatDecision::default();
    }
    match read_json::<FormatDecision>(path) {
        Ok(decision) => {
            info!(
                "Loaded format info: {} (confidence {:.2})",
                decision.detected_format, decision.confidence
            );
            decision
        }
        Err(e) => {
            error!("Error reading format detection file: {}", e);
            FormatDecision::default()
        }
    }
}

fn create_empty_output(output: &Path) {
    if let Err(e) = ensure_directory(output) {
        error!("Could not create output directory: {}", e);
    }
}

/// Record entry counts on both sides of a copy; differing counts are a warning
pub fn record_copy_counts(input_files: usize, output_files: usize, report: &mut ProcessingReport) {
    info!("   - Input files: {}", input_files);
    info!("   - Output files: {}", output_files);
    report.files_processed = input_files;
    report.files_copied = Some(output_files);
    if input_files != output_files {
        report.warn(format!(
            "File count mismatch: input={}, output={}",
            input_files, output_files
        ));
    }
}

fn replace_with_copy(input: &Path, output: &Path) -> Result<()> {
    if output.exists() {
        remove_path(output)?;
    }
    copy_tree(input, output)?;
    Ok(())
}

/// Copy an already-YOLO dataset verbatim, replacing any previous output.
///
/// The copy is verified by counting entries on both sides; a mismatch is only
/// a warning.
pub fn copy_yolo_data_directly(input: &Path, output: &Path, report: &mut ProcessingReport) -> bool {
    if let Err(e) = replace_with_copy(input, output) {
        report.fail(format!("Copy error: {}", e));
        create_empty_output(output);
        return false;
    }

    match (count_entries(input), count_entries(output)) {
        (Ok(input_files), Ok(output_files)) => {
            info!("Successfully copied YOLO data to {}", output.display());
            record_copy_counts(input_files, output_files, report);
        }
        (Err(e), _) | (_, Err(e)) => {
            report.warn(format!("Could not verify file counts: {}", e));
        }
    }
    true
}

/// Run the processing stage and write its report.
///
/// Always leaves an output directory behind and always attempts to write the
/// report; the returned report mirrors what was written.
pub fn process_data(
    input: &Path,
    decision_file: &Path,
    output: &Path,
    report_path: &Path,
    defaults: &ConversionDefaults,
) -> ProcessingReport {
    info!("Starting unified data processing...");
    info!("Input data: {}", input.display());
    info!("Detected format file: {}", decision_file.display());
    info!("Output data: {}", output.display());
    info!("Processing report: {}", report_path.display());

    let decision = load_decision(decision_file);
    let mut report = ProcessingReport::new(decision.detected_format.clone());

    if !input.exists() {
        report.fail("Input path not found");
        create_empty_output(output);
        write_report(report_path, &report, "processing report");
        return report;
    }

    match &decision.detected_format {
        DetectedFormat::Coco => {
            info!("Detected COCO format - performing conversion to YOLO");
            report.processing_type = ProcessingType::CocoToYoloConversion;
            report.success = convert_coco_to_yolo(input, output, &mut report, defaults);
        }
        DetectedFormat::Yolo => {
            info!("Detected YOLO format - copying data directly");
            report.processing_type = ProcessingType::YoloDirectCopy;
            report.success = copy_yolo_data_directly(input, output, &mut report);
        }
        other => {
            report.processing_type = ProcessingType::UnknownFormat;
            report.warn(format!("Unsupported format: {}", other));
            create_empty_output(output);
            // Nothing to convert is not a failure
            report.success = true;
        }
    }

    write_report(report_path, &report, "processing report");
    info!("Unified data processing completed");
    report
}
