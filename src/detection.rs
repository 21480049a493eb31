//! Dataset format detection
//!
//! Detection runs in two phases. [`gather_evidence`] walks the input folder and
//! records what it finds; [`score`] and [`decide`] turn that evidence into a
//! verdict without touching the filesystem.

use log::{error, info, warn};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::coco::{classify_structure, CocoStructure};
use crate::error::Result;
use crate::types::{
    DetectedFormat, DiagnosticReport, FileAnalysis, FormatDecision, FormatIndicators, Section,
    CLASS_LIST_NAMES, IMAGE_EXTENSIONS,
};
use crate::utils::{find_files, list_entries, read_json, write_report};

const COMPLETE_COCO_POINTS: u32 = 3;
const PARTIAL_COCO_POINTS: u32 = 1;
const CLASS_LIST_POINTS: u32 = 2;
const STRONG_LABEL_POINTS: u32 = 3;
const WEAK_LABEL_POINTS: u32 = 1;

// Labelled images needed for the strong YOLO signal
const STRONG_LABEL_IMAGES: usize = 3;
// Only this many images are checked for sibling label files
const MAX_INSPECTED_IMAGES: usize = 10;
// Minimum score before a format is declared
const DECISION_THRESHOLD: u32 = 2;

const MAX_CONFIDENCE: f64 = 0.9;
const BASE_CONFIDENCE: f64 = 0.3;
const CONFIDENCE_PER_POINT: f64 = 0.15;

/// Everything the scanner observed about a dataset folder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evidence {
    pub complete_coco_files: usize,
    pub partial_coco_files: usize,
    pub classes_files: Vec<PathBuf>,
    /// Inspected images with at least one valid YOLO label line
    pub yolo_annotated_images: usize,
    pub json_files: usize,
    pub txt_files: usize,
    pub image_files: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scores {
    pub coco: u32,
    pub yolo: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub format: DetectedFormat,
    pub confidence: f64,
    pub conversion_needed: bool,
    pub skip_conversion: bool,
}

/// Tally indicator points for each candidate format
pub fn score(evidence: &Evidence) -> Scores {
    let coco = evidence.complete_coco_files as u32 * COMPLETE_COCO_POINTS
        + evidence.partial_coco_files as u32 * PARTIAL_COCO_POINTS;

    let mut yolo = evidence.classes_files.len() as u32 * CLASS_LIST_POINTS;
    if evidence.yolo_annotated_images >= STRONG_LABEL_IMAGES {
        yolo += STRONG_LABEL_POINTS;
    } else if evidence.yolo_annotated_images > 0 {
        yolo += WEAK_LABEL_POINTS;
    }

    Scores { coco, yolo }
}

pub fn confidence_for(points: u32) -> f64 {
    (BASE_CONFIDENCE + points as f64 * CONFIDENCE_PER_POINT).min(MAX_CONFIDENCE)
}

/// Pick a format from the scores. COCO is checked first and wins ties.
pub fn decide(scores: Scores) -> Verdict {
    if scores.coco >= scores.yolo && scores.coco >= DECISION_THRESHOLD {
        Verdict {
            format: DetectedFormat::Coco,
            confidence: confidence_for(scores.coco),
            conversion_needed: true,
            skip_conversion: false,
        }
    } else if scores.yolo >= DECISION_THRESHOLD {
        Verdict {
            format: DetectedFormat::Yolo,
            confidence: confidence_for(scores.yolo),
            conversion_needed: false,
            skip_conversion: true,
        }
    } else {
        Verdict {
            format: DetectedFormat::Unknown,
            confidence: 0.0,
            conversion_needed: true,
            skip_conversion: false,
        }
    }
}

/// A YOLO label line has at least five fields and normalized geometry in fields 2-5
pub fn is_yolo_label_line(line: &str) -> bool {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 {
        return false;
    }
    parts[1..5].iter().all(|part| {
        part.parse::<f64>()
            .is_ok_and(|coord| (0.0..=1.0).contains(&coord))
    })
}

pub fn count_yolo_lines(content: &str) -> usize {
    content.lines().filter(|line| is_yolo_label_line(line)).count()
}

fn is_class_list(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| CLASS_LIST_NAMES.contains(&name.to_lowercase().as_str()))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Scan `input` and collect format evidence, tracing each finding into `report`
pub fn gather_evidence(input: &Path, report: &mut DiagnosticReport) -> Result<Evidence> {
    let mut evidence = Evidence::default();

    info!("Checking for file structure indicators...");
    match list_entries(input) {
        Ok(entries) => {
            info!("Found {} files to analyze", entries.len());
            for entry in &entries {
                report.record_file(entry.display().to_string());
            }
        }
        Err(e) => warn!("Error listing files: {}", e),
    }

    let json_files = find_files(input, &["json"])?;
    evidence.json_files = json_files.len();
    for json_file in &json_files {
        let value: Value = match read_json(json_file) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not parse JSON file {}: {}", json_file.display(), e);
                continue;
            }
        };
        match classify_structure(&value) {
            CocoStructure::Complete => {
                evidence.complete_coco_files += 1;
                report.note(format!("Found COCO structure in {}", display_name(json_file)));
                report.record_file(json_file.display().to_string());
            }
            CocoStructure::Partial => {
                evidence.partial_coco_files += 1;
                report.note(format!(
                    "Found partial COCO structure in {}",
                    display_name(json_file)
                ));
            }
            CocoStructure::None => {}
        }
    }

    let text_files = find_files(input, &["txt", "names"])?;
    evidence.txt_files = text_files.len();
    for text_file in text_files.iter().filter(|path| is_class_list(path)) {
        report.note(format!("Found YOLO classes file: {}", display_name(text_file)));
        report.record_file(text_file.display().to_string());
        evidence.classes_files.push(text_file.clone());
    }

    let image_files = find_files(input, IMAGE_EXTENSIONS)?;
    evidence.image_files = image_files.len();
    for image_file in image_files.iter().take(MAX_INSPECTED_IMAGES) {
        let label_file = image_file.with_extension("txt");
        if !label_file.is_file() {
            continue;
        }
        match fs::read_to_string(&label_file) {
            Ok(content) if count_yolo_lines(&content) > 0 => evidence.yolo_annotated_images += 1,
            Ok(_) => {}
            Err(e) => warn!(
                "Could not read annotation file {}: {}",
                label_file.display(),
                e
            ),
        }
    }

    if evidence.yolo_annotated_images >= STRONG_LABEL_IMAGES {
        report.note(format!(
            "Found {} files with YOLO format annotations",
            evidence.yolo_annotated_images
        ));
    } else if evidence.yolo_annotated_images > 0 {
        report.note(format!(
            "Found {} files with possible YOLO annotations",
            evidence.yolo_annotated_images
        ));
    }

    Ok(evidence)
}

/// Build the decision record from gathered evidence
pub fn build_decision(evidence: &Evidence) -> FormatDecision {
    let scores = score(evidence);
    let verdict = decide(scores);
    // The last class list found is the one reported
    let classes_file = evidence.classes_files.last();

    FormatDecision {
        detected_format: verdict.format,
        confidence: verdict.confidence,
        format_indicators: Section::Filled(FormatIndicators {
            coco_score: scores.coco,
            yolo_score: scores.yolo,
            json_files_found: evidence.json_files,
            txt_files_found: evidence.txt_files,
            image_files_found: evidence.image_files,
            classes_file_found: classes_file.is_some(),
        }),
        file_analysis: Section::Filled(FileAnalysis {
            total_json_files: evidence.json_files,
            total_txt_files: evidence.txt_files,
            total_image_files: evidence.image_files,
            yolo_annotation_files: evidence.yolo_annotated_images,
            classes_file_path: classes_file.map(|path| path.display().to_string()),
        }),
        conversion_needed: verdict.conversion_needed,
        skip_conversion: verdict.skip_conversion,
        error: None,
    }
}

/// Analyze an existing input folder
pub fn analyze(input: &Path, report: &mut DiagnosticReport) -> Result<FormatDecision> {
    let evidence = gather_evidence(input, report)?;
    let decision = build_decision(&evidence);

    match decision.detected_format {
        DetectedFormat::Unknown => warn!("Could not reliably detect data format"),
        ref format => info!(
            "Detected {} format with confidence {:.2}",
            format.as_str().to_uppercase(),
            decision.confidence
        ),
    }
    if let Some(indicators) = decision.format_indicators.filled() {
        report.note(format!(
            "Decision: {} (coco_score={}, yolo_score={})",
            decision.detected_format, indicators.coco_score, indicators.yolo_score
        ));
    }
    Ok(decision)
}

/// Detect the format of `input` and write the decision and diagnostic report.
///
/// Both files are written whatever happens to the input; failures surface in
/// the artifacts, never as an error.
pub fn detect_data_format(input: &Path, format_info: &Path, format_report: &Path) -> FormatDecision {
    detect_with(input, format_info, format_report, analyze)
}

/// [`detect_data_format`] with the analysis of an existing folder supplied by the caller
pub fn detect_with<F>(input: &Path, format_info: &Path, format_report: &Path, analyzer: F) -> FormatDecision
where
    F: FnOnce(&Path, &mut DiagnosticReport) -> Result<FormatDecision>,
{
    info!("Starting data format detection...");
    info!("Input data path: {}", input.display());
    info!("Format info output: {}", format_info.display());
    info!("Format report output: {}", format_report.display());

    let mut report = DiagnosticReport::new(&input.display().to_string());

    let decision = if !input.exists() {
        error!("Input path does not exist: {}", input.display());
        report.note("Input path not found");
        report.error = Some("Input path does not exist".to_string());
        FormatDecision {
            format_indicators: Section::error("Input path not found"),
            ..FormatDecision::default()
        }
    } else {
        info!("Analyzing data format in: {}", input.display());
        match analyzer(input, &mut report) {
            Ok(decision) => decision,
            Err(e) => {
                error!("Error during format detection: {}", e);
                report.error = Some(e.to_string());
                FormatDecision {
                    detected_format: DetectedFormat::Error,
                    error: Some(e.to_string()),
                    ..FormatDecision::default()
                }
            }
        }
    };

    write_report(format_info, &decision, "format info");
    write_report(format_report, &report, "format report");

    info!(
        "Format detection complete: {} (confidence: {:.2})",
        decision.detected_format, decision.confidence
    );
    decision
}
