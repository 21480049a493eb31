use log::{info, warn};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::coco::{Annotation, CocoDocument, RecordId};
use crate::config::ConversionDefaults;
use crate::error::{Error, Result};
use crate::types::{ConversionStats, Outcome, ProcessingReport, IMAGE_EXTENSIONS};
use crate::utils::{
    create_progress_bar, ensure_directory, find_files, find_top_level_files, label_file_name, read_json,
};

/// Output locations of a converted dataset
#[derive(Debug, Clone)]
pub struct YoloLayout {
    pub root: PathBuf,
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
}

impl YoloLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            images_dir: root.join("images"),
            labels_dir: root.join("labels"),
        }
    }

    /// Create the root, `images/` and `labels/` directories
    pub fn create(&self) -> Result<()> {
        ensure_directory(&self.root)?;
        ensure_directory(&self.images_dir)?;
        ensure_directory(&self.labels_dir)?;
        Ok(())
    }
}

/// Dimensions and file name of a COCO image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub file_name: String,
    pub width: f64,
    pub height: f64,
}

/// Label file contents produced for one image
#[derive(Debug, Clone, PartialEq)]
pub struct LabelFile {
    pub image_file_name: String,
    pub lines: Vec<String>,
}

impl LabelFile {
    pub fn contents(&self) -> String {
        self.lines.join("\n")
    }
}

/// Everything derived from one COCO document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentConversion {
    pub categories: Vec<(i64, String)>,
    pub labels: Vec<LabelFile>,
    pub annotations_converted: usize,
    pub image_errors: Vec<String>,
    /// Records that could not be decoded
    pub skipped_records: Vec<String>,
}

/// Convert a COCO `[x, y, w, h]` pixel box into YOLO normalized center form
pub fn coco_bbox_to_yolo(bbox: [f64; 4], image_width: f64, image_height: f64) -> (f64, f64, f64, f64) {
    let [x, y, w, h] = bbox;
    let x_center = (x + w / 2.0) / image_width;
    let y_center = (y + h / 2.0) / image_height;
    let width = w / image_width;
    let height = h / image_height;
    (x_center, y_center, width, height)
}

/// Map a COCO category id to a YOLO class id.
///
/// Assumes 1-based, dense category ids. Ids at or below zero collapse to class 0.
pub fn yolo_class_id(category_id: i64) -> i64 {
    if category_id > 0 {
        category_id - 1
    } else {
        0
    }
}

pub fn format_label_line(class_id: i64, geometry: (f64, f64, f64, f64)) -> String {
    let (x_center, y_center, width, height) = geometry;
    format!(
        "{} {:.6} {:.6} {:.6} {:.6}",
        class_id, x_center, y_center, width, height
    )
}

fn keep_decoded<T>(outcomes: impl Iterator<Item = Outcome<T>>, skipped: &mut Vec<String>) -> Vec<T> {
    let mut records = Vec::new();
    for outcome in outcomes {
        match outcome {
            Outcome::Done(record) => records.push(record),
            Outcome::Skipped(reason) | Outcome::Failed(reason) => skipped.push(reason),
        }
    }
    records
}

/// Convert the annotations of one parsed COCO document into label file contents.
///
/// Annotations referring to unknown images are ignored, as are annotations
/// missing a bbox or category id. Records that fail to decode are listed in
/// `skipped_records`. Images whose dimensions are not positive cannot be
/// normalized and are reported in `image_errors`.
pub fn convert_document(doc: &CocoDocument, defaults: &ConversionDefaults) -> DocumentConversion {
    let mut conversion = DocumentConversion::default();
    let mut skipped = Vec::new();

    conversion.categories = keep_decoded(doc.categories(), &mut skipped)
        .into_iter()
        .map(|cat| (cat.id, cat.name))
        .collect();

    let images: HashMap<RecordId, ImageRecord> = keep_decoded(doc.images(), &mut skipped)
        .into_iter()
        .map(|img| {
            (
                img.id,
                ImageRecord {
                    file_name: img.file_name,
                    width: img.width.unwrap_or(defaults.image_width),
                    height: img.height.unwrap_or(defaults.image_height),
                },
            )
        })
        .collect();

    // Group by image id, keeping the order in which images first appear
    let mut image_order = Vec::new();
    let mut by_image: HashMap<RecordId, Vec<Annotation>> = HashMap::new();
    for ann in keep_decoded(doc.annotations(), &mut skipped) {
        by_image
            .entry(ann.image_id.clone())
            .or_insert_with(|| {
                image_order.push(ann.image_id.clone());
                Vec::new()
            })
            .push(ann);
    }
    conversion.skipped_records = skipped;

    for image_id in image_order {
        let Some(image) = images.get(&image_id) else {
            continue;
        };
        if image.width <= 0.0 || image.height <= 0.0 {
            conversion.image_errors.push(format!(
                "Image {} has invalid dimensions {}x{}",
                image.file_name, image.width, image.height
            ));
            continue;
        }

        let mut lines = Vec::new();
        for ann in &by_image[&image_id] {
            let (Some(bbox), Some(category_id)) = (ann.bbox, ann.category_id) else {
                continue;
            };
            let geometry = coco_bbox_to_yolo(bbox, image.width, image.height);
            lines.push(format_label_line(yolo_class_id(category_id), geometry));
        }
        conversion.annotations_converted += lines.len();
        conversion.labels.push(LabelFile {
            image_file_name: image.file_name.clone(),
            lines,
        });
    }

    conversion
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn write_label_file(labels_dir: &Path, label: &LabelFile) -> Result<()> {
    let file_name = label_file_name(&label.image_file_name).ok_or_else(|| {
        Error::Invalid(format!("cannot derive a label name from {:?}", label.image_file_name))
    })?;
    let path = labels_dir.join(file_name);
    let mut writer = BufWriter::new(File::create(&path).map_err(|e| Error::io(&path, e))?);
    writer
        .write_all(label.contents().as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| Error::io(&path, e))
}

/// Read one annotation file, merge its categories and write its label files
fn convert_annotation_file(
    json_file: &Path,
    layout: &YoloLayout,
    categories: &mut BTreeMap<i64, String>,
    defaults: &ConversionDefaults,
) -> Outcome<DocumentConversion> {
    let name = display_name(json_file);
    let value: Value = match read_json(json_file) {
        Ok(value) => value,
        Err(e) => return Outcome::Failed(format!("COCO processing error in {}: {}", name, e)),
    };
    if !value.as_object().is_some_and(|object| object.contains_key("images")) {
        return Outcome::Skipped(format!("Skipping {}: no COCO images section", name));
    }
    let doc: CocoDocument = match serde_json::from_value(value) {
        Ok(doc) => doc,
        Err(e) => return Outcome::Failed(format!("COCO processing error in {}: {}", name, e)),
    };

    let mut conversion = convert_document(&doc, defaults);
    // Later files overwrite earlier categories that share an id
    categories.extend(conversion.categories.iter().cloned());
    for reason in conversion.skipped_records.iter_mut() {
        *reason = format!("{} in {}", reason, name);
    }

    let mut written = Vec::with_capacity(conversion.labels.len());
    for label in conversion.labels.drain(..) {
        match write_label_file(&layout.labels_dir, &label) {
            Ok(()) => written.push(label),
            Err(e) => {
                conversion.annotations_converted -= label.lines.len();
                conversion
                    .image_errors
                    .push(format!("COCO processing error in {}: {}", name, e));
            }
        }
    }
    conversion.labels = written;
    Outcome::Done(conversion)
}

/// Copy one image into the flat `images/` directory
fn copy_image(image: &Path, images_dir: &Path) -> Outcome<()> {
    let Some(file_name) = image.file_name() else {
        return Outcome::Skipped(format!("Skipping image without a file name: {}", image.display()));
    };
    match fs::copy(image, images_dir.join(file_name)) {
        Ok(_) => Outcome::Done(()),
        Err(e) => Outcome::Skipped(format!("Error copying image {}: {}", image.display(), e)),
    }
}

/// Write `classes.txt`: category names by ascending id, or the default class
pub fn write_classes_file(root: &Path, categories: &BTreeMap<i64, String>, default_class: &str) -> Result<()> {
    let path = root.join("classes.txt");
    let mut writer = BufWriter::new(File::create(&path).map_err(|e| Error::io(&path, e))?);
    let mut contents = String::new();
    if categories.is_empty() {
        contents.push_str(default_class);
        contents.push('\n');
    } else {
        for name in categories.values() {
            contents.push_str(name);
            contents.push('\n');
        }
    }
    writer
        .write_all(contents.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| Error::io(&path, e))
}

/// Create the data.yaml file for YOLO training
pub fn create_dataset_yaml(root: &Path, class_names: &[String]) -> Result<()> {
    let path = root.join("data.yaml");
    let absolute_path = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let mut yaml_content = format!(
        "path: {}\ntrain: images\nval: images\n\nnc: {}\nnames:\n",
        absolute_path.to_string_lossy(),
        class_names.len()
    );
    for (id, name) in class_names.iter().enumerate() {
        yaml_content.push_str(&format!("    {}: {}\n", id, name));
    }
    fs::write(&path, yaml_content).map_err(|e| Error::io(&path, e))
}

fn run_conversion(
    input: &Path,
    output: &Path,
    report: &mut ProcessingReport,
    defaults: &ConversionDefaults,
) -> Result<()> {
    let layout = YoloLayout::new(output);
    layout.create()?;

    // Annotation files sit at the top level; nested JSON belongs to other tools
    let json_files = find_top_level_files(input, &["json"])?;
    if json_files.is_empty() {
        report.warn("No JSON files found");
        return Ok(());
    }
    info!("Found {} JSON files to process", json_files.len());

    let mut stats = ConversionStats::default();
    let mut categories = BTreeMap::new();
    for json_file in &json_files {
        let outcome = convert_annotation_file(json_file, &layout, &mut categories, defaults);
        if let Some(conversion) = report.absorb(outcome) {
            stats.annotation_files += 1;
            stats.label_files_written += conversion.labels.len();
            stats.annotations_converted += conversion.annotations_converted;
            for message in conversion.skipped_records {
                report.warn(message);
            }
            for message in conversion.image_errors {
                report.fail(message);
            }
        }
    }
    report.files_processed = stats.label_files_written;

    // Never read back what a previous run wrote into an output nested under the input
    let images: Vec<PathBuf> = find_files(input, IMAGE_EXTENSIONS)?
        .into_iter()
        .filter(|path| !path.starts_with(output))
        .collect();
    let pb = create_progress_bar(images.len() as u64, "Images");
    for image in &images {
        if report.absorb(copy_image(image, &layout.images_dir)).is_some() {
            stats.images_copied += 1;
        }
        pb.inc(1);
    }
    pb.finish_with_message("Image copy complete");

    write_classes_file(output, &categories, &defaults.class_name)?;
    let class_names: Vec<String> = if categories.is_empty() {
        vec![defaults.class_name.clone()]
    } else {
        categories.values().cloned().collect()
    };
    if let Err(e) = create_dataset_yaml(output, &class_names) {
        report.warn(format!("Could not write data.yaml: {}", e));
    }

    report.annotations_converted = Some(stats.annotations_converted);
    report.images_copied = Some(stats.images_copied);

    info!("COCO to YOLO conversion completed!");
    stats.print_summary();
    Ok(())
}

/// Convert a COCO dataset in `input` into a YOLO layout in `output`.
///
/// Per-file problems are recorded in `report` and do not stop the run. On a
/// stage-level failure the output skeleton is still created so downstream
/// steps find the directories they expect, and `false` is returned.
pub fn convert_coco_to_yolo(
    input: &Path,
    output: &Path,
    report: &mut ProcessingReport,
    defaults: &ConversionDefaults,
) -> bool {
    match run_conversion(input, output, report, defaults) {
        Ok(()) => true,
        Err(e) => {
            report.fail(format!("Conversion error: {}", e));
            if let Err(e) = YoloLayout::new(output).create() {
                warn!("Could not create empty output layout: {}", e);
            }
            false
        }
    }
}
