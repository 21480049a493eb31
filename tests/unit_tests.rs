use serde_json::{json, Value};
use std::fs;
use std::path::Path;

use yolo_dataprep::{
    detect_data_format, process_data, ConversionDefaults, DetectedFormat, ProcessingType,
};

fn read_value(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn coco_fixture(dir: &Path) {
    let doc = json!({
        "images": [
            {"id": 1, "file_name": "img1.jpg", "width": 100, "height": 200},
            {"id": 2, "file_name": "img2.jpg"}
        ],
        "annotations": [
            {"id": 1, "image_id": 1, "category_id": 1, "bbox": [10, 20, 30, 40]},
            {"id": 2, "image_id": 2, "category_id": 0, "bbox": [0, 0, 320, 240]}
        ],
        "categories": [
            {"id": 1, "name": "cat"},
            {"id": 2, "name": "dog"}
        ]
    });
    write(&dir.join("annotations.json"), &doc.to_string());
    write(&dir.join("img1.jpg"), "jpeg-bytes");
    write(&dir.join("nested/img2.jpg"), "jpeg-bytes");
}

fn yolo_fixture(dir: &Path) {
    write(&dir.join("classes.txt"), "cat\ndog\n");
    for i in 0..3 {
        write(&dir.join(format!("images/img{}.jpg", i)), "jpeg-bytes");
        write(
            &dir.join(format!("images/img{}.txt", i)),
            "0 0.5 0.5 0.25 0.25\n1 0.1 0.2 0.3 0.4\n",
        );
    }
}

#[test]
fn detector_writes_both_files_for_missing_input() {
    let temp = tempfile::tempdir().unwrap();
    let info = temp.path().join("out/format_info.json");
    let report = temp.path().join("out/reports/format_report.json");

    let decision = detect_data_format(&temp.path().join("nope"), &info, &report);
    assert_eq!(decision.detected_format, DetectedFormat::Unknown);

    let info_json = read_value(&info);
    assert_eq!(info_json["detected_format"], "unknown");
    assert_eq!(info_json["confidence"], 0.0);
    assert_eq!(info_json["conversion_needed"], true);
    assert_eq!(info_json["skip_conversion"], false);
    assert_eq!(info_json["format_indicators"]["error"], "Input path not found");

    let report_json = read_value(&report);
    assert_eq!(report_json["error"], "Input path does not exist");
    assert_eq!(report_json["detection_logic"][0], "Input path not found");
}

#[test]
fn detector_recognizes_coco() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("input");
    coco_fixture(&input);
    write(&input.join("broken.json"), "{ nope");

    let info = temp.path().join("format_info.json");
    let report = temp.path().join("format_report.json");
    let decision = detect_data_format(&input, &info, &report);

    assert_eq!(decision.detected_format, DetectedFormat::Coco);
    assert!(decision.confidence > 0.0);
    assert!(decision.conversion_needed);

    let info_json = read_value(&info);
    assert_eq!(info_json["detected_format"], "coco");
    assert_eq!(info_json["format_indicators"]["coco_score"], 3);
    assert_eq!(info_json["format_indicators"]["json_files_found"], 2);

    let report_json = read_value(&report);
    let logic = report_json["detection_logic"].as_array().unwrap();
    assert!(logic
        .iter()
        .any(|line| line == "Found COCO structure in annotations.json"));
    assert!(report_json["files_analyzed"].as_array().unwrap().len() <= 20);
}

#[test]
fn detector_recognizes_yolo() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("input");
    yolo_fixture(&input);

    let info = temp.path().join("format_info.json");
    let report = temp.path().join("format_report.json");
    let decision = detect_data_format(&input, &info, &report);

    assert_eq!(decision.detected_format, DetectedFormat::Yolo);
    assert!(decision.skip_conversion);
    assert!(!decision.conversion_needed);

    let info_json = read_value(&info);
    assert_eq!(info_json["format_indicators"]["yolo_score"], 5);
    assert_eq!(info_json["format_indicators"]["classes_file_found"], true);
    assert_eq!(info_json["file_analysis"]["yolo_annotation_files"], 3);
}

#[test]
fn detector_reports_unknown_for_empty_folder() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("empty");
    fs::create_dir_all(&input).unwrap();

    let decision = detect_data_format(
        &input,
        &temp.path().join("info.json"),
        &temp.path().join("report.json"),
    );
    assert_eq!(decision.detected_format, DetectedFormat::Unknown);
    assert_eq!(decision.confidence, 0.0);
    assert!(decision.conversion_needed);
    assert!(temp.path().join("info.json").is_file());
    assert!(temp.path().join("report.json").is_file());
}

#[test]
fn coco_dataset_is_converted() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("input");
    coco_fixture(&input);
    write(&input.join("broken.json"), "{ nope");

    let decision_file = temp.path().join("format_info.json");
    detect_data_format(&input, &decision_file, &temp.path().join("format_report.json"));

    let output = temp.path().join("output");
    let report_path = temp.path().join("processing_report.json");
    let report = process_data(
        &input,
        &decision_file,
        &output,
        &report_path,
        &ConversionDefaults::default(),
    );

    assert_eq!(report.processing_type, ProcessingType::CocoToYoloConversion);
    assert!(report.success);
    assert_eq!(report.files_processed, 2);
    assert_eq!(report.annotations_converted, Some(2));
    assert_eq!(report.images_copied, Some(2));
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("COCO processing error in broken.json"));

    assert_eq!(
        fs::read_to_string(output.join("labels/img1.txt")).unwrap(),
        "0 0.250000 0.200000 0.300000 0.200000"
    );
    // category 0 clamps to class 0; missing dimensions fall back to 640x480
    assert_eq!(
        fs::read_to_string(output.join("labels/img2.txt")).unwrap(),
        "0 0.250000 0.250000 0.500000 0.500000"
    );
    assert_eq!(fs::read_to_string(output.join("classes.txt")).unwrap(), "cat\ndog\n");
    assert!(output.join("images/img1.jpg").is_file());
    assert!(output.join("images/img2.jpg").is_file());
    assert!(output.join("data.yaml").is_file());

    let report_json = read_value(&report_path);
    assert_eq!(report_json["processing_type"], "coco_to_yolo_conversion");
    assert_eq!(report_json["detected_format"], "coco");
    assert_eq!(report_json["success"], true);
}

#[test]
fn coco_without_annotation_files_is_an_empty_success() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("input");
    write(&input.join("img.jpg"), "jpeg-bytes");
    let decision_file = temp.path().join("decision.json");
    write(&decision_file, r#"{"detected_format": "coco"}"#);

    let output = temp.path().join("output");
    let report = process_data(
        &input,
        &decision_file,
        &output,
        &temp.path().join("report.json"),
        &ConversionDefaults::default(),
    );
    assert!(report.success);
    assert_eq!(report.warnings, vec!["No JSON files found".to_string()]);
    assert!(output.join("images").is_dir());
    assert!(output.join("labels").is_dir());
}

#[test]
fn yolo_dataset_is_copied_and_stale_output_removed() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("input");
    yolo_fixture(&input);

    let decision_file = temp.path().join("format_info.json");
    detect_data_format(&input, &decision_file, &temp.path().join("format_report.json"));

    let output = temp.path().join("output");
    write(&output.join("stale.txt"), "left over");

    let report_path = temp.path().join("processing_report.json");
    for _ in 0..2 {
        let report = process_data(
            &input,
            &decision_file,
            &output,
            &report_path,
            &ConversionDefaults::default(),
        );
        assert_eq!(report.processing_type, ProcessingType::YoloDirectCopy);
        assert!(report.success);
        // classes.txt, images/, 3 images and 3 labels
        assert_eq!(report.files_processed, 8);
        assert_eq!(report.files_copied, Some(8));
        assert!(report.warnings.is_empty());
    }

    assert!(!output.join("stale.txt").exists());
    assert_eq!(
        fs::read_to_string(output.join("images/img0.txt")).unwrap(),
        "0 0.5 0.5 0.25 0.25\n1 0.1 0.2 0.3 0.4\n"
    );
}

#[test]
fn unsupported_format_creates_empty_output() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("input");
    fs::create_dir_all(&input).unwrap();
    let decision_file = temp.path().join("decision.json");
    write(&decision_file, r#"{"detected_format": "pascal_voc", "confidence": 0.4}"#);

    let output = temp.path().join("output");
    let report_path = temp.path().join("report.json");
    let report = process_data(
        &input,
        &decision_file,
        &output,
        &report_path,
        &ConversionDefaults::default(),
    );

    assert_eq!(report.processing_type, ProcessingType::UnknownFormat);
    assert!(report.success);
    assert_eq!(report.warnings, vec!["Unsupported format: pascal_voc".to_string()]);
    assert!(output.is_dir());
    assert_eq!(read_value(&report_path)["detected_format"], "pascal_voc");
}

#[test]
fn missing_input_is_reported_not_fatal() {
    let temp = tempfile::tempdir().unwrap();
    let output = temp.path().join("output");
    let report_path = temp.path().join("reports/processing_report.json");

    let report = process_data(
        &temp.path().join("missing"),
        &temp.path().join("no_decision.json"),
        &output,
        &report_path,
        &ConversionDefaults::default(),
    );

    assert!(!report.success);
    assert_eq!(report.processing_type, ProcessingType::None);
    assert_eq!(report.errors, vec!["Input path not found".to_string()]);
    assert!(output.is_dir());

    let report_json = read_value(&report_path);
    assert_eq!(report_json["processing_type"], "none");
    assert_eq!(report_json["detected_format"], "unknown");
}

fn run_coco(input: &Path, output: &Path, report_path: &Path) -> yolo_dataprep::ProcessingReport {
    let decision_file = report_path.with_file_name("decision.json");
    write(&decision_file, r#"{"detected_format": "coco"}"#);
    process_data(
        input,
        &decision_file,
        output,
        report_path,
        &ConversionDefaults::default(),
    )
}

#[test]
fn label_names_follow_image_names_verbatim() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("input");
    let doc = json!({
        "images": [{"id": 1, "file_name": "cam:01.jpg", "width": 100, "height": 100}],
        "annotations": [{"image_id": 1, "category_id": 1, "bbox": [0, 0, 10, 10]}],
        "categories": [{"id": 1, "name": "car"}]
    });
    write(&input.join("annotations.json"), &doc.to_string());
    write(&input.join("cam:01.jpg"), "jpeg-bytes");

    let output = temp.path().join("output");
    let report = run_coco(&input, &output, &temp.path().join("report.json"));

    assert!(report.errors.is_empty());
    assert!(output.join("images/cam:01.jpg").is_file());
    assert_eq!(
        fs::read_to_string(output.join("labels/cam:01.txt")).unwrap(),
        "0 0.050000 0.050000 0.100000 0.100000"
    );
}

#[test]
fn malformed_records_keep_the_rest_of_the_file() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("input");
    let doc = json!({
        "images": [
            {"id": "img_a", "file_name": "a.jpg", "width": 100, "height": 100},
            {"id": 2, "file_name": "b.jpg", "width": 100, "height": 100}
        ],
        "annotations": [
            {"image_id": "img_a", "category_id": 1, "bbox": [0, 0, 50, 50]},
            {"image_id": 2, "bbox": [1, 2, 3]}
        ],
        "categories": [{"id": 1, "name": "cat"}]
    });
    write(&input.join("ann.json"), &doc.to_string());

    let output = temp.path().join("output");
    let report = run_coco(&input, &output, &temp.path().join("report.json"));

    assert!(report.success);
    assert!(report.errors.is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("Skipping annotation #1"));
    assert!(report.warnings[0].ends_with("in ann.json"));
    assert_eq!(fs::read_to_string(output.join("classes.txt")).unwrap(), "cat\n");
    assert_eq!(
        fs::read_to_string(output.join("labels/a.txt")).unwrap(),
        "0 0.250000 0.250000 0.500000 0.500000"
    );
}

#[test]
fn later_annotation_files_override_category_names() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("input");
    let first = json!({
        "images": [],
        "categories": [{"id": 1, "name": "cat"}, {"id": 2, "name": "dog"}]
    });
    let second = json!({
        "images": [],
        "categories": [{"id": 1, "name": "feline"}]
    });
    write(&input.join("a_train.json"), &first.to_string());
    write(&input.join("b_val.json"), &second.to_string());

    let output = temp.path().join("output");
    let report = run_coco(&input, &output, &temp.path().join("report.json"));

    assert!(report.success);
    assert_eq!(
        fs::read_to_string(output.join("classes.txt")).unwrap(),
        "feline\ndog\n"
    );
}

#[test]
fn nested_json_is_not_an_annotation_source() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("input");
    coco_fixture(&input);
    let manifest = json!({
        "images": [{"id": 1, "file_name": "img1.jpg"}],
        "categories": [{"id": 1, "name": "manifest"}]
    });
    write(&input.join("meta/manifest.json"), &manifest.to_string());

    let output = temp.path().join("output");
    let report = run_coco(&input, &output, &temp.path().join("report.json"));

    assert!(report.success);
    assert_eq!(report.files_processed, 2);
    assert_eq!(fs::read_to_string(output.join("classes.txt")).unwrap(), "cat\ndog\n");
}

#[test]
fn image_copy_failure_does_not_stop_conversion() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("input");
    coco_fixture(&input);

    // A directory squatting on the target name makes that one copy fail
    let output = temp.path().join("output");
    fs::create_dir_all(output.join("images/img1.jpg")).unwrap();

    let report = run_coco(&input, &output, &temp.path().join("report.json"));

    assert!(report.success);
    assert!(report.errors.is_empty());
    assert_eq!(report.images_copied, Some(1));
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("Error copying image"));
    assert!(output.join("images/img2.jpg").is_file());
    assert!(output.join("labels/img1.txt").is_file());
}
