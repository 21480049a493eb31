use clap::Parser;
use log::warn;

use yolo_dataprep::{process_data, ConversionDefaults, ProcessArgs};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = ProcessArgs::parse();

    let report = process_data(
        &args.input_data,
        &args.detected_format,
        &args.output_data,
        &args.processing_report,
        &ConversionDefaults::default(),
    );
    if !report.success {
        warn!("Processing finished without usable output; see the processing report");
    }
}
