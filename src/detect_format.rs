use clap::Parser;

use yolo_dataprep::{detect_data_format, DetectArgs};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = DetectArgs::parse();

    // Failures are reported in the written artifacts; the exit code stays 0
    detect_data_format(&args.input_data, &args.format_info, &args.format_report);
}
