use clap::Parser;
use log::{error, info};

use yolo_dataprep::training::{train_model, TrainingRequest, UltralyticsCli};
use yolo_dataprep::TrainArgs;

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = TrainArgs::parse();

    info!("===== YOLO training start =====");
    let trainer = UltralyticsCli::new(&args.yolo_bin);
    if let Err(e) = train_model(&trainer, &TrainingRequest::from(&args)) {
        error!("Training failed: {}", e);
        std::process::exit(1);
    }
}
