use clap::Parser;
use log::error;

use yolo_dataprep::registry::{register_model, AzureMlRegistry, ModelSpec};
use yolo_dataprep::workspace::Workspace;
use yolo_dataprep::RegisterArgs;

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = RegisterArgs::parse();

    let workspace = match Workspace::connect(&args.az_bin) {
        Ok(workspace) => workspace,
        Err(e) => {
            error!("Failed to resolve the Azure ML workspace: {}", e);
            std::process::exit(1);
        }
    };

    let registry = AzureMlRegistry::new(&args.az_bin, workspace);
    let spec = ModelSpec {
        name: args.model_name.clone(),
        path: args.model_path.clone(),
    };
    if let Err(e) = register_model(&registry, &spec, &args.model_info_output_path) {
        error!("Failed to register model: {}", e);
        std::process::exit(1);
    }
}
