use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};
use crate::utils::{ensure_directory, run_command};
use crate::workspace::Workspace;

const MODEL_TYPE: &str = "custom_model";
const MODEL_DESCRIPTION: &str = "Registered by yolo-dataprep";

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub name: String,
    /// Directory or single file holding the model artifacts
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredModel {
    pub name: String,
    pub version: String,
}

impl RegisteredModel {
    /// Registry reference in `name:version` form
    pub fn reference(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
}

pub trait ModelRegistry {
    fn register(&self, spec: &ModelSpec) -> Result<RegisteredModel>;
}

/// Registers models with `az ml model create` in a resolved workspace
pub struct AzureMlRegistry {
    program: String,
    workspace: Workspace,
}

impl AzureMlRegistry {
    pub fn new(program: &str, workspace: Workspace) -> Self {
        Self {
            program: program.to_string(),
            workspace,
        }
    }

    pub fn command_args(&self, spec: &ModelSpec) -> Vec<String> {
        let mut args = vec![
            "ml".to_string(),
            "model".to_string(),
            "create".to_string(),
            "--name".to_string(),
            spec.name.clone(),
            "--path".to_string(),
            spec.path.display().to_string(),
            "--type".to_string(),
            MODEL_TYPE.to_string(),
            "--description".to_string(),
            MODEL_DESCRIPTION.to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        args.extend(self.workspace.config.cli_args());
        args
    }
}

impl ModelRegistry for AzureMlRegistry {
    fn register(&self, spec: &ModelSpec) -> Result<RegisteredModel> {
        info!(
            "Registering {} in workspace {} with {} credentials",
            spec.name, self.workspace.config.workspace_name, self.workspace.credential.source
        );
        let stdout = run_command(Command::new(&self.program).args(self.command_args(spec)))?;
        parse_registration(&self.program, &stdout)
    }
}

/// Extract name and version from the registry's JSON response.
/// Versions may come back as strings or numbers.
pub fn parse_registration(program: &str, stdout: &str) -> Result<RegisteredModel> {
    let malformed = |message: String| Error::CommandOutput {
        program: program.to_string(),
        message,
    };
    let value: Value = serde_json::from_str(stdout).map_err(|e| malformed(e.to_string()))?;

    let name = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("response has no model name".to_string()))?;
    let version = match value.get("version") {
        Some(Value::String(version)) => version.clone(),
        Some(Value::Number(version)) => version.to_string(),
        _ => return Err(malformed("response has no model version".to_string())),
    };

    Ok(RegisteredModel {
        name: name.to_string(),
        version,
    })
}

/// Write `model_info.json` = `{"id": "name:version"}` into `dir`
pub fn write_model_info(dir: &Path, model: &RegisteredModel) -> Result<PathBuf> {
    ensure_directory(dir)?;
    let path = dir.join("model_info.json");
    let info = ModelInfo {
        id: model.reference(),
    };
    let mut writer = BufWriter::new(File::create(&path).map_err(|e| Error::io(&path, e))?);
    serde_json::to_writer(&mut writer, &info).map_err(|e| Error::json(&path, e))?;
    writer.flush().map_err(|e| Error::io(&path, e))?;
    Ok(path)
}

/// Register a model and record its reference for downstream steps
pub fn register_model(
    registry: &dyn ModelRegistry,
    spec: &ModelSpec,
    info_dir: &Path,
) -> Result<RegisteredModel> {
    info!(
        "Registering model '{}' from path '{}'",
        spec.name,
        spec.path.display()
    );
    let registered = registry.register(spec)?;
    info!(
        "Registered model: name={} version={}",
        registered.name, registered.version
    );

    let path = write_model_info(info_dir, &registered)?;
    info!("Wrote model info to {}", path.display());
    Ok(registered)
}
