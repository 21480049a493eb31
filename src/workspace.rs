//! Azure ML workspace identity for the training and registration steps
//!
//! Inside an Azure ML job the workspace coordinates are injected as
//! environment variables. Credentials come from the Azure CLI: an existing
//! CLI session first, then the job's managed identity.

use log::{info, warn};
use serde::Deserialize;
use std::fmt;
use std::process::Command;

use crate::error::{Error, Result};
use crate::utils::run_command;

pub const SUBSCRIPTION_VAR: &str = "AZUREML_ARM_SUBSCRIPTION";
pub const RESOURCE_GROUP_VAR: &str = "AZUREML_ARM_RESOURCEGROUP";
pub const WORKSPACE_NAME_VAR: &str = "AZUREML_ARM_WORKSPACE_NAME";

const MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    pub subscription_id: String,
    pub resource_group: String,
    pub workspace_name: String,
}

impl WorkspaceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup; empty values count as missing
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        match (
            get(SUBSCRIPTION_VAR),
            get(RESOURCE_GROUP_VAR),
            get(WORKSPACE_NAME_VAR),
        ) {
            (Some(subscription_id), Some(resource_group), Some(workspace_name)) => Ok(Self {
                subscription_id,
                resource_group,
                workspace_name,
            }),
            _ => Err(Error::Config(format!(
                "one or more Azure ML workspace environment variables are missing: {}, {}, {}",
                SUBSCRIPTION_VAR, RESOURCE_GROUP_VAR, WORKSPACE_NAME_VAR
            ))),
        }
    }

    /// Arguments selecting this workspace on an `az ml` command line
    pub fn cli_args(&self) -> Vec<String> {
        vec![
            "--subscription".to_string(),
            self.subscription_id.clone(),
            "--resource-group".to_string(),
            self.resource_group.clone(),
            "--workspace-name".to_string(),
            self.workspace_name.clone(),
        ]
    }
}

/// Proof that the Azure CLI can act on the workspace.
///
/// The token itself stays with the CLI; later `az` calls reuse its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Name of the strategy that produced the session
    pub source: String,
    pub expires_on: Option<String>,
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expires_on {
            Some(expires_on) => write!(f, "{} (expires {})", self.source, expires_on),
            None => f.write_str(&self.source),
        }
    }
}

/// A way of obtaining a management-scope access token
pub trait CredentialSource {
    fn name(&self) -> &str;
    fn acquire(&self) -> Result<Credential>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessToken {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
}

/// Check the JSON printed by `az account get-access-token` for a usable token
pub fn parse_access_token(program: &str, source: &str, stdout: &str) -> Result<Credential> {
    let malformed = |message: String| Error::CommandOutput {
        program: program.to_string(),
        message,
    };
    let token: AccessToken = serde_json::from_str(stdout).map_err(|e| malformed(e.to_string()))?;
    if token.access_token.trim().is_empty() {
        return Err(malformed("empty access token".to_string()));
    }
    Ok(Credential {
        source: source.to_string(),
        expires_on: token.expires_on,
    })
}

fn fetch_token(program: &str, source: &str) -> Result<Credential> {
    let stdout = run_command(Command::new(program).args([
        "account",
        "get-access-token",
        "--resource",
        MANAGEMENT_RESOURCE,
        "--output",
        "json",
    ]))?;
    parse_access_token(program, source, &stdout)
}

/// Token from whatever session the Azure CLI already holds
pub struct AzureCliCredential {
    program: String,
}

impl AzureCliCredential {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl CredentialSource for AzureCliCredential {
    fn name(&self) -> &str {
        "azure_cli"
    }

    fn acquire(&self) -> Result<Credential> {
        fetch_token(&self.program, self.name())
    }
}

/// Log the Azure CLI in with the compute's managed identity, then fetch a token
pub struct ManagedIdentityCredential {
    program: String,
}

impl ManagedIdentityCredential {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl CredentialSource for ManagedIdentityCredential {
    fn name(&self) -> &str {
        "managed_identity"
    }

    fn acquire(&self) -> Result<Credential> {
        run_command(Command::new(&self.program).args(["login", "--identity", "--output", "none"]))?;
        fetch_token(&self.program, self.name())
    }
}

/// Try `primary`, then `fallback`. Only the fallback's error is returned.
pub fn resolve_credential(
    primary: &dyn CredentialSource,
    fallback: &dyn CredentialSource,
) -> Result<Credential> {
    match primary.acquire() {
        Ok(credential) => {
            info!("Acquired token using {}", credential);
            Ok(credential)
        }
        Err(e) => {
            warn!(
                "{} failed: {}; attempting {}",
                primary.name(),
                e,
                fallback.name()
            );
            let credential = fallback.acquire()?;
            info!("Acquired token using {}", credential);
            Ok(credential)
        }
    }
}

/// A resolved workspace with a working credential
#[derive(Debug, Clone)]
pub struct Workspace {
    pub config: WorkspaceConfig,
    pub credential: Credential,
}

impl Workspace {
    /// Resolve the workspace of the current job through the Azure CLI at `program`.
    ///
    /// Missing environment variables fail before any credential is attempted.
    pub fn connect(program: &str) -> Result<Self> {
        let config = WorkspaceConfig::from_env()?;
        let credential = resolve_credential(
            &AzureCliCredential::new(program),
            &ManagedIdentityCredential::new(program),
        )?;
        Ok(Self { config, credential })
    }
}
