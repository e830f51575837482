use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::{
    canonical::{to_canonical_string, to_canonical_value},
    cli::commands::GenerateCommand,
    config::Settings,
    error::FactsError,
    facts::{assemble_facts, ComponentIdSource, FactsContext},
    rpc::{CompilerClient, CompilerCommand, RpcSession},
    scan::scan_bicep_files,
    schema::FactsSchema,
    utils::fs::{absolutize, facts_output_path, write_file_utf8},
};

const STANDALONE_INSTALL_URL: &str =
    "https://learn.microsoft.com/azure/azure-resource-manager/bicep/install";

/// Per-run options for [`generate_all`].
#[derive(Debug, Clone)]
pub struct GenerateRun {
    /// Absolute directory the sources were discovered under.
    pub root_dir: PathBuf,
    /// Absolute output directory; facts go next to sources when unset.
    pub out_dir: Option<PathBuf>,
    pub component_id_from: ComponentIdSource,
    pub generated_at: Option<String>,
    pub continue_on_error: bool,
}

/// Outcome of a [`generate_all`] run.
#[derive(Debug, Default)]
pub struct GenerateSummary {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

pub async fn handle_generate(settings: &Settings, cmd: &GenerateCommand) -> Result<GenerateSummary> {
    let command = settings.compiler_command();
    ensure_compiler_available(&command).await?;

    let root_dir = absolutize(&cmd.input).context("Failed to resolve input directory")?;
    let out_dir = cmd
        .output
        .as_deref()
        .map(absolutize)
        .transpose()
        .context("Failed to resolve output directory")?;

    let excluded: Vec<PathBuf> = out_dir.iter().cloned().collect();
    let files = scan_bicep_files(&root_dir, &excluded)
        .with_context(|| format!("Failed to scan {}", root_dir.display()))?;
    if files.is_empty() {
        println!("No .bicep files found.");
        return Ok(GenerateSummary::default());
    }

    let schema = load_schema(settings)?;
    let run = GenerateRun {
        root_dir,
        out_dir,
        component_id_from: settings.generate.component_id_from,
        generated_at: cmd.generated_at.clone(),
        continue_on_error: settings.generate.continue_on_error,
    };

    let session = RpcSession::new(settings.session_options());
    let result = generate_all(&session, &files, &run, &schema).await;
    session.stop().await;

    Ok(result?)
}

/// Generate, validate and write facts for every file in order.
///
/// The compiler version is queried once for the whole run. With
/// `continue_on_error` set, file-scoped failures are logged and the run ends
/// with [`FactsError::FilesFailed`]; any other failure stops the run at once.
pub async fn generate_all<C>(
    client: &C,
    files: &[PathBuf],
    run: &GenerateRun,
    schema: &FactsSchema,
) -> crate::Result<GenerateSummary>
where
    C: CompilerClient + ?Sized,
{
    let compiler_version = client.version().await?;
    info!(version = %compiler_version, files = files.len(), "Generating facts");

    let mut context = FactsContext::new(&run.root_dir, compiler_version);
    context.component_id_from = run.component_id_from;
    context.generated_at = run.generated_at.clone();

    let mut summary = GenerateSummary::default();
    for file in files {
        match generate_file(client, file, run, &context, schema).await {
            Ok(output) => {
                println!("Wrote {}", output.display());
                summary.written.push(output);
            }
            Err(e) if run.continue_on_error && e.is_file_scoped() => {
                error!(file = %file.display(), error = %e, "Failed to generate facts");
                summary.failed.push((file.clone(), e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    if !summary.failed.is_empty() {
        return Err(FactsError::FilesFailed {
            failed: summary.failed.len(),
            total: files.len(),
        });
    }
    Ok(summary)
}

async fn generate_file<C>(
    client: &C,
    file: &Path,
    run: &GenerateRun,
    context: &FactsContext,
    schema: &FactsSchema,
) -> crate::Result<PathBuf>
where
    C: CompilerClient + ?Sized,
{
    let facts = assemble_facts(client, file, context).await?;
    let document = to_canonical_value(&facts)?;
    schema.validate(&document)?;

    let output = facts_output_path(file, &run.root_dir, run.out_dir.as_deref());
    write_file_utf8(&output, &to_canonical_string(&document)?).await?;
    info!(file = %file.display(), output = %output.display(), "Facts written");
    Ok(output)
}

pub async fn handle_compiler_version(settings: &Settings) -> Result<String> {
    let session = RpcSession::new(settings.session_options());
    let version = session.version().await;
    session.stop().await;

    let version = version.context("Failed to query compiler version")?;
    println!("{}", version);
    Ok(version)
}

async fn ensure_compiler_available(command: &CompilerCommand) -> Result<()> {
    match command.probe().await {
        Ok(banner) => {
            info!(compiler = %banner, "Found Bicep CLI");
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            error!("Install options:");
            error!("  - Azure CLI: az bicep install");
            error!("  - Standalone: {}", STANDALONE_INSTALL_URL);
            Err(e.into())
        }
    }
}

fn load_schema(settings: &Settings) -> Result<FactsSchema> {
    match &settings.generate.schema_path {
        Some(path) => {
            warn!(schema = %path.display(), "Validating against a custom facts contract");
            FactsSchema::from_path(path)
                .with_context(|| format!("Failed to load schema {}", path.display()))
        }
        None => FactsSchema::embedded().context("Failed to load bundled schema"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsOverrides;
    use std::collections::HashMap;

    fn load_settings(overrides: SettingsOverrides) -> Settings {
        Settings::load_with_env(None, &overrides, Some(HashMap::new())).unwrap()
    }

    #[tokio::test]
    async fn test_missing_compiler_fails_preflight() {
        let settings = load_settings(SettingsOverrides {
            compiler_path: Some(PathBuf::from("/nonexistent/bicep")),
            ..SettingsOverrides::default()
        });
        let err = ensure_compiler_available(&settings.compiler_command())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FactsError>(),
            Some(FactsError::SubprocessUnavailable { .. })
        ));
    }

    #[test]
    fn test_schema_override_must_exist() {
        let settings = load_settings(SettingsOverrides {
            schema_path: Some(PathBuf::from("/nonexistent/facts.schema.json")),
            ..SettingsOverrides::default()
        });
        assert!(load_schema(&settings).is_err());
        assert!(load_schema(&load_settings(SettingsOverrides::default())).is_ok());
    }
}
