//! Facts assembly for one source file.
//!
//! [`assemble_facts`] gathers everything asynchronously: the three compiler
//! calls are issued together over one client, then the file is hashed and
//! stamped. [`build_facts`] is the pure normalization over those inputs.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{FactsError, Result};
use crate::facts::arm::Template;
use crate::facts::capabilities::{classify, resource_types};
use crate::facts::model::{ComponentIdSource, Facts, Meta, Scopes, Source, SCHEMA_VERSION};
use crate::facts::modules::resolve_modules;
use crate::facts::parameters::{build_outputs, build_parameters};
use crate::facts::scope::scope_from_schema;
use crate::rpc::client::CompilerClient;
use crate::rpc::protocol::{CompileResult, DeploymentGraph, Metadata};
use crate::utils::fs::{file_mtime_iso, relative_path, sha256_file, source_stem, to_posix_path};

/// `<name>@<version>` of this tool.
pub const GENERATOR: &str = concat!(env!("CARGO_PKG_NAME"), "@", env!("CARGO_PKG_VERSION"));

/// Settings shared by every file of a run.
#[derive(Debug, Clone)]
pub struct FactsContext {
    /// Root the source paths are made relative to.
    pub root_dir: PathBuf,
    pub component_id_from: ComponentIdSource,
    /// Fixed `meta.generatedAt`; the file's mtime is used when unset.
    pub generated_at: Option<String>,
    pub generator: String,
    pub compiler_version: String,
}

impl FactsContext {
    pub fn new(root_dir: impl Into<PathBuf>, compiler_version: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            component_id_from: ComponentIdSource::default(),
            generated_at: None,
            generator: GENERATOR.to_string(),
            compiler_version: compiler_version.into(),
        }
    }
}

/// Everything [`build_facts`] needs about one file.
#[derive(Debug, Clone)]
pub struct FactsInputs {
    pub file: PathBuf,
    pub compile: CompileResult,
    pub metadata: Metadata,
    pub graph: DeploymentGraph,
    /// Lowercase hex SHA-256 of the source.
    pub hash: String,
    pub generated_at: String,
}

/// Produce the facts record for `file`.
pub async fn assemble_facts<C>(client: &C, file: &Path, context: &FactsContext) -> Result<Facts>
where
    C: CompilerClient + ?Sized,
{
    debug!(file = %file.display(), "Requesting compiler output");
    let (compile, metadata, graph) = tokio::try_join!(
        client.compile(file),
        client.get_metadata(file),
        client.get_deployment_graph(file),
    )?;

    ensure_compiled(file, &compile)?;

    let hash = sha256_file(file).await?;
    let generated_at = match &context.generated_at {
        Some(stamp) => stamp.clone(),
        None => file_mtime_iso(file).await?,
    };

    build_facts(
        FactsInputs {
            file: file.to_path_buf(),
            compile,
            metadata,
            graph,
            hash,
            generated_at,
        },
        context,
    )
}

fn ensure_compiled(file: &Path, compile: &CompileResult) -> Result<()> {
    let has_contents = compile.contents.as_deref().map_or(false, |c| !c.is_empty());
    if compile.success && has_contents {
        return Ok(());
    }
    Err(FactsError::compilation_failed(
        file,
        compile
            .diagnostics
            .iter()
            .map(|d| (d.code.as_str(), d.message.as_str())),
    ))
}

/// Normalize gathered compiler output into a facts record.
pub fn build_facts(inputs: FactsInputs, context: &FactsContext) -> Result<Facts> {
    let FactsInputs {
        file,
        compile,
        metadata,
        graph,
        hash,
        generated_at,
    } = inputs;

    ensure_compiled(&file, &compile)?;
    let contents = compile.contents.as_deref().unwrap_or_default();
    let template = Template::parse(&file, contents)?;

    let scope = scope_from_schema(template.schema_url());
    let types = resource_types(&graph);
    let modules = resolve_modules(&template, &graph);

    let notes: Vec<String> = modules.omission_note().into_iter().collect();
    if !notes.is_empty() {
        debug!(file = %file.display(), omitted = ?modules.omitted, "Modules without resolvable path");
    }

    Ok(Facts {
        schema_version: SCHEMA_VERSION.to_string(),
        component_id: component_id(context.component_id_from, &file, &types),
        source: Source {
            path: to_posix_path(&relative_path(&context.root_dir, &file)),
            hash,
            compiler_version: context.compiler_version.clone(),
        },
        scopes: Scopes::only(scope),
        parameters: build_parameters(&template, &metadata),
        outputs: build_outputs(&template, &metadata),
        modules: (!modules.modules.is_empty()).then_some(modules.modules),
        capabilities: classify(&types),
        meta: Meta {
            generated_at,
            generator: context.generator.clone(),
            notes: (!notes.is_empty()).then_some(notes),
        },
    })
}

/// Lowercased last segment of the first resource type, or the file stem.
pub fn component_id(source: ComponentIdSource, file: &Path, resource_types: &[String]) -> String {
    match (source, resource_types.first()) {
        (ComponentIdSource::Resource, Some(first)) => first
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or(first.as_str())
            .to_lowercase(),
        _ => source_stem(file),
    }
}
