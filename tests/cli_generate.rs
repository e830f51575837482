#![cfg(unix)]

mod common;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bicep_facts_core::{
    cli::{commands::Commands, handle_generate, Cli},
    config::{Settings, SettingsOverrides},
    FactsError,
};
use clap::Parser;
use common::{fake_compiler, Peer};
use serde_json::{json, Value};
use tempfile::TempDir;

const GENERATED_AT: &str = "2024-05-01T12:00:00.000Z";

fn settings(endpoint_file: &Path) -> Settings {
    let mut settings =
        Settings::load_with_env(None, &SettingsOverrides::default(), Some(HashMap::new())).unwrap();
    let command = fake_compiler(endpoint_file);
    settings.compiler.path = command.executable;
    settings.compiler.args = command.args;
    settings
}

fn generate_args(args: &[&str]) -> bicep_facts_core::cli::commands::GenerateCommand {
    let mut argv = vec!["bicep-facts", "generate"];
    argv.extend_from_slice(args);
    match Cli::try_parse_from(argv).unwrap().command {
        Commands::Generate(cmd) => cmd,
        other => panic!("unexpected command {other:?}"),
    }
}

fn compiler_reply(method: &str, params: &Value) -> Value {
    let path = params["path"].as_str().unwrap_or_default();
    match method {
        "bicep/version" => json!({"version": "0.30.23"}),
        "bicep/compile" if path.ends_with("broken.bicep") => json!({
            "success": false,
            "diagnostics": [{"code": "BCP001", "message": "bad syntax", "level": "Error"}]
        }),
        "bicep/compile" => json!({
            "success": true,
            "contents": json!({
                "$schema": "https://schema.management.azure.com/schemas/2019-04-01/deploymentTemplate.json#",
                "parameters": {"sku": {"type": "string", "defaultValue": "Standard_LRS"}},
                "resources": [{"type": "Microsoft.Storage/storageAccounts", "name": "st"}]
            })
            .to_string(),
            "diagnostics": []
        }),
        "bicep/getMetadata" => json!({
            "parameters": [{"name": "sku", "description": "Storage SKU"}],
            "outputs": []
        }),
        "bicep/getDeploymentGraph" => json!({
            "nodes": [{"name": "st", "type": "Microsoft.Storage/storageAccounts", "isExisting": false}],
            "edges": []
        }),
        other => panic!("unexpected method {other}"),
    }
}

fn write(root: &Path, relative: &str) -> PathBuf {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "param sku string = 'Standard_LRS'\n").unwrap();
    path
}

#[tokio::test]
async fn test_generate_end_to_end() {
    let dir = TempDir::new().unwrap();
    let endpoint_file = dir.path().join("endpoint");
    let src = dir.path().join("src");
    let out = dir.path().join("out");
    write(&src, "data/storage.bicep");
    write(&src, "node_modules/ignored.bicep");

    let settings = settings(&endpoint_file);
    let cmd = generate_args(&[
        "--in",
        src.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
        "--generated-at",
        GENERATED_AT,
    ]);

    let run = tokio::spawn(async move { handle_generate(&settings, &cmd).await });
    Peer::connect(&endpoint_file).await.serve(compiler_reply).await;
    let summary = run.await.unwrap().unwrap();

    let output = out.join("data/storage.facts.json");
    assert_eq!(summary.written, vec![output.clone()]);

    let text = std::fs::read_to_string(&output).unwrap();
    assert!(text.ends_with("}\n"));
    let facts: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(facts["componentId"], "storageaccounts");
    assert_eq!(facts["source"]["path"], "data/storage.bicep");
    assert_eq!(facts["source"]["compilerVersion"], "0.30.23");
    assert_eq!(facts["scopes"], json!({"allowed": ["resourceGroup"], "default": "resourceGroup"}));
    assert_eq!(facts["parameters"][0]["description"], "Storage SKU");
    assert_eq!(facts["parameters"][0]["default"], "Standard_LRS");
    assert_eq!(facts["capabilities"]["category"], "data");
    assert_eq!(facts["meta"]["generatedAt"], GENERATED_AT);
}

#[tokio::test]
async fn test_generate_continue_on_error() {
    let dir = TempDir::new().unwrap();
    let endpoint_file = dir.path().join("endpoint");
    let src = dir.path().join("src");
    write(&src, "broken.bicep");
    write(&src, "storage.bicep");

    let cmd = generate_args(&["--in", src.to_str().unwrap(), "--continue-on-error"]);
    let mut settings = settings(&endpoint_file);
    settings.generate.continue_on_error = cmd.overrides().continue_on_error.unwrap_or_default();

    let run = tokio::spawn(async move { handle_generate(&settings, &cmd).await });
    Peer::connect(&endpoint_file).await.serve(compiler_reply).await;
    let err = run.await.unwrap().unwrap_err();

    assert!(matches!(
        err.downcast_ref::<FactsError>(),
        Some(FactsError::FilesFailed { failed: 1, total: 2 })
    ));
    assert!(src.join("storage.facts.json").exists());
    assert!(!src.join("broken.facts.json").exists());
}

#[tokio::test]
async fn test_generate_without_sources() {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir.path().join("endpoint"));
    let cmd = generate_args(&["--in", dir.path().to_str().unwrap()]);

    let summary = handle_generate(&settings, &cmd).await.unwrap();
    assert!(summary.written.is_empty());
    assert!(!dir.path().join("endpoint").exists());
}

#[tokio::test]
async fn test_generate_requires_compiler() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.bicep");
    let overrides = SettingsOverrides {
        compiler_path: Some(PathBuf::from("/nonexistent/bicep")),
        ..SettingsOverrides::default()
    };
    let settings = Settings::load_with_env(None, &overrides, Some(HashMap::new())).unwrap();
    let cmd = generate_args(&["--in", dir.path().to_str().unwrap()]);

    let err = handle_generate(&settings, &cmd).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FactsError>(),
        Some(FactsError::SubprocessUnavailable { .. })
    ));
    assert!(!dir.path().join("main.facts.json").exists());
}
