use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use crudkit::{CrudConfig, DefinitionSet, EntityDefinition, MemoryDataFactory, MemoryStore};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "crudkit")]
#[command(about = "Inspect and check crudkit entity schemas")]
struct Cli {
    /// JSON file with labels, page size and other settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every entity of a schema with its fields and children
    Describe { schema: PathBuf },
    /// Load a schema and set up storage for it, failing on any error
    Check { schema: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Describe { schema } => {
            let definitions = load_definitions(&schema, &config)?;
            for (name, definition) in definitions.iter() {
                describe(name, definition);
            }
            Ok(())
        }
        Command::Check { schema } => check(&schema, config).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<CrudConfig> {
    match path {
        Some(path) => CrudConfig::from_path(path)
            .with_context(|| format!("Failed to load config '{}'", path.display())),
        None => Ok(CrudConfig::default()),
    }
}

fn load_definitions(path: &Path, config: &CrudConfig) -> Result<DefinitionSet> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema '{}'", path.display()))?;
    DefinitionSet::from_json_str(&json, config)
        .with_context(|| format!("Invalid schema '{}'", path.display()))
}

fn describe(name: &str, definition: &EntityDefinition) {
    println!("{} ({}) -> table '{}'", name, definition.label(), definition.table());
    for field in definition.field_names() {
        let field_type = definition
            .field_type(&field)
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        let mut flags = Vec::new();
        if definition.is_required(&field) {
            flags.push("required".to_string());
        }
        if definition.is_unique(&field) {
            flags.push("unique".to_string());
        }
        if let Some(target) = definition.reference(&field) {
            flags.push(format!("-> {}.{}", target.table, target.name_field));
        }
        println!(
            "  {:<20} {:<10} {:<24} {}",
            field,
            field_type,
            definition.field_label(&field),
            flags.join(", ")
        );
    }
    println!("  list: {}", definition.list_field_names().join(", "));
    println!("  page size: {}", definition.page_size());
    for child in definition.children() {
        let cascade = if definition.is_delete_cascade() { " (cascade)" } else { "" };
        println!("  child: {}.{}{}", child.table, child.field, cascade);
    }
}

async fn check(path: &Path, config: CrudConfig) -> Result<()> {
    let definitions = load_definitions(path, &config)?;
    if definitions.is_empty() {
        bail!("Schema '{}' defines no entities", path.display());
    }
    let store = Arc::new(MemoryStore::with_config(config));
    let factory = MemoryDataFactory::new(store.clone(), Arc::new(definitions)).await;
    println!(
        "OK: {} entities, {} tables",
        factory.definitions().len(),
        store.table_names().await.len()
    );
    Ok(())
}
