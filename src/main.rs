//! Command-line interface for jsonschema-modelgen

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};

#[cfg(feature = "cli")]
use modelgen::loaders::Loader;
#[cfg(feature = "cli")]
use modelgen::locations::Location;
#[cfg(feature = "cli")]
use modelgen::{
    DirectoryProvider, DumpRenderer, Evaluator, GeneratedModel, Generator, GeneratorConfig,
    SchemaProcessor,
};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "modelgen")]
#[command(author, version, about = "JSON Schema to class model compiler", long_about = None)]
struct Cli {
    /// Log resolution and composition details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate one class description per class for a schema directory
    Generate {
        /// Directory containing the JSON schema files
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Directory receiving the generated files
        #[arg(value_name = "DEST")]
        destination: PathBuf,

        /// JSON generator configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Namespace prefix of generated classes
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Inspect the classes generated from one schema file
    Inspect {
        /// Path to the JSON schema file
        #[arg(value_name = "SCHEMA")]
        schema: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Validate a JSON document against the root class of a schema
    Validate {
        /// Path to the JSON schema file
        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// Path to the JSON document to validate
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Report every failure instead of the first
        #[arg(long)]
        all: bool,
    },
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Generate {
            source,
            destination,
            config,
            prefix,
        } => cmd_generate(source, destination, config, prefix),
        Commands::Inspect { schema, json } => cmd_inspect(schema, json),
        Commands::Validate { schema, file, all } => cmd_validate(schema, file, all),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "cli")]
fn cmd_generate(
    source: PathBuf,
    destination: PathBuf,
    config_path: Option<PathBuf>,
    prefix: Option<String>,
) -> modelgen::Result<()> {
    let mut config = match config_path {
        Some(path) => GeneratorConfig::from_file(path)?,
        None => GeneratorConfig::new(),
    };
    if let Some(prefix) = prefix {
        config = config.with_namespace_prefix(prefix);
    }

    let provider = DirectoryProvider::new(&source)?;
    let renderer = DumpRenderer::new().with_immutable(config.immutable);
    let report = Generator::new(config).generate(&provider, &renderer, &destination)?;

    println!(
        "Generated {} classes into {}",
        report.class_count(),
        destination.display()
    );
    Ok(())
}

/// Model of a single schema file, with siblings available for `$ref`s
#[cfg(feature = "cli")]
fn single_file_model(
    schema: &Path,
    config: &GeneratorConfig,
) -> modelgen::Result<(GeneratedModel, modelgen::ClassRef)> {
    let directory = schema
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let provider = DirectoryProvider::new(directory)?;
    let node = Loader::new().load_node(&Location::Path(schema.to_path_buf()))?;

    let filters = modelgen::filters::FilterRegistry::with_builtins();
    let mut processor = SchemaProcessor::new(config, &filters).with_provider(&provider);
    let root = processor.process(&node)?;
    Ok((processor.finish()?, root))
}

#[cfg(feature = "cli")]
fn cmd_inspect(schema: PathBuf, json_output: bool) -> modelgen::Result<()> {
    let config = GeneratorConfig::new();
    let (model, _) = single_file_model(&schema, &config)?;
    let renderer = DumpRenderer::new();

    let mut dumps = Vec::with_capacity(model.len());
    for class in model.classes() {
        dumps.push(renderer.dump(class, &model)?);
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&dumps)?);
        return Ok(());
    }

    println!("modelgen v{}", modelgen::VERSION);
    println!();
    println!("Classes: {}", dumps.len());
    for dump in &dumps {
        println!();
        println!("{} ({})", dump.qualified_name, dump.source);
        for property in &dump.properties {
            let required = if property.required { " (required)" } else { "" };
            println!("  {}: {}{}", property.name, property.type_hint, required);
            if !property.validators.is_empty() {
                let kinds: Vec<_> = property.validators.iter().map(|v| v.kind.as_str()).collect();
                println!("    validators: {}", kinds.join(", "));
            }
        }
        if !dump.base_validators.is_empty() {
            let kinds: Vec<_> = dump.base_validators.iter().map(|v| v.kind.as_str()).collect();
            println!("  object validators: {}", kinds.join(", "));
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_validate(schema: PathBuf, file: PathBuf, all: bool) -> modelgen::Result<()> {
    let config = GeneratorConfig::new().with_collect_errors(all);
    let (model, root) = single_file_model(&schema, &config)?;

    let text = fs::read_to_string(&file)
        .map_err(|e| modelgen::Error::Filesystem(format!("Failed to read '{}': {}", file.display(), e)))?;
    let data: serde_json::Value = serde_json::from_str(&text)?;

    match Evaluator::new(&model, &config).construct(&root, &data) {
        Ok(_) => {
            println!("✓ Document is valid");
            Ok(())
        }
        Err(modelgen::Error::Validation(error)) => {
            println!("✗ Document is invalid");
            println!();
            println!("Errors:");
            println!("  - {}", error.message);
            std::process::exit(1);
        }
        Err(modelgen::Error::ValidationErrors(errors)) => {
            println!("✗ Document is invalid");
            println!();
            println!("Errors:");
            for error in errors.iter() {
                println!("  - {}", error.message);
            }
            std::process::exit(1);
        }
        Err(other) => Err(other),
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
