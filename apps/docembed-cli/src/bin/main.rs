use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docembed_core::config::Settings;
use docembed_core::{ComponentDevice, DocumentEmbedderConfig, TextEmbedderConfig};
use docembed_embed::{DocumentEmbedder, TextEmbedder};

#[derive(Parser)]
#[command(name = "docembed", version, about = "Embed documents and text with a local sentence embedding model")]
struct Cli {
    /// Read settings from this file instead of docembed.toml + docembed.<env>.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Overrides {
    /// Local model directory or Hugging Face repo id
    #[arg(long, global = true, env = "DOCEMBED_MODEL")]
    model: Option<String>,
    /// cpu, cuda[:N] or mps
    #[arg(long, global = true)]
    device: Option<String>,
    #[arg(long, global = true)]
    batch_size: Option<usize>,
    #[arg(long, global = true)]
    normalize: bool,
    #[arg(long, global = true)]
    no_progress: bool,
    #[arg(long, global = true)]
    truncate_dim: Option<usize>,
    #[arg(long, global = true)]
    prefix: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Embed a JSON array of documents and write them back with embeddings
    Embed {
        /// Input file, or '-' for stdin
        input: String,
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Metadata field to embed ahead of the content (repeatable, in order)
        #[arg(long = "meta-field")]
        meta_fields: Vec<String>,
        #[arg(long)]
        separator: Option<String>,
    },
    /// Embed a single string and print the vector
    Text { text: String },
    /// Print the serialized component configuration
    Config {
        /// Show the text embedder instead of the document embedder
        #[arg(long)]
        text: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    }
    .map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;

    match cli.command {
        Command::Embed { input, output, meta_fields, separator } => {
            let mut config = settings.document_embedder()?;
            apply_document_overrides(&mut config, &cli.overrides)?;
            if !meta_fields.is_empty() {
                config.meta_fields_to_embed = meta_fields;
            }
            if let Some(separator) = separator {
                config.embedding_separator = separator;
            }

            let raw = read_input(&input)?;
            let value: serde_json::Value = serde_json::from_str(&raw).context("input is not valid JSON")?;

            let mut documents = DocumentEmbedder::parse_input(value)?;

            let mut embedder = DocumentEmbedder::new(config)?;
            embedder.warm_up()?;
            embedder.run(&mut documents)?;
            tracing::info!(documents = documents.len(), "embedding complete");

            let rendered = serde_json::to_string_pretty(&documents)?;
            match output {
                Some(path) => fs::write(&path, rendered).with_context(|| format!("write {}", path.display()))?,
                None => writeln!(io::stdout(), "{rendered}")?,
            }
        }
        Command::Text { text } => {
            let mut config = settings.text_embedder()?;
            apply_text_overrides(&mut config, &cli.overrides)?;
            let mut embedder = TextEmbedder::new(config)?;
            embedder.warm_up()?;
            let embedding = embedder.run(&text)?;
            writeln!(io::stdout(), "{}", serde_json::to_string(&embedding)?)?;
        }
        Command::Config { text } => {
            let value = if text {
                let mut config = settings.text_embedder()?;
                apply_text_overrides(&mut config, &cli.overrides)?;
                TextEmbedder::new(config)?.to_config()?
            } else {
                let mut config = settings.document_embedder()?;
                apply_document_overrides(&mut config, &cli.overrides)?;
                DocumentEmbedder::new(config)?.to_config()?
            };
            writeln!(io::stdout(), "{}", serde_json::to_string_pretty(&value)?)?;
        }
    }
    Ok(())
}

fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(input).with_context(|| format!("read {input}"))
}

fn apply_document_overrides(config: &mut DocumentEmbedderConfig, o: &Overrides) -> anyhow::Result<()> {
    apply_backend_overrides(&mut config.backend, o)?;
    if let Some(batch_size) = o.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(prefix) = &o.prefix {
        config.prefix = prefix.clone();
    }
    config.normalize_embeddings |= o.normalize;
    config.progress_bar &= !o.no_progress;
    config.validate()?;
    Ok(())
}

fn apply_text_overrides(config: &mut TextEmbedderConfig, o: &Overrides) -> anyhow::Result<()> {
    apply_backend_overrides(&mut config.backend, o)?;
    if let Some(batch_size) = o.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(prefix) = &o.prefix {
        config.prefix = prefix.clone();
    }
    config.normalize_embeddings |= o.normalize;
    config.progress_bar &= !o.no_progress;
    config.validate()?;
    Ok(())
}

fn apply_backend_overrides(backend: &mut docembed_core::BackendConfig, o: &Overrides) -> anyhow::Result<()> {
    if let Some(model) = &o.model {
        backend.model = model.clone();
    }
    if let Some(device) = &o.device {
        backend.device = Some(ComponentDevice::from_str_spec(device)?);
    }
    if o.truncate_dim.is_some() {
        backend.truncate_dim = o.truncate_dim;
    }
    Ok(())
}
