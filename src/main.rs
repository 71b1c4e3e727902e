// Command-line entry point for Scopeflow.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use scopeflow::api::server;
use scopeflow::application::round_trip::RoundTripCoordinator;
use scopeflow::application::session_store::SessionStore;
use scopeflow::config::EngineConfig;
use scopeflow::domain::flowgraph::FlowGraph;
use scopeflow::domain::synthesizer::Synthesizer;
use scopeflow::infrastructure::interchange::InterchangeStore;
use scopeflow::infrastructure::text_generator::OllamaGenerator;
use scopeflow::infrastructure::{DotExporter, JsonGraphExporter};
use scopeflow::ports::{GraphExporter, TreeBuilder};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Interchange document path, overrides the config file
    #[arg(long, global = true)]
    interchange: Option<PathBuf>,

    /// Text generation endpoint, overrides the config file
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Text generation model, overrides the config file
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synthesize a source file and export its flow graph
    Parse {
        /// Input source file path
        #[arg(short, long)]
        input: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "dot")]
        format: Format,

        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate source text from the interchange document
    Regenerate {
        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the JSON-lines bridge for render surfaces
    Serve {
        #[arg(short, long, default_value_t = 4599)]
        port: u16,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    /// Graphviz flowchart
    Dot,
    /// Annotated tree (interchange document)
    Json,
    /// Graph nodes and edges as JSON
    Graph,
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = EngineConfig::load_or_default(cli.config.as_deref())?;
    if let Some(path) = &cli.interchange {
        config.interchange_path = path.clone();
    }
    if let Some(endpoint) = &cli.endpoint {
        config.generator.endpoint = endpoint.clone();
    }
    if let Some(model) = &cli.model {
        config.generator.model = model.clone();
    }
    Ok(config)
}

fn emit(content: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, content)
                .with_context(|| format!("Cannot write output file {}", path.display()))?;
            info!(path = %path.display(), "output written");
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Command::Parse {
            input,
            format,
            output,
        } => {
            let source = fs::read_to_string(input)
                .with_context(|| format!("Cannot read input file {}", input.display()))?;
            let root = Synthesizer::new().build_tree(&source);

            let store = InterchangeStore::new(config.interchange_path.clone());
            if let Err(err) = store.write(&root) {
                warn!(error = %err, "could not persist interchange document");
            }

            let graph = FlowGraph::build(&root);
            let rendered = match format {
                Format::Dot => DotExporter.render(&graph)?,
                Format::Graph => JsonGraphExporter.render(&graph)?,
                Format::Json => InterchangeStore::encode(&root)?,
            };
            emit(&rendered, output.as_ref())?;
            info!(nodes = root.count(), "analysis completed");
        }
        Command::Regenerate { output } => {
            let generator = OllamaGenerator::new(&config.generator)?;
            let store = InterchangeStore::new(config.interchange_path.clone());
            let coordinator = RoundTripCoordinator::new(store, Arc::new(generator));
            let source = coordinator
                .regenerate()
                .context("Source regeneration failed")?;
            emit(&source, output.as_ref())?;
        }
        Command::Serve { port } => {
            let generator = OllamaGenerator::new(&config.generator)?;
            let store = Arc::new(SessionStore::new(config, Arc::new(generator)));
            server::start_server(*port, store)?;
        }
    }

    Ok(())
}
