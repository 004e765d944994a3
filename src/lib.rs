pub mod config;
pub mod model;
pub mod replay;
pub mod search;
pub mod selection;
pub mod sources;
pub mod ui;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::LookupConfig;
use replay::{OutputLog, parse_script};
use search::query::QueryTemplate;
use sources::MemorySource;
use ui::control::LookupControl;

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "lookup",
    version,
    about = "Debounced type-to-search lookup control, driven from scripts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Where the query template comes from.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct TemplateSource {
    /// Query template text containing a `{searchText}` placeholder
    #[arg(long)]
    pub template: Option<String>,

    /// File holding the query template
    #[arg(long)]
    pub template_file: Option<PathBuf>,
}

impl TemplateSource {
    fn load(&self) -> Result<QueryTemplate> {
        match (&self.template, &self.template_file) {
            (Some(text), _) => Ok(QueryTemplate::new(text.as_str())),
            (None, Some(path)) => read_text(path).map(QueryTemplate::new),
            (None, None) => Ok(QueryTemplate::default()),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a scripted session against an in-memory record source
    Replay {
        #[command(flatten)]
        template: TemplateSource,

        /// JSON document mapping entity names to record arrays
        #[arg(long)]
        records: PathBuf,

        /// Script file, one step per line
        #[arg(long)]
        script: PathBuf,

        /// Initial serialized selection
        #[arg(long, default_value = "")]
        initial: String,

        /// Simulated service latency in milliseconds
        #[arg(long, default_value_t = 0)]
        latency_ms: u64,
    },
    /// Print the query built from a template and search text
    BuildQuery {
        #[command(flatten)]
        template: TemplateSource,

        /// Search text to substitute
        #[arg(long)]
        text: String,
    },
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            template,
            records,
            script,
            initial,
            latency_ms,
        } => {
            let template = template.load()?;
            run_replay(template, &records, &script, &initial, latency_ms).await
        }
        Commands::BuildQuery { template, text } => {
            let template = template.load()?;
            match template.build(&text) {
                Some(query) => {
                    println!("{}", serde_json::to_string_pretty(&query)?);
                    Ok(())
                }
                None => anyhow::bail!("query template is empty; searching is disabled"),
            }
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "lookup", &mut std::io::stdout());
            Ok(())
        }
    }
}

async fn run_replay(
    template: QueryTemplate,
    records: &Path,
    script: &Path,
    initial: &str,
    latency_ms: u64,
) -> Result<()> {
    let source = MemorySource::load(records)?
        .with_latency(std::time::Duration::from_millis(latency_ms));
    let steps = parse_script(&read_text(script)?)
        .with_context(|| format!("parsing script {}", script.display()))?;

    let log = OutputLog::new();
    let mut control = LookupControl::initialize(
        Arc::new(source),
        initial,
        template,
        LookupConfig::from_env(),
    )
    .with_listener(log.clone());

    let mut stdout = std::io::stdout().lock();
    replay::replay(&mut control, &steps, &log, &mut stdout).await?;
    control.teardown();
    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
