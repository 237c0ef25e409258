use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use smart_toolbox::inference::{InferenceClient, ResolvedConfig};
use smart_toolbox::toolbox::{self, plan_parser, GuidanceLevel, Taxonomy, UserContext};

#[derive(Parser, Debug)]
#[command(name = "smart-toolbox", version, about = "Plan a CAD task and rank the tools it needs")]
struct Cli {
    /// Path to toolbox.yaml (default: $SMART_TOOLBOX_CONFIG or upward search)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask the model for a plan and print the resulting toolbox as JSON
    Plan {
        /// What the user wants to make
        #[arg(long)]
        object: String,
        /// guided, choose or custom
        #[arg(long, default_value = "guided")]
        guidance: GuidanceLevel,
        /// The user's own approach, if any
        #[arg(long)]
        approach: Option<String>,
        /// Tool catalog (YAML or JSON); overrides the config file
        #[arg(long)]
        taxonomy: Option<PathBuf>,
    },
    /// Parse a saved model answer without calling the model
    Parse {
        file: PathBuf,
        #[arg(long)]
        taxonomy: Option<PathBuf>,
    },
    /// List the tool catalog
    Tools {
        #[arg(long)]
        taxonomy: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    smart_toolbox::init_tracing();

    let cwd = std::env::current_dir().context("cannot read working directory")?;
    let resolved = ResolvedConfig::resolve(cli.config.as_deref(), &cwd)?;
    let configured_taxonomy = resolved.taxonomy_path();
    let config = resolved.config;

    match cli.command {
        Command::Plan {
            object,
            guidance,
            approach,
            taxonomy,
        } => {
            let taxonomy = Taxonomy::resolve(taxonomy.as_deref(), configured_taxonomy.as_deref())?;
            let context = UserContext::new(&object, guidance, approach.as_deref())?;
            let client = InferenceClient::from_config(&config)?;
            tracing::info!(
                endpoint = client.base_url(),
                model = client.model_name(),
                "using inference endpoint"
            );

            let result = toolbox::plan_toolbox(&context, &taxonomy, &client, &config.planner).await;
            if let Some(reason) = result.task.degrade_reason() {
                eprintln!("warning: {reason}");
            }
            print_json(&result)
        }
        Command::Parse { file, taxonomy } => {
            let taxonomy = Taxonomy::resolve(taxonomy.as_deref(), configured_taxonomy.as_deref())?;
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            print_json(&plan_parser::parse(&text, &taxonomy))
        }
        Command::Tools { taxonomy } => {
            let taxonomy = Taxonomy::resolve(taxonomy.as_deref(), configured_taxonomy.as_deref())?;
            print_json(taxonomy.tools())
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
