use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sql_agent::analytics::InsightPipeline;
use sql_agent::config::Settings;
use sql_agent::logging::{init_logging, LogOptions};
use sql_agent::schema_rag::{OpenAiEmbedder, SchemaCache, SchemaRetriever};
use sql_agent::workflow::{AgentOptions, ProgressCallback, ProgressMode, SqlAgent};
use sql_agent::{LlmClient, SupabaseClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "sql-agent")]
#[command(about = "Answer business questions with self-correcting SQL")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory for daily log files
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    /// Log to the console only
    #[arg(long, global = true)]
    no_log_file: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate, validate and run SQL for a question
    Ask {
        /// The question in natural language
        #[arg(required = true)]
        prompt: Vec<String>,

        /// Report progress in the 10-50 range, as when embedded in a larger pipeline
        #[arg(long)]
        sub_workflow: bool,

        /// Print the result record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a question and analyze its results
    Analyze {
        #[arg(required = true)]
        prompt: Vec<String>,
    },
    /// Refetch schema metadata and rebuild the retrieval index
    RefreshSchema,
}

struct Services {
    settings: Settings,
    llm: Arc<LlmClient>,
    supabase: Arc<SupabaseClient>,
    retriever: Arc<SchemaRetriever>,
}

impl Services {
    fn from_settings(settings: Settings) -> Self {
        let llm = Arc::new(LlmClient::from_config(&settings.openai));
        info!(model = llm.model(), "Completion client configured");
        let supabase = Arc::new(SupabaseClient::from_config(&settings.supabase));
        let cache = SchemaCache::from_config(supabase.clone(), &settings.workflow);
        let embedder = Arc::new(OpenAiEmbedder::from_config(&settings.embeddings));
        let retriever = Arc::new(SchemaRetriever::from_config(cache, embedder, &settings.workflow));
        Self {
            settings,
            llm,
            supabase,
            retriever,
        }
    }

    fn agent(&self) -> SqlAgent {
        SqlAgent::new(self.llm.clone(), self.retriever.clone(), self.supabase.clone())
            .with_options(AgentOptions::from(&self.settings.workflow))
    }
}

fn progress_printer() -> ProgressCallback {
    Arc::new(|status: &str, percent: u8| eprintln!("[{:>3}%] {}", percent, status))
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env().context("Failed to load configuration")?;
    let services = Services::from_settings(settings);

    match cli.command {
        Commands::Ask {
            prompt,
            sub_workflow,
            json,
        } => {
            let prompt = prompt.join(" ");
            let mode = if sub_workflow {
                ProgressMode::SubWorkflow
            } else {
                ProgressMode::Standalone
            };
            let outcome = services
                .agent()
                .run_with_progress(&prompt, Some(progress_printer()), mode)
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("\n=== SQL ===\n{}\n", outcome.sql_query);
                println!("{}", outcome.results);
            }
        }
        Commands::Analyze { prompt } => {
            let prompt = prompt.join(" ");
            let pipeline = InsightPipeline::new(services.agent(), services.llm.clone());
            let outcome = pipeline.run(&prompt, Some(progress_printer())).await?;
            println!("\n{}", outcome.report);
        }
        Commands::RefreshSchema => {
            let chunks = services.retriever.refresh().await?;
            info!(chunks, "Schema index rebuilt");
            println!("Indexed {} tables", chunks);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let json_output = matches!(cli.command, Commands::Ask { json: true, .. });
    let _guard = init_logging(LogOptions {
        log_dir: (!cli.no_log_file).then(|| cli.log_dir.clone()),
        console_to_stderr: json_output,
        ..LogOptions::default()
    });

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}
