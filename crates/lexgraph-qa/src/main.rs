//! CLI entry point for lexgraph contract question answering.

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use lexgraph_core::{Row, Settings};
use lexgraph_graph::{GraphConfig, GraphStore, Neo4jStore};

use lexgraph_qa::llm::OpenAiClient;
use lexgraph_qa::reducer::render_rows;
use lexgraph_qa::retriever::{GraphVectorRetriever, DEFAULT_TOP_K};
use lexgraph_qa::{contract_detail_rows, excerpt_rows, to_rows, Intent, QuestionEngine};

#[derive(Parser)]
#[command(name = "lexgraph")]
#[command(about = "Answer questions about the legal contract knowledge graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: lexgraph).
    #[arg(short, long, default_value = "lexgraph", global = true)]
    config: String,

    /// Output format for command results.
    #[arg(long, value_enum, default_value_t = Format::Text, global = true)]
    format: Format,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Describe command results in prose instead of printing records.
    #[arg(long, global = true)]
    describe: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a free-form question.
    Ask {
        question: String,
        /// Print query timings after the answer.
        #[arg(long)]
        stats: bool,
    },
    /// Show one contract with its parties and clause types.
    Contract { contract_id: i64 },
    /// Contracts of the organization best matching a name.
    Party { organization: String },
    /// Contracts containing a clause type.
    WithClause { clause_type: String },
    /// Contracts lacking a clause type.
    WithoutClause { clause_type: String },
    /// Excerpts most similar to a text.
    Similar {
        text: String,
        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
    /// Every excerpt of a contract, grouped by clause type.
    Excerpts { contract_id: i64 },
    /// Corpus-wide counts.
    Stats,
    /// Organizations with the most agreements.
    TopOrgs {
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
    /// Clause types that appear together.
    CoOccurrence {
        #[arg(short, long, default_value_t = 2)]
        min_frequency: u32,
    },
    /// Check store connectivity.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let logs = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if cli.log_json {
        logs.json().init();
    } else {
        logs.init();
    }

    let settings = Settings::load(&cli.config)?;
    let store: Arc<dyn GraphStore> =
        Arc::new(Neo4jStore::connect(&GraphConfig::from(&settings.neo4j)).await?);
    let engine = build_engine(store, &settings);

    let output = run(&cli, &engine).await?;
    println!("{output}");
    Ok(())
}

fn build_engine(store: Arc<dyn GraphStore>, settings: &Settings) -> QuestionEngine {
    let engine = QuestionEngine::new(Arc::clone(&store), settings);
    match OpenAiClient::new(&settings.llm) {
        Ok(client) => {
            let client = Arc::new(client);
            tracing::info!(model = %settings.llm.model, "LLM collaborators enabled");
            engine
                .with_translator(client.clone())
                .with_synthesizer(client.clone())
                .with_retriever(Arc::new(GraphVectorRetriever::new(store, client)))
        }
        Err(e) => {
            tracing::info!(reason = %e, "Running without LLM collaborators");
            engine
        }
    }
}

async fn run(cli: &Cli, engine: &QuestionEngine) -> anyhow::Result<String> {
    match &cli.command {
        Command::Ask { question, stats } => {
            let mut answer = engine.answer_question(question).await;
            if *stats {
                answer.push_str("\n\n");
                answer.push_str(&serde_json::to_string_pretty(&engine.performance_stats())?);
            }
            Ok(answer)
        }
        Command::Contract { contract_id } => {
            let agreement = engine
                .get_contract(*contract_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Contract {contract_id} not found"))?;
            let title = format!("Describe contract {contract_id}");
            report(cli, engine, &title, Intent::ContractDetail, &agreement, contract_detail_rows(&agreement)).await
        }
        Command::Party { organization } => {
            let agreements = engine.get_contracts_by_party(organization).await?;
            let title = format!("Contracts involving {organization}");
            report(cli, engine, &title, Intent::ContractList, &agreements, to_rows(&agreements)).await
        }
        Command::WithClause { clause_type } => {
            let agreements = engine.get_contracts_with_clause_type(clause_type).await?;
            let title = format!("Contracts with a {clause_type} clause");
            report(cli, engine, &title, Intent::ContractList, &agreements, to_rows(&agreements)).await
        }
        Command::WithoutClause { clause_type } => {
            let agreements = engine.get_contracts_without_clause_type(clause_type).await?;
            let title = format!("Contracts without a {clause_type} clause");
            report(cli, engine, &title, Intent::ContractList, &agreements, to_rows(&agreements)).await
        }
        Command::Similar { text, top_k } => {
            let excerpts = engine.get_contracts_similar_text(text, *top_k).await?;
            let title = format!("Excerpts similar to: {text}");
            report(cli, engine, &title, Intent::Similarity, &excerpts, to_rows(&excerpts)).await
        }
        Command::Excerpts { contract_id } => {
            let agreement = engine
                .get_contract_excerpts(*contract_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No excerpts found for contract {contract_id}"))?;
            let title = format!("Excerpts of contract {contract_id}");
            report(cli, engine, &title, Intent::ContractExcerpts, &agreement, excerpt_rows(&agreement)).await
        }
        Command::Stats => {
            let stats = engine.contract_statistics().await?;
            let rows = to_rows(std::slice::from_ref(&stats));
            report(cli, engine, "Contract database statistics", Intent::Analytics, &stats, rows).await
        }
        Command::TopOrgs { limit } => {
            let orgs = engine.top_organizations(*limit).await?;
            report(cli, engine, "Most active organizations", Intent::Analytics, &orgs, to_rows(&orgs)).await
        }
        Command::CoOccurrence { min_frequency } => {
            let pairs = engine.clause_co_occurrence(*min_frequency).await?;
            report(cli, engine, "Clause types that appear together", Intent::Analytics, &pairs, to_rows(&pairs)).await
        }
        Command::Health => {
            let health = engine.health_check().await;
            let text = serde_json::to_string_pretty(&health)?;
            if health.error.is_some() {
                eprintln!("{text}");
                anyhow::bail!("Contract store is unhealthy");
            }
            Ok(text)
        }
    }
}

/// Render a command result as JSON records, text rows, or synthesized prose.
async fn report<T: Serialize + ?Sized>(
    cli: &Cli,
    engine: &QuestionEngine,
    title: &str,
    intent: Intent,
    records: &T,
    rows: Vec<Row>,
) -> anyhow::Result<String> {
    if cli.describe {
        return Ok(engine.describe(title, intent, &rows).await);
    }
    match cli.format {
        Format::Json => Ok(serde_json::to_string_pretty(&serde_json::to_value(records)?)?),
        Format::Text if rows.is_empty() => Ok("No results.".to_string()),
        Format::Text => Ok(render_rows(&rows, intent)),
    }
}
