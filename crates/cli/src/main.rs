mod logging;

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;

use docqa_core::{Chunker, DocQaConfig, FileExtractor, DEFAULT_CONFIG_PATH};
use docqa_index::{NamespaceKey, NamespaceStore};
use docqa_llm::{InferenceConfig, SubprocessInference};
use docqa_rag::{
    discover_entities, BuildReport, EmbeddingClient, IndexBuilder, QaPipeline, Retriever,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "docqa", version = VERSION, about = "Per-namespace document index and question answering")]
struct Cli {
    /// TOML config file; defaults to $DOCQA_CONFIG or docqa.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct NamespaceArgs {
    #[arg(long = "org")]
    organization: String,
    #[arg(long)]
    entity: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index new documents for one organization/entity pair.
    Build {
        #[command(flatten)]
        namespace: NamespaceArgs,
        /// Folder to read; defaults to <documents_root>/<org>/<entity>.
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Index every entity folder of an organization.
    BuildAll {
        #[arg(long = "org")]
        organization: String,
    },
    /// Print the passages closest to a question.
    Search {
        #[command(flatten)]
        namespace: NamespaceArgs,
        #[arg(short = 'k', long = "top-k")]
        top_k: Option<usize>,
        question: String,
    },
    /// Answer a question from the indexed documents.
    Ask {
        #[command(flatten)]
        namespace: NamespaceArgs,
        #[arg(short = 'k', long = "top-k")]
        top_k: Option<usize>,
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
        question: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = load_config(cli.config.as_deref())?;
    let store = NamespaceStore::new(config.index_root());
    let embedder = EmbeddingClient::from_config(&config.embedding)?;

    match cli.command {
        Commands::Build { namespace, source } => {
            let key = NamespaceKey::new(&namespace.organization, &namespace.entity)?;
            let folder = source.unwrap_or_else(|| key.dir_under(&config.documents_root()));
            let extractor = FileExtractor::new();
            let builder = IndexBuilder::new(
                &store,
                &extractor,
                &embedder,
                Chunker::with_max_length(config.chunking.max_length),
            )
            .with_cleanup(config.cleanup.clone());
            let report = builder.build_incremental(&folder, &key)?;
            print_report(&report);
        }
        Commands::BuildAll { organization } => {
            let documents_root = config.documents_root();
            let entities = discover_entities(&documents_root, &organization)?;
            if entities.is_empty() {
                bail!("no entity folders found for organization {organization}");
            }
            info!(organization = %organization, entities = entities.len(), "building all entities");
            let extractor = FileExtractor::new();
            let builder = IndexBuilder::new(
                &store,
                &extractor,
                &embedder,
                Chunker::with_max_length(config.chunking.max_length),
            )
            .with_cleanup(config.cleanup.clone());
            let reports = builder.build_entities(&documents_root, &organization, &entities)?;
            for report in &reports {
                print_report(report);
            }
            if reports.len() < entities.len() {
                bail!(
                    "{} of {} entities failed to build",
                    entities.len() - reports.len(),
                    entities.len()
                );
            }
        }
        Commands::Search {
            namespace,
            top_k,
            question,
        } => {
            let key = NamespaceKey::new(&namespace.organization, &namespace.entity)?;
            let k = top_k.unwrap_or(config.top_k);
            let hits = Retriever::new(&store, &embedder).search(&question, &key, k)?;
            if hits.is_empty() {
                println!("no passages found in {key}");
            }
            for (rank, hit) in hits.iter().enumerate() {
                println!(
                    "#{} distance={:.4} source={} table={}",
                    rank + 1,
                    hit.distance,
                    hit.record.source,
                    hit.record.contains_table
                );
                println!("{}\n", hit.record.text);
            }
        }
        Commands::Ask {
            namespace,
            top_k,
            json,
            question,
        } => {
            let key = NamespaceKey::new(&namespace.organization, &namespace.entity)?;
            let inference = SubprocessInference::new(InferenceConfig::from_section(&config.inference));
            let pipeline = QaPipeline::new(
                Retriever::new(&store, &embedder),
                &inference,
                top_k.unwrap_or(config.top_k),
            );
            let answer = pipeline.answer(&question, &key)?;
            if json {
                let sources: Vec<_> = answer
                    .passages
                    .iter()
                    .map(|p| json!({ "source": p.record.source, "distance": p.distance }))
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "answer": answer.answer,
                        "sources": sources,
                        "inference_failed": answer.inference_failed,
                    }))?
                );
            } else {
                println!("{}", answer.answer);
            }
        }
    }
    Ok(())
}

fn load_config(explicit: Option<&Path>) -> Result<DocQaConfig> {
    let Some(path) = explicit else {
        return DocQaConfig::load().context("failed to load configuration");
    };
    if !path.exists() {
        bail!("config file {} does not exist (default is {DEFAULT_CONFIG_PATH})", path.display());
    }
    let mut config = DocQaConfig::from_file_if_exists(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    config.apply_env_with(|key| env::var(key).ok())?;
    Ok(config)
}

fn print_report(report: &BuildReport) {
    println!(
        "{}: {} new file(s), {} new chunk(s), {} total, {} already indexed{}",
        report.namespace,
        report.indexed_files.len(),
        report.new_chunks,
        report.total_chunks,
        report.already_indexed,
        if report.committed { "" } else { " (unchanged)" }
    );
    for failed in &report.failed_files {
        eprintln!("warning: could not read {failed}; it will be retried on the next build");
    }
}
