use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use maturity_diagnostic::advisory::AdvisoryClient;
use maturity_diagnostic::catalog::{AliasTable, Catalog};
use maturity_diagnostic::config::{Config, API_KEY_ENV};
use maturity_diagnostic::error::SessionError;
use maturity_diagnostic::export::ExportFormat;
use maturity_diagnostic::import;
use maturity_diagnostic::models::{ItemId, OrganizationMetadata, Score};
use maturity_diagnostic::reference::BenchmarkStore;
use maturity_diagnostic::session::DiagnosticSession;

#[derive(Parser)]
#[command(name = "maturity-diagnostic")]
#[command(about = "Institutional maturity self-assessment compared against the observatory base", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CatalogArgs {
    /// CSV with id,prompt,dimension columns (defaults to the built-in questionnaire)
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// CSV with alias,canonical columns merged over the built-in aliases
    #[arg(long)]
    aliases: Option<PathBuf>,
}

#[derive(Args)]
struct DiagnosticArgs {
    #[command(flatten)]
    catalog: CatalogArgs,
    /// Benchmark CSV
    #[arg(long, env = "DIAGNOSTIC_BENCHMARK_PATH")]
    benchmark: Option<PathBuf>,
    /// CSV with item_id,score columns
    #[arg(long)]
    answers: Option<PathBuf>,
    /// Single answer as ITEM=SCORE; applied after --answers
    #[arg(long = "answer", value_parser = import::parse_answer_arg)]
    answer: Vec<(ItemId, Score)>,
    #[arg(long)]
    institution: Option<String>,
    /// Branch of government, e.g. "Poder Executivo"
    #[arg(long)]
    power: Option<String>,
    /// Level of government, e.g. "federal"
    #[arg(long)]
    sphere: Option<String>,
    #[arg(long)]
    state: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the questionnaire items
    Catalog {
        #[command(flatten)]
        catalog: CatalogArgs,
        /// Zero-based page to show; all items when omitted
        #[arg(long)]
        page: Option<usize>,
        #[arg(long, default_value_t = 5)]
        page_size: usize,
    },
    /// Generate the diagnostic profile
    Diagnose {
        #[command(flatten)]
        args: DiagnosticArgs,
        /// Print the diagnostic as JSON instead of the profile text
        #[arg(long)]
        json: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Render the diagnostic as a downloadable document
    Export {
        #[command(flatten)]
        args: DiagnosticArgs,
        #[arg(long, value_enum, default_value_t = ExportFormat::Pdf)]
        format: ExportFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Ask the AI assistant about the diagnostic
    Chat {
        #[command(flatten)]
        args: DiagnosticArgs,
        /// Question to ask; reads one question per stdin line when omitted
        #[arg(long = "question")]
        questions: Vec<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_catalog(args: &CatalogArgs) -> anyhow::Result<(Catalog, AliasTable)> {
    let catalog = match &args.catalog {
        Some(path) => Catalog::from_csv(path)
            .with_context(|| format!("invalid questionnaire catalog {}", path.display()))?,
        None => Catalog::builtin(),
    };

    let mut aliases = AliasTable::builtin();
    if let Some(path) = &args.aliases {
        aliases
            .extend_from_csv(path)
            .with_context(|| format!("invalid alias table {}", path.display()))?;
    }

    Ok((catalog, aliases))
}

fn build_session(args: &DiagnosticArgs) -> anyhow::Result<DiagnosticSession> {
    let (catalog, aliases) = load_catalog(&args.catalog)?;
    let mut session = DiagnosticSession::new(catalog, aliases);

    let mut edits = Vec::new();
    if let Some(path) = &args.answers {
        edits.extend(
            import::read_answers_csv(path)
                .with_context(|| format!("failed to read answers from {}", path.display()))?,
        );
    }
    edits.extend(args.answer.iter().cloned());

    for (id, score) in edits {
        match session.set_answer(id, score) {
            Ok(()) => {}
            Err(SessionError::UnknownItem(id)) => {
                tracing::warn!(item = %id, "Ignoring answer for unknown item");
            }
            Err(other) => return Err(other.into()),
        }
    }

    Ok(session)
}

fn organization(args: &DiagnosticArgs) -> OrganizationMetadata {
    OrganizationMetadata {
        institution: args.institution.clone(),
        power: args.power.clone(),
        sphere: args.sphere.clone(),
        state: args.state.clone(),
    }
}

fn generate(args: &DiagnosticArgs, config: &Config) -> anyhow::Result<DiagnosticSession> {
    let mut session = build_session(args)?;
    let benchmarks = BenchmarkStore::new(
        args.benchmark
            .clone()
            .unwrap_or_else(|| config.benchmark_path.clone()),
    );
    session.generate(organization(args), &benchmarks.get());
    Ok(session)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;

    match cli.command {
        Commands::Catalog {
            catalog,
            page,
            page_size,
        } => {
            let (catalog, _) = load_catalog(&catalog)?;
            let items = match page {
                Some(index) => {
                    println!(
                        "Page {} of {}:",
                        index + 1,
                        catalog.page_count(page_size)
                    );
                    catalog.page(index, page_size)
                }
                None => catalog.items(),
            };
            for item in items {
                println!("- {} [{}] {}", item.id, item.dimension, item.prompt);
            }
            println!(
                "Scale: 0 = {}, 1 = {}, 2 = {}, 3 = {} (unanswered items count as {})",
                Score::new(0)?.label(),
                Score::new(1)?.label(),
                Score::new(2)?.label(),
                Score::new(3)?.label(),
                Score::BASELINE
            );
        }
        Commands::Diagnose { args, json, out } => {
            let session = generate(&args, &config)?;
            let diagnostic = session
                .last_diagnostic()
                .context("diagnostic was not generated")?;
            let rendered = if json {
                serde_json::to_string_pretty(diagnostic)?
            } else {
                diagnostic.profile.to_string()
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    println!("Diagnostic written to {}.", path.display());
                }
                None => println!("{rendered}"),
            }
        }
        Commands::Export { args, format, out } => {
            let session = generate(&args, &config)?;
            let renderer = format.renderer(chrono::Local::now().date_naive());
            let bytes = session.export(renderer.as_ref())?;
            let out = out.unwrap_or_else(|| {
                PathBuf::from(format!("diagnostic.{}", renderer.file_extension()))
            });
            std::fs::write(&out, bytes)?;
            println!("Document written to {}.", out.display());
        }
        Commands::Chat { args, questions } => {
            let mut session = generate(&args, &config)?;
            let client = match AdvisoryClient::from_config(&config.advisory) {
                Ok(client) => client,
                Err(error) => {
                    tracing::warn!(%error, "Advisory chat disabled");
                    println!(
                        "The AI assistant is disabled: set {} to enable it.",
                        API_KEY_ENV
                    );
                    return Ok(());
                }
            };

            let questions: Box<dyn Iterator<Item = String>> = if questions.is_empty() {
                println!("Ask a question about the diagnostic (empty line to quit):");
                Box::new(
                    std::io::stdin()
                        .lock()
                        .lines()
                        .map_while(Result::ok)
                        .take_while(|line| !line.trim().is_empty()),
                )
            } else {
                Box::new(questions.into_iter())
            };

            for question in questions {
                let reply = session.chat(&client, &question).await?;
                println!("\n{}\n", reply.text());
            }
            tracing::info!(
                session = %session.id(),
                turns = session.transcript().len() / 2,
                "Chat finished"
            );
        }
    }

    Ok(())
}
