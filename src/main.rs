use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use lumen_core::{
    AppContext, ChatMode, ChatTurn, CodeReference, Functionality, LumenConfig, OutputFormat,
};
use lumen_index::{BuildOutcome, IndexBuilder, IndexScheduler};
use lumen_recall::references::{additional_related_context, related_context};
use lumen_recall::{
    ChatProvider, CompletionTrigger, InlineCompleter, InlineRequest, RecallOrchestrator,
    RecallOutcome, WorkspaceSymbolResolver,
};
use lumen_service::{RetrievalClient, ServiceManager};

#[derive(Parser)]
#[command(
    name = "lumen",
    version,
    about = "Local code indexing and retrieval-augmented recall for AI chat",
    long_about = "Lumen keeps a content-hashed index of your project's functions in a local\n\
                   retrieval service and gathers related code for chat turns from symbol\n\
                   definitions, local semantic search and a shared remote corpus.\n\n\
                   Examples:\n  \
                     lumen init                         Create a .lumen.toml config file\n  \
                     lumen index --path .               Index the project once\n  \
                     lumen watch --path .               Re-index on a schedule until Ctrl-C\n  \
                     lumen chunk src/App.tsx            Show the chunks of one file\n  \
                     lumen recall 'why is it NaN?' --file src/cart.ts --lines 10:14\n  \
                     lumen complete src/cart.ts --at 12:5 --manual\n  \
                     lumen health                       Check the retrieval service"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .lumen.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text  Human-readable summaries (default)\n  \
                         json  Machine-readable JSON with camelCase keys"
    )]
    format: OutputFormat,

    /// Enable verbose output (debug logging)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Create a default .lumen.toml configuration file
    #[command(long_about = "Create a default .lumen.toml configuration file.\n\n\
        Generates a commented template with all available options.\n\
        Fails if .lumen.toml already exists.")]
    Init,
    /// Index a project into the local retrieval service
    #[command(long_about = "Index a project into the local retrieval service.\n\n\
        Walks the project, chunks every supported source file, submits changed\n\
        chunks and records the result in the project's manifest. Unchanged files\n\
        are not resubmitted.\n\n\
        Examples:\n  lumen index\n  lumen index --path ~/work/shop --reset")]
    Index {
        /// Project root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Drop the project's index and manifest before indexing
        #[arg(long)]
        reset: bool,
    },
    /// Keep a project indexed until interrupted
    #[command(long_about = "Keep a project indexed until interrupted.\n\n\
        Runs an index pass on the configured interval while local RAG is enabled.\n\
        Stops the supervised retrieval service on Ctrl-C.")]
    Watch {
        /// Project root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Show the chunks extracted from a source file
    Chunk {
        /// Source file to parse
        file: PathBuf,
    },
    /// Gather related code for a chat turn
    #[command(long_about = "Gather related code for a chat turn.\n\n\
        Runs symbol prediction, local semantic search and remote semantic search\n\
        for the given question and optional code selection, and prints what they found.\n\n\
        Examples:\n  lumen recall 'how is the total computed?'\n  \
        lumen recall 'explain' --file src/cart.ts --lines 3:9 --functionality explain")]
    Recall {
        /// The user's question
        text: Option<String>,

        /// File the selected code comes from
        #[arg(long)]
        file: Option<PathBuf>,

        /// Selected lines of --file, 1-based and inclusive (e.g. 10:14)
        #[arg(long, requires = "file", value_parser = parse_line_range)]
        lines: Option<(u32, u32)>,

        /// Command that produced the turn (default: chat)
        #[arg(long, default_value = "chat")]
        functionality: Functionality,

        /// Workspace root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Ask the retrieval service for an inline completion
    #[command(long_about = "Ask the retrieval service for an inline completion.\n\n\
        Sends the file and cursor position to the service. With --manual, symbols\n\
        the model expects at the cursor are resolved first and their definitions\n\
        are attached as extra context.\n\n\
        Examples:\n  lumen complete src/cart.ts --at 12:5\n  \
        lumen complete src/App.tsx --at 40:1 --manual")]
    Complete {
        /// File to complete in
        file: PathBuf,

        /// Cursor position, 1-based LINE:COLUMN (default: end of file)
        #[arg(long, value_parser = parse_position)]
        at: Option<(u32, u32)>,

        /// Treat the request as explicitly invoked and gather context
        #[arg(long)]
        manual: bool,

        /// Workspace root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Embed texts with the retrieval service
    Embed {
        /// Texts to embed
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Check whether the retrieval service is online
    Health,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn parse_line_range(s: &str) -> std::result::Result<(u32, u32), String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got {s}"))?;
    let start: u32 = start.trim().parse().map_err(|_| format!("invalid start line: {start}"))?;
    let end: u32 = end.trim().parse().map_err(|_| format!("invalid end line: {end}"))?;
    if start == 0 || end < start {
        return Err(format!("invalid line range: {s}"));
    }
    Ok((start, end))
}

fn parse_position(s: &str) -> std::result::Result<(u32, u32), String> {
    let (line, column) = s
        .split_once(':')
        .ok_or_else(|| format!("expected LINE:COLUMN, got {s}"))?;
    let line: u32 = line.trim().parse().map_err(|_| format!("invalid line: {line}"))?;
    let column: u32 = column.trim().parse().map_err(|_| format!("invalid column: {column}"))?;
    if line == 0 || column == 0 {
        return Err(format!("invalid position: {s}"));
    }
    Ok((line, column))
}

/// Byte offset of a 1-based `(line, column)` in `document`, clamped to the
/// line and to the document. Columns count characters.
fn byte_offset(document: &str, (line, column): (u32, u32)) -> usize {
    let mut start = 0;
    for (n, text) in document.split_inclusive('\n').enumerate() {
        if n + 1 == line as usize {
            let body = text.trim_end_matches(['\r', '\n']);
            let within = body
                .char_indices()
                .nth(column as usize - 1)
                .map_or(body.len(), |(i, _)| i);
            return start + within;
        }
        start += text.len();
    }
    document.len()
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mlumen\x1b[0m v{version}: related code for every chat turn\n");

        println!("Quick start:");
        println!("  \x1b[36mlumen init\x1b[0m              Create a .lumen.toml config file");
        println!("  \x1b[36mlumen index\x1b[0m             Index the current project");
        println!("  \x1b[36mlumen recall 'question'\x1b[0m Gather context for a question\n");

        println!("All commands:");
        println!("  \x1b[32mindex\x1b[0m     One index pass over a project");
        println!("  \x1b[32mwatch\x1b[0m     Scheduled index passes until Ctrl-C");
        println!("  \x1b[32mchunk\x1b[0m     Chunks extracted from one file");
        println!("  \x1b[32mrecall\x1b[0m    Related code for a chat turn");
        println!("  \x1b[32mcomplete\x1b[0m  Inline completion at a position");
        println!("  \x1b[32membed\x1b[0m     Embedding vectors for texts");
        println!("  \x1b[32mhealth\x1b[0m    Retrieval service status");
        println!("  \x1b[32minit\x1b[0m      Create default configuration\n");
    } else {
        println!("lumen v{version}: related code for every chat turn\n");

        println!("Quick start:");
        println!("  lumen init              Create a .lumen.toml config file");
        println!("  lumen index             Index the current project");
        println!("  lumen recall 'question' Gather context for a question\n");

        println!("All commands:");
        println!("  index     One index pass over a project");
        println!("  watch     Scheduled index passes until Ctrl-C");
        println!("  chunk     Chunks extracted from one file");
        println!("  recall    Related code for a chat turn");
        println!("  complete  Inline completion at a position");
        println!("  embed     Embedding vectors for texts");
        println!("  health    Retrieval service status");
        println!("  init      Create default configuration\n");
    }

    println!("Run 'lumen <command> --help' for details.");
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("LUMEN_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn spinner(message: &str) -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

fn canonical_dir(path: &Path) -> Result<PathBuf> {
    let root = path
        .canonicalize()
        .into_diagnostic()
        .wrap_err(format!("resolving {}", path.display()))?;
    if !root.is_dir() {
        miette::bail!("{} is not a directory", root.display());
    }
    Ok(root)
}

fn retrieval_client(ctx: &Arc<AppContext>) -> RetrievalClient {
    RetrievalClient::new(Arc::new(ServiceManager::new(ctx.clone())))
}

/// Build the code reference for `--file` and `--lines`.
fn selected_code(file: &Path, lines: Option<(u32, u32)>) -> Result<CodeReference> {
    let path = file
        .canonicalize()
        .into_diagnostic()
        .wrap_err(format!("resolving {}", file.display()))?;
    let document = std::fs::read_to_string(&path)
        .into_diagnostic()
        .wrap_err(format!("reading {}", path.display()))?;
    let all: Vec<&str> = document.lines().collect();
    let (start, end) = lines.unwrap_or((1, all.len().max(1) as u32));
    let from = (start as usize - 1).min(all.len());
    let to = (end as usize).min(all.len()).max(from);
    let source = all[from..to].join("\n");

    let language = lumen_core::language::file_language_id(&path);
    let mut code_ref = CodeReference::snippet(language, &path.to_string_lossy(), &source);
    code_ref.document = Some(document.clone());
    code_ref.selected_start_line = start - 1;
    code_ref.selected_end_line = end - 1;
    code_ref.selected_end_column = all.get(to.saturating_sub(1)).map_or(0, |l| l.len() as u32);
    Ok(code_ref)
}

async fn run_index(ctx: Arc<AppContext>, path: &Path, reset: bool, format: OutputFormat) -> Result<()> {
    let root = canonical_dir(path)?;
    let builder = IndexBuilder::new(ctx.clone(), retrieval_client(&ctx));

    let pb = spinner("Starting retrieval service...");
    let progress = pb.clone();
    let subscription = ctx.events().index_progress.subscribe(move |event| {
        if let Some(pb) = &progress {
            pb.set_message(event.message.clone());
        }
    });

    if reset {
        builder.reset(&root).await?;
    }
    let outcome = builder.build(&root, true).await;
    ctx.events().index_progress.unsubscribe(subscription);
    builder.client().manager().shutdown();
    let outcome = outcome.inspect_err(|_| {
        if let Some(pb) = &pb {
            pb.finish_with_message("Failed");
        }
    })?;

    match outcome {
        BuildOutcome::Completed(report) => {
            if let Some(pb) = pb {
                pb.finish_with_message("Done");
            }
            match format {
                OutputFormat::Json => {
                    let value = serde_json::json!({
                        "root": root,
                        "indexedFiles": report.indexed_files,
                        "submittedChunks": report.submitted_chunks,
                        "deletedFiles": report.deleted_files,
                        "failedSubmissions": report.failed_submissions,
                        "skippedFiles": report.skipped_files,
                    });
                    println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
                }
                OutputFormat::Text => {
                    println!("Indexed {}", root.display());
                    println!("  files:     {}", report.indexed_files);
                    println!("  chunks:    {}", report.submitted_chunks);
                    println!("  deleted:   {}", report.deleted_files);
                    println!("  skipped:   {}", report.skipped_files);
                    if report.failed_submissions > 0 {
                        println!("  failed submissions: {}", report.failed_submissions);
                    }
                }
            }
            Ok(())
        }
        BuildOutcome::AlreadyRunning => {
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }
            miette::bail!("an index pass is already running for {}", root.display())
        }
        BuildOutcome::ServiceOffline => {
            if let Some(pb) = pb {
                pb.finish_with_message("Failed");
            }
            miette::bail!(
                help = "check the [service] program in .lumen.toml",
                "the retrieval service could not be started"
            )
        }
    }
}

async fn run_watch(ctx: Arc<AppContext>, path: &Path) -> Result<()> {
    let root = canonical_dir(path)?;
    let builder = IndexBuilder::new(ctx.clone(), retrieval_client(&ctx));
    let subscription = ctx
        .events()
        .index_progress
        .subscribe(|event| eprintln!("[{}] {}", event.project, event.message));

    let scheduler = IndexScheduler::new(builder.clone(), &root);
    scheduler.start();
    if !ctx.local_rag_enabled() {
        eprintln!("local RAG is disabled in the configuration; waiting without indexing");
    }
    eprintln!("Watching {} (Ctrl-C to stop)", root.display());

    tokio::signal::ctrl_c()
        .await
        .into_diagnostic()
        .wrap_err("waiting for Ctrl-C")?;
    scheduler.stop();
    ctx.events().index_progress.unsubscribe(subscription);
    builder.client().manager().shutdown();
    Ok(())
}

fn run_chunk(file: &Path, format: OutputFormat) -> Result<()> {
    let record = lumen_chunker::parse_file(Path::new("."), file)
        .into_diagnostic()
        .wrap_err(format!("{} produced no chunks", file.display()))?;
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&record).into_diagnostic()?);
        }
        OutputFormat::Text => {
            println!("{} ({})", record.file_path, record.language_id);
            println!("  hash: {}", record.hash);
            for block in record.function_blocks() {
                println!(
                    "  fn    {:<32} {}:{}-{}:{}",
                    block.name.as_deref().unwrap_or("<anonymous>"),
                    block.start_position.row + 1,
                    block.start_position.column,
                    block.end_position.row + 1,
                    block.end_position.column,
                );
            }
            for class in &record.classes {
                println!("  class {}", class.name.as_deref().unwrap_or("<anonymous>"));
            }
            if !record.imports.is_empty() {
                println!("  imports: {}", record.imports.lines().count());
            }
        }
    }
    Ok(())
}

async fn run_recall(
    ctx: Arc<AppContext>,
    config: &LumenConfig,
    turn: ChatTurn,
    path: &Path,
    format: OutputFormat,
) -> Result<()> {
    let root = canonical_dir(path)?;
    let client = retrieval_client(&ctx);
    let chat = Arc::new(ChatProvider::from_config(&config.llm)?);
    let resolver = Arc::new(WorkspaceSymbolResolver::with_options(
        Some(root.clone()),
        lumen_index::WalkOptions::from_config(&config.index),
    ));
    let orchestrator = RecallOrchestrator::new(ctx.clone(), client.clone(), chat, resolver, Some(root));

    let pb = spinner("Gathering related code...");
    let handle = orchestrator.begin_turn();
    let cancel = handle.cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let outcome = orchestrator.recall(&turn, &handle).await;
    interrupt.abort();
    client.manager().shutdown();
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let record = match &outcome {
        RecallOutcome::NoRecall => {
            match format {
                OutputFormat::Json => println!("null"),
                OutputFormat::Text => println!("Nothing to recall for this turn."),
            }
            return Ok(());
        }
        RecallOutcome::Aborted(record) | RecallOutcome::Merged(record) => record,
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(record).into_diagnostic()?);
        }
        OutputFormat::Text => {
            if matches!(outcome, RecallOutcome::Aborted(_)) {
                println!("Recall was cancelled; showing what was found so far.\n");
            }
            let local = record.local_refs.as_deref().and_then(related_context);
            let remote = record.remote_refs.as_deref().and_then(additional_related_context);
            if local.is_none() && remote.is_none() {
                println!("No related code found.");
            }
            for section in [local, remote].into_iter().flatten() {
                println!("{section}");
            }
        }
    }
    Ok(())
}

async fn run_complete(
    ctx: Arc<AppContext>,
    config: &LumenConfig,
    file: &Path,
    at: Option<(u32, u32)>,
    trigger: CompletionTrigger,
    path: &Path,
    format: OutputFormat,
) -> Result<()> {
    let root = canonical_dir(path)?;
    let file_path = file
        .canonicalize()
        .into_diagnostic()
        .wrap_err(format!("resolving {}", file.display()))?;
    let document = std::fs::read_to_string(&file_path)
        .into_diagnostic()
        .wrap_err(format!("reading {}", file_path.display()))?;
    let position = at.map_or(document.len(), |at| byte_offset(&document, at));

    let client = retrieval_client(&ctx);
    let chat = Arc::new(ChatProvider::from_config(&config.llm)?);
    let resolver = Arc::new(WorkspaceSymbolResolver::with_options(
        Some(root.clone()),
        lumen_index::WalkOptions::from_config(&config.index),
    ));
    let completer = InlineCompleter::new(ctx, client.clone(), chat, resolver, Some(root));
    let request = InlineRequest {
        language_id: lumen_core::language::file_language_id(&file_path).to_string(),
        document,
        file_path,
        position,
        trigger,
    };

    let pb = spinner("Requesting completion...");
    let cancel = tokio_util::sync::CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let suggestion = completer.complete(&request, &cancel).await;
    interrupt.abort();
    client.manager().shutdown();
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&suggestion).into_diagnostic()?);
        }
        OutputFormat::Text => match suggestion {
            Some(text) => println!("{text}"),
            None => println!("No suggestion."),
        },
    }
    Ok(())
}

async fn run_embed(ctx: Arc<AppContext>, texts: Vec<String>, format: OutputFormat) -> Result<()> {
    let client = retrieval_client(&ctx);
    let items = client.embed(texts).await;
    client.manager().shutdown();
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&items).into_diagnostic()?);
        }
        OutputFormat::Text => {
            if items.is_empty() {
                println!("No embeddings returned.");
            }
            for item in &items {
                println!("  [{}] {} dimensions", item.index, item.embedding.len());
            }
        }
    }
    Ok(())
}

async fn run_health(ctx: Arc<AppContext>, format: OutputFormat) -> Result<()> {
    let client = retrieval_client(&ctx);
    let status = client.health().await;
    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({"online": status.online, "port": status.port});
            println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
        }
        OutputFormat::Text => match (status.online, status.port) {
            (true, Some(port)) => println!("Retrieval service online on port {port}"),
            (_, Some(port)) => println!("Retrieval service offline (last port {port})"),
            _ => println!("Retrieval service offline"),
        },
    }
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Lumen configuration
# See https://github.com/lumen-rag/lumen for documentation

[recall]
# Enables scheduled indexing and local search during recall
# local_rag = true
# Cap on symbol prediction calls, in milliseconds
# predict_timeout_ms = 5000

[index]
# Seconds between scheduled index passes
# interval_secs = 900
# Delay before the first pass after local RAG is re-enabled
# rearm_delay_secs = 5
# Files per chunk submission
# batch_files = 10
# Directories with more entries than this are skipped
# max_folder_entries = 100
# Project-level ignore file, read after .gitignore
# ignore_file = ".lumenignore"
# extra_ignored_folders = ["vendor"]

[service]
# Executable that runs the retrieval service
# program = "lumen-agent"
# args = []
# Version the health endpoint must report
# version = "1.1.0"
# start_timeout_ms = 3000
# max_port_retries = 5
# env = "prd"

[llm]
# provider = "openai"  # or "ollama"
# model = "gpt-4o-mini"
# api_key = "sk-..."
# base_url = "http://127.0.0.1:11434"

[storage]
# Global storage root (default: platform data dir + "lumen")
# dir = "/var/lib/lumen"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    let command = match cli.command {
        None => {
            print_welcome(use_color);
            return Ok(());
        }
        Some(Command::Init) => {
            let path = Path::new(".lumen.toml");
            if path.exists() {
                miette::bail!(".lumen.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .lumen.toml with default configuration");
            return Ok(());
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "lumen", &mut std::io::stdout());
            return Ok(());
        }
        Some(Command::Chunk { file }) => return run_chunk(&file, cli.format),
        Some(command) => command,
    };

    let config = LumenConfig::discover(cli.config.as_deref())?;
    tracing::debug!(format = %cli.format, provider = %config.llm.provider, "configuration loaded");
    let ctx = Arc::new(AppContext::new(config.clone())?);

    match command {
        Command::Index { path, reset } => run_index(ctx, &path, reset, cli.format).await?,
        Command::Watch { path } => run_watch(ctx, &path).await?,
        Command::Recall {
            text,
            file,
            lines,
            functionality,
            path,
        } => {
            let code_refs = match &file {
                Some(file) => vec![selected_code(file, lines)?],
                None => Vec::new(),
            };
            let turn = ChatTurn {
                content: text,
                code_refs,
                mode: ChatMode::Normal,
                functionality,
            };
            run_recall(ctx, &config, turn, &path, cli.format).await?;
        }
        Command::Complete {
            file,
            at,
            manual,
            path,
        } => {
            let trigger = if manual {
                CompletionTrigger::Manual
            } else {
                CompletionTrigger::Automatic
            };
            run_complete(ctx, &config, &file, at, trigger, &path, cli.format).await?;
        }
        Command::Embed { texts } => run_embed(ctx, texts, cli.format).await?,
        Command::Health => run_health(ctx, cli.format).await?,
        Command::Init | Command::Completions { .. } | Command::Chunk { .. } => {}
    }

    Ok(())
}
