use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dotenv::dotenv;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tokio::net::TcpListener;
use tracing::info;

use documate::api::{create_api, AppState};
use documate::client::ApiClient;
use documate::commands::{print_help, CommandHandler};
use documate::config::{ClientConfig, ProviderConfig, ServerConfig};
use documate::database::Database;
use documate::document::DocumentProcessor;
use documate::logging;
use documate::providers::{CompletionProvider, GeminiProvider};
use documate::storage::PdfStorage;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Chat with your PDF documents", long_about = None)]
struct Args {
    /// Backend URL used by the client commands
    #[arg(long, env = "DOCUMATE_API_URL")]
    api_url: Option<String>,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Interactive document shell (default)
    Shell,
    List,
    Show { document_id: String },
    Upload { path: PathBuf },
    Ask {
        document_id: String,
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    Search {
        document_id: String,
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    Agent {
        document_id: String,
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    colored::control::set_override(true);
    dotenv().ok();

    let args = Args::parse();
    logging::init(args.verbose);

    match args.command.clone().unwrap_or(Command::Shell) {
        Command::Serve { port } => run_server(port).await,
        command => {
            let config = ClientConfig::resolve(args.api_url.as_deref())?;
            let mut handler = CommandHandler::new(ApiClient::new(config));
            run_client(&mut handler, command).await
        }
    }
}

async fn run_server(port: Option<u16>) -> Result<()> {
    let provider_config = ProviderConfig::from_env()?;
    let mut config = ServerConfig::from_env()?;
    if let Some(port) = port {
        config.port = port;
    }
    if config.user_id.is_none() {
        println!(
            "{}",
            "⚠️  DUMMY_USER_ID is not set; document endpoints will fail until it is.".yellow()
        );
    }

    let provider = Arc::new(GeminiProvider::new(provider_config));
    let model = provider.get_model_info().await?;
    info!(%model, "Gemini provider ready");
    let db = Database::new(&config.database_path)
        .await
        .with_context(|| format!("opening database at {}", config.database_path.display()))?;
    let storage = PdfStorage::new(config.storage_dir.clone());
    let processor = DocumentProcessor::pdf(config.retrieval.chunking);

    let state = AppState::new(provider, db, storage, processor, &config);
    let app = create_api(state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "DocuMate API listening");
    println!("🚀 DocuMate API running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_client(handler: &mut CommandHandler, command: Command) -> Result<()> {
    let result = match command {
        Command::Shell => return run_shell(handler).await,
        Command::List => handler.list().await,
        Command::Show { document_id } => handler.open(&document_id).await,
        Command::Upload { path } => handler.upload(&path).await,
        Command::Ask {
            document_id,
            question,
        } => match handler.open(&document_id).await {
            Ok(()) => handler.ask(&question.join(" ")).await,
            Err(e) => Err(e),
        },
        Command::Search { document_id, query } => match handler.open(&document_id).await {
            Ok(()) => handler.search(&query.join(" ")).await,
            Err(e) => Err(e),
        },
        Command::Agent { document_id, query } => match handler.open(&document_id).await {
            Ok(()) => handler.agent(&query.join(" ")).await,
            Err(e) => Err(e),
        },
        Command::Serve { .. } => Err("serve runs on its own, not from the client".to_string()),
    };
    result.map_err(|e| anyhow!(e))
}

async fn run_shell(handler: &mut CommandHandler) -> Result<()> {
    println!("\n📄 DocuMate");
    println!("Connected to {}", handler.workspace().api().base_url());
    println!("Type 'help' for available commands\n");

    let mut rl = Editor::<(), DefaultHistory>::new()?;

    loop {
        let readline = rl.readline(&"> ".bright_green().to_string());
        match readline {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);

                match input.to_lowercase().as_str() {
                    "exit" | "quit" => {
                        println!("👋 Goodbye!");
                        break;
                    }
                    "help" => print_help(),
                    _ => {
                        if let Err(e) = handler.handle_command(input).await {
                            println!("{}", e.red());
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {}", err);
                break;
            }
        }
    }

    Ok(())
}
