//! confab - interactive chat client for confab agent servers

mod commands;
mod config;
mod render;

use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast;

use commands::Command;
use confab_proto::ConversationSummary;
use confab_session::{HttpBackend, SessionDirectory};

/// confab - talk to a streaming agent server
#[derive(Parser, Debug)]
#[command(name = "confab")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Agent server base URL
    #[arg(short, long)]
    server: Option<String>,

    /// Select a conversation on startup
    #[arg(long)]
    conversation: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

const DEFAULT_SERVER: &str = "http://localhost:8000/agent";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("confab=debug")
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Load config file; CLI args take precedence
    let cfg = config::Config::load();
    let server = args
        .server
        .or(cfg.server)
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());

    let backend = HttpBackend::connect(&server)?;
    let directory = SessionDirectory::new(Arc::new(backend));

    // Print session events as they arrive
    let mut renderer = render::Renderer::new(directory.clone());
    let mut events = directory.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => renderer.handle(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "renderer lagged behind session events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    if let Some(ref id) = args.conversation {
        directory.select_conversation(id).await?;
    }

    println!("confab — connected to {}", server);
    println!("Type a message to chat, /help for commands.");

    run_repl(directory).await
}

async fn run_repl(directory: SessionDirectory) -> anyhow::Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut listing: Vec<ConversationSummary> = Vec::new();

    loop {
        print!("› ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(command) = commands::parse_line(&line) else {
            continue;
        };

        match command {
            Command::Send(text) => {
                // First message without a selection starts a conversation.
                if directory.selected().is_none() {
                    if let Err(e) = directory.new_conversation().await {
                        eprintln!("error: {}", e);
                        continue;
                    }
                }
                if let Err(e) = directory.send_message(&text).await {
                    eprintln!("error: {}", e);
                }
            }

            Command::List => match directory.list_conversations().await {
                Ok(conversations) => {
                    if conversations.is_empty() {
                        println!("No conversations yet — /new starts one.");
                    }
                    let selected = directory.selected();
                    for (i, conv) in conversations.iter().enumerate() {
                        let marker = if selected.as_deref() == Some(conv.context_id.as_str()) {
                            "*"
                        } else {
                            " "
                        };
                        let streaming = if conv.is_streaming { "  (streaming)" } else { "" };
                        println!(
                            "{} {:>2}. {}  [{}]{}",
                            marker,
                            i + 1,
                            conv.title,
                            conv.context_id,
                            streaming
                        );
                    }
                    listing = conversations;
                }
                Err(e) => eprintln!("error: {}", e),
            },

            Command::New => match directory.new_conversation().await {
                Ok(summary) => println!("Started {}.", summary.context_id),
                Err(e) => eprintln!("error: {}", e),
            },

            Command::Select(target) => {
                let id = resolve_target(&listing, &target);
                if let Err(e) = directory.select_conversation(&id).await {
                    eprintln!("error: {}", e);
                }
            }

            Command::Delete(target) => {
                let id = match target {
                    Some(t) => Some(resolve_target(&listing, &t)),
                    None => directory.selected(),
                };
                match id {
                    Some(id) => match directory.delete_conversation(&id).await {
                        Ok(()) => println!("Deleted {}.", id),
                        Err(e) => eprintln!("error: {}", e),
                    },
                    None => println!("Nothing selected to delete."),
                }
            }

            Command::Cancel => match directory.cancel_task().await {
                Ok(task) => println!("Canceled {}.", task.id),
                Err(e) => eprintln!("error: {}", e),
            },

            Command::Resubscribe => {
                if let Err(e) = directory.resubscribe().await {
                    eprintln!("error: {}", e);
                }
            }

            Command::Help => println!("{}", commands::help_message()),

            Command::Exit => break,

            Command::Unknown(cmd) => {
                println!("Unknown command: /{} — /help lists commands.", cmd);
            }
        }
    }
    Ok(())
}

/// Resolve a user-supplied target to a conversation id: a 1-based index
/// into the last listing, or a raw id
fn resolve_target(listing: &[ConversationSummary], target: &str) -> String {
    if let Ok(index) = target.parse::<usize>() {
        if index >= 1 && index <= listing.len() {
            return listing[index - 1].context_id.clone();
        }
    }
    target.to_string()
}
