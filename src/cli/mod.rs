//! CLI surface: argument parsing and top-level dispatch. `main.rs` calls
//! `cli::run()` and turns its `Result` into a process exit code.

pub mod chat;

use clap::{error::ErrorKind, Parser, Subcommand};

use mogzi_agent::error::{AgentError, Result};
use mogzi_agent::session::SessionStore;

#[derive(Parser)]
#[command(name = "mogzi-agent")]
#[command(version)]
#[command(about = "Terminal agent for streaming LLM conversations with sandboxed local tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Resume an existing session by id, id suffix, or name
        #[arg(long)]
        session: Option<String>,
        /// Submit the initial prompt immediately instead of waiting on Enter
        #[arg(short = 'a', long = "auto-submit")]
        auto_submit: bool,
    },
    /// Session management
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List recent sessions
    List,
    /// Show a session's header fields
    Info {
        /// Session id, id suffix, or name
        id_or_name: String,
    },
    /// Rename the current or a named session
    Rename {
        /// Session id, id suffix, or name
        id_or_name: String,
        /// New name
        new_name: String,
    },
}

/// Parse `argv` and run the requested command. Returns `Ok(())` for a normal
/// exit and `Err` for anything the caller should report and exit `1` for
/// (bad arguments, an unresolvable session name, a transport failure).
pub async fn run() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print().ok();
            std::process::exit(0);
        }
        Err(e) => {
            e.print().ok();
            return Err(AgentError::BadArgument(e.to_string()));
        }
    };

    let chats_dir = dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".mogzi")
        .join("chats");
    let store = std::sync::Arc::new(SessionStore::new(chats_dir));

    match cli.command {
        Some(Commands::Chat { session, auto_submit }) => {
            chat::run_chat(&store, session.as_deref(), auto_submit).await
        }
        Some(Commands::Session { command }) => run_session_command(&store, command).await,
        None => chat::run_chat(&store, None, false).await,
    }
}

async fn run_session_command(store: &SessionStore, command: SessionCommands) -> Result<()> {
    match command {
        SessionCommands::List => {
            let limit = mogzi_agent::config::Config::get().session_list_limit;
            let headers = store.list(limit).await?;
            if headers.is_empty() {
                println!("no sessions yet");
            }
            for header in headers {
                println!(
                    "{}  {:<20}  {}",
                    header.id,
                    header.name,
                    header.last_modified_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            Ok(())
        }
        SessionCommands::Info { id_or_name } => {
            let id = store.resolve(&id_or_name).await?;
            let session = store.load(&id).await?;
            println!("id:            {}", session.id);
            println!("name:          {}", session.name);
            println!("created:       {}", session.created_at);
            println!("last modified: {}", session.last_modified_at);
            println!("messages:      {}", session.history.len());
            Ok(())
        }
        SessionCommands::Rename { id_or_name, new_name } => {
            let id = store.resolve(&id_or_name).await?;
            let mut session = store.load(&id).await?;
            session.rename(new_name);
            store.save(&session).await?;
            Ok(())
        }
    }
}
