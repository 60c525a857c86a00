//! twig - branching chat in the terminal

mod commands;
mod config;
mod responder;
mod session;
mod utils;

use clap::Parser;
use futures::StreamExt;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use twig_engine::{ChatMessage, Conversation, ConversationEvent, SharedConversation};

use responder::{EchoResponder, Responder};
use session::SessionManager;

/// twig - branching chat with editable history
#[derive(Parser, Debug)]
#[command(name = "twig")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run in non-interactive mode with a single message
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// System prompt for new conversations
    #[arg(long)]
    system_prompt: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Resume a previous session by ID
    #[arg(long)]
    resume: Option<String>,

    /// List saved sessions
    #[arg(long)]
    sessions: bool,

    /// Delete a saved session by ID
    #[arg(long)]
    delete_session: Option<String>,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("twig=debug")
            .with_writer(io::stderr)
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

    let cfg = config::Config::load();
    let sessions_dir = cfg.sessions_dir();

    // List sessions and exit
    if args.sessions {
        return list_sessions(&sessions_dir);
    }

    if let Some(ref id) = args.delete_session {
        match SessionManager::delete(&sessions_dir, id) {
            Ok(()) => println!("Deleted session {}", id),
            Err(e) => {
                eprintln!("Error deleting session: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // CLI args take precedence over config
    let system_prompt = args
        .system_prompt
        .or(cfg.system_prompt.clone())
        .unwrap_or_else(|| config::DEFAULT_SYSTEM_PROMPT.to_string());

    let responder = EchoResponder::new(
        cfg.stream_chunk_chars(),
        Duration::from_millis(cfg.stream_delay_ms()),
    );

    let (conversation, mut session) = match args.resume {
        Some(ref id) => match SessionManager::load(&sessions_dir, id) {
            Ok((session, Some(snapshot))) => {
                let conversation = Conversation::from_snapshot(snapshot)?;
                println!(
                    "Resuming session {} ({} messages)",
                    id,
                    conversation.store().len()
                );
                (conversation, Some(session))
            }
            Ok((session, None)) => {
                println!("Session {} has no saved messages; starting fresh", id);
                (new_conversation(id, &system_prompt)?, Some(session))
            }
            Err(e) => {
                eprintln!("Error loading session: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            let conversation = new_conversation(&id, &system_prompt)?;
            let session = match SessionManager::new(&sessions_dir, &id) {
                Ok(s) => Some(s),
                Err(e) => {
                    tracing::warn!("Session will not be saved: {}", e);
                    None
                }
            };
            (conversation, session)
        }
    };

    let conversation = SharedConversation::new(conversation);
    persist(session.as_mut(), &conversation);

    // Non-interactive mode
    if let Some(command) = args.command {
        return run_command(&conversation, &responder, session.as_mut(), &command).await;
    }

    run_interactive(&conversation, &responder, session.as_mut(), &system_prompt).await
}

/// Start a conversation whose root is the system prompt
fn new_conversation(id: &str, system_prompt: &str) -> twig_engine::Result<Conversation> {
    let mut conversation = Conversation::with_id(id);
    conversation.add_message(ChatMessage::system(system_prompt))?;
    Ok(conversation)
}

/// Append the current state to the session file, if there is one
fn persist(session: Option<&mut SessionManager>, conversation: &SharedConversation) {
    if let Some(s) = session {
        if let Err(e) = s.save_snapshot(&conversation.snapshot()) {
            tracing::warn!("Failed to save session {}: {}", s.id(), e);
        }
    }
}

async fn run_command(
    conversation: &SharedConversation,
    responder: &dyn Responder,
    session: Option<&mut SessionManager>,
    command: &str,
) -> anyhow::Result<()> {
    println!("twig> {}", command);
    println!();

    conversation.write(|c| c.add_message(ChatMessage::user(command)))?;
    let result = stream_reply(conversation, responder, CancellationToken::new()).await;
    persist(session, conversation);
    result
}

async fn run_interactive(
    conversation: &SharedConversation,
    responder: &dyn Responder,
    mut session: Option<&mut SessionManager>,
    system_prompt: &str,
) -> anyhow::Result<()> {
    // Show minimal startup info (only if TTY)
    if io::IsTerminal::is_terminal(&io::stderr()) {
        match session {
            Some(ref s) => eprintln!("twig session: {}", s.id().get(..8).unwrap_or(s.id())),
            None => eprintln!("twig"),
        }
        eprintln!("Type /help for commands. Ctrl-C stops a reply, Ctrl-D exits.");
        eprintln!();
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        // Handle slash commands
        let session_path = session.as_deref().map(|s| s.path().to_path_buf());
        if let Some(result) = commands::execute_command(input, conversation, session_path.as_deref()) {
            match result {
                commands::CommandResult::Message(msg) => {
                    println!("{}", msg);
                }
                commands::CommandResult::Changed(msg) => {
                    persist(session.as_deref_mut(), conversation);
                    println!("{}", msg);
                }
                commands::CommandResult::Respond(msg) => {
                    println!("{}", msg);
                    println!();
                    reply_interactively(conversation, responder).await;
                    persist(session.as_deref_mut(), conversation);
                }
                commands::CommandResult::Clear => {
                    conversation.write(|c| {
                        c.clear();
                        c.add_message(ChatMessage::system(system_prompt))
                    })?;
                    persist(session.as_deref_mut(), conversation);
                    println!("Cleared conversation.");
                }
                commands::CommandResult::Exit => {
                    break;
                }
                commands::CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            println!();
            continue;
        }

        println!();

        if let Err(e) = conversation.write(|c| c.add_message(ChatMessage::user(input))) {
            eprintln!("Error: {}", e);
            continue;
        }
        persist(session.as_deref_mut(), conversation);

        reply_interactively(conversation, responder).await;
        persist(session.as_deref_mut(), conversation);

        println!();
    }

    Ok(())
}

/// Stream a reply, letting Ctrl-C stop it early
async fn reply_interactively(conversation: &SharedConversation, responder: &dyn Responder) {
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    if let Err(e) = stream_reply(conversation, responder, cancel.clone()).await {
        eprintln!("Error: {}", e);
    }
    interrupt.abort();

    if cancel.is_cancelled() {
        println!("[stopped]");
    }
}

/// Stream a reply into the conversation and echo it to stdout.
///
/// Streams into the active target if one is armed (regeneration), otherwise
/// starts a new assistant message at the end of the active path. Partial text
/// is kept when `cancel` fires.
async fn stream_reply(
    conversation: &SharedConversation,
    responder: &dyn Responder,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let context = conversation.write(|c| -> twig_engine::Result<Vec<ChatMessage>> {
        let target = match c.streaming_message_id() {
            Some(id) => id.clone(),
            None => c.start_streaming()?,
        };
        Ok(c.messages_for_context()
            .into_iter()
            .filter(|n| n.id != target)
            .map(|n| n.message.clone())
            .collect())
    })?;

    let printer = spawn_printer(conversation);

    let mut stream = match responder.respond(context, cancel.clone()).await {
        Ok(stream) => stream,
        Err(e) => {
            conversation.write(|c| c.finish_streaming());
            printer.abort();
            return Err(e);
        }
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            chunk = stream.next() => match chunk {
                Some(delta) => conversation.write(|c| c.append_to_streaming(&delta)),
                None => break,
            }
        }
    }
    conversation.write(|c| c.finish_streaming());

    // The printer stops on StreamFinished
    let mut printer = printer;
    if tokio::time::timeout(Duration::from_secs(1), &mut printer).await.is_err() {
        tracing::warn!("Reply printer did not finish");
        printer.abort();
    }
    Ok(())
}

/// Print streamed text as it arrives until the stream finishes
fn spawn_printer(conversation: &SharedConversation) -> tokio::task::JoinHandle<()> {
    let mut receiver = conversation.subscribe();
    tokio::spawn(async move {
        let mut printed = 0;
        loop {
            match receiver.recv().await {
                Ok(ConversationEvent::StreamUpdated { content, .. }) => {
                    // Use chars for proper Unicode handling
                    let new_text: String = content.chars().skip(printed).collect();
                    print!("{}", new_text);
                    io::stdout().flush().ok();
                    printed += new_text.chars().count();
                }
                Ok(ConversationEvent::StreamFinished { .. }) => {
                    println!();
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "printer lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn list_sessions(dir: &Path) -> anyhow::Result<()> {
    match SessionManager::list_sessions(dir) {
        Ok(sessions) => {
            if sessions.is_empty() {
                println!("No saved sessions found.");
                println!("Sessions are stored in: {}", dir.display());
            } else {
                println!("Saved sessions:\n");
                println!(
                    "{:<38} {:<20} {:<6} {:<6} Working Dir",
                    "ID", "Created", "Msgs", "Saves"
                );
                println!("{}", "-".repeat(96));
                for s in sessions {
                    println!(
                        "{:<38} {:<20} {:<6} {:<6} {}",
                        s.id,
                        s.created_at_display(),
                        s.message_count,
                        s.snapshot_count,
                        s.working_dir
                    );
                }
                println!("\nResume with: twig --resume <session-id>");
            }
        }
        Err(e) => {
            eprintln!("Error listing sessions: {}", e);
        }
    }
    Ok(())
}
