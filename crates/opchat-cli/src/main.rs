//! opchat - interactive console for streaming chat agents

mod session;

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::broadcast;

use opchat_client::{
    ChatClient, ChatConfig, ChatEvent, HttpTransport, MemoryStore, SessionStore, Transport,
};

/// opchat - talk to a streaming chat agent from the terminal
#[derive(Parser, Debug)]
#[command(name = "opchat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Streaming endpoint URL
    #[arg(short, long)]
    endpoint: String,

    /// Agent to converse with
    #[arg(short, long)]
    agent_id: String,

    /// Bearer token for the endpoint
    #[arg(short, long)]
    token: Option<String>,

    /// Display name sent on the first turn of a new conversation
    #[arg(short, long)]
    name: Option<String>,

    /// Route turns to the agent's test environment
    #[arg(long)]
    test: bool,

    /// Do not persist or resume session identity
    #[arg(long)]
    ephemeral: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("opchat=debug")
            .init();
    }

    let mut transport = HttpTransport::new(&args.endpoint);
    if let Some(ref token) = args.token {
        transport = transport.with_bearer(token);
    }

    let store: Arc<dyn SessionStore> = if args.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        match session::FileStore::open_default() {
            Some(store) => Arc::new(store),
            None => {
                eprintln!("No config directory available; running ephemeral.");
                Arc::new(MemoryStore::new())
            }
        }
    };

    let client = ChatClient::new(
        ChatConfig::new(&args.agent_id),
        Arc::new(transport) as Arc<dyn Transport>,
        store,
    );
    client.load_session().await;

    eprintln!("opchat ({})", args.agent_id);
    if let Some(thread_id) = client.thread_id() {
        eprintln!("resumed thread {}", thread_id);
    }
    eprintln!("Type /help for commands.\n");

    run_interactive(&client, &args).await
}

async fn run_interactive(client: &ChatClient, args: &Args) -> anyhow::Result<()> {
    let mut rx = client.subscribe();

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

        if let Some(command) = input.strip_prefix('/') {
            match command {
                "new" => {
                    client.reset().await;
                    println!("Started a new conversation.");
                }
                "id" => {
                    println!("thread: {}", client.thread_id().as_deref().unwrap_or("-"));
                    println!("user:   {}", client.user_id().as_deref().unwrap_or("-"));
                }
                "help" => {
                    println!("/new     start a new conversation");
                    println!("/id      show session identifiers");
                    println!("/exit    quit");
                    println!("Ctrl-C cancels the turn in progress.");
                }
                "exit" | "quit" => break,
                other => {
                    println!("Unknown command: /{}", other);
                    println!("Type /help for available commands.");
                }
            }
            continue;
        }

        // The turn-end event lands just before the previous turn's task
        // releases the single-flight slot; wait it out so this send is
        // never silently dropped.
        client.wait_for_idle().await;
        client.send(input, args.name.as_deref(), args.test);
        stream_turn(client, &mut rx).await?;
    }

    Ok(())
}

/// Print one turn as it streams: follow the paced reveal tick by tick,
/// then flush the rest of the committed message at the end.
async fn stream_turn(
    client: &ChatClient,
    rx: &mut broadcast::Receiver<ChatEvent>,
) -> anyhow::Result<()> {
    let mut printed = 0usize;
    let mut committed: Option<String> = None;
    let mut ticker = tokio::time::interval(Duration::from_millis(30));

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(ChatEvent::MessageCommitted { message }) => {
                    committed = Some(message.content);
                }
                Ok(ChatEvent::TurnEnd) => {
                    if let Some(content) = committed.take() {
                        print_from(&content, printed)?;
                    }
                    println!();
                    return Ok(());
                }
                Ok(ChatEvent::Cancelled) => {
                    println!("\n[cancelled]");
                    return Ok(());
                }
                Ok(ChatEvent::Error { message }) => {
                    eprintln!("\nError: {}", message);
                    return Ok(());
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("event stream lagged, skipped {skipped}");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            _ = ticker.tick() => {
                let shown = client.displayed_text();
                let count = shown.chars().count();
                if count > printed {
                    print_from(&shown, printed)?;
                    printed = count;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                client.cancel();
            },
        }
    }
}

/// Print the characters of `text` from char offset `from` on.
fn print_from(text: &str, from: usize) -> io::Result<()> {
    let suffix: String = text.chars().skip(from).collect();
    print!("{}", suffix);
    io::stdout().flush()
}
