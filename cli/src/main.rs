mod console;

use anyhow::Context;
use clap::Parser;
use config::{ParseMode, PathManager, Settings, TurnConfig, load_env_file};
use conversation::{ContextManager, ConversationId};
use courier_core::{Orchestrator, OutputChannel, TurnOutcome};
use llm::BackendRegistry;

use clap_derive::{Parser, Subcommand};
use console::ConsoleChannel;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "courier", author, version, about = "Relay a conversation to an LLM backend", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Cmd>,

    /// Settings file (defaults to courier.toml in the config directory)
    #[arg(long, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Backend key: openai, ollama, gemini, koboldcpp
    #[arg(long)]
    backend: Option<String>,

    /// Backend base URL (defaults to the backend's usual host)
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    api_key: Option<String>,

    #[arg(long)]
    system_prompt: Option<String>,

    /// Request timeout in seconds, 0 for none
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[arg(long)]
    max_context_tokens: Option<usize>,

    #[arg(long, short)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Cmd {
    /// Interactive chat (default)
    Chat,
    /// List the supported backends
    Backends,
    /// List the models a backend serves
    Models,
    /// Check whether a backend is reachable
    Probe,
    /// Show where settings are read from and what they resolve to
    Settings,
}

impl Args {
    /// Layers command-line values over file and environment settings.
    fn settings(&self) -> anyhow::Result<Settings> {
        let settings = match &self.config {
            Some(path) => Settings::from_path(path)?,
            None => Settings::load()?,
        };
        let mut settings = settings.apply_env()?;

        let overlay = |target: &mut Option<String>, value: &Option<String>| {
            if value.is_some() {
                *target = value.clone();
            }
        };
        overlay(&mut settings.backend, &self.backend);
        overlay(&mut settings.host, &self.host);
        overlay(&mut settings.model, &self.model);
        overlay(&mut settings.api_key, &self.api_key);
        overlay(&mut settings.system_prompt, &self.system_prompt);
        if self.timeout_secs.is_some() {
            settings.timeout_secs = self.timeout_secs;
        }
        if self.max_context_tokens.is_some() {
            settings.max_context_tokens = self.max_context_tokens;
        }
        Ok(settings)
    }
}

fn setup_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Fills in the backend's default host when none is configured.
fn with_default_host(mut settings: Settings, registry: &BackendRegistry) -> Settings {
    if settings.host.is_none() {
        if let Some(backend) = settings.backend.as_deref().and_then(|b| registry.get(b).ok()) {
            settings.host = backend.descriptor().default_host.map(str::to_string);
        }
    }
    settings
}

fn print_backends(registry: &BackendRegistry) {
    for descriptor in registry.descriptors() {
        println!(
            "{:<10} {:<10} {:<45} {}",
            descriptor.key,
            descriptor.display_name,
            descriptor.default_host.unwrap_or("-"),
            if descriptor.requires_api_key { "api key required" } else { "" }
        );
    }
}

fn print_status_bar(turn: &TurnConfig) {
    let terminal_width: usize = 80;
    let status = format!(" {} • {} ", turn.backend, turn.model);
    let padding = terminal_width.saturating_sub(status.chars().count() + 2);
    let left_pad = padding / 2;
    let right_pad = padding - left_pad;

    println!("┌{}┐", "─".repeat(terminal_width - 2));
    println!("│{}{}{}│", " ".repeat(left_pad), status, " ".repeat(right_pad));
    println!("└{}┘", "─".repeat(terminal_width - 2));
}

// Application state
struct AppState {
    orchestrator: Orchestrator,
    turn: TurnConfig,
    conversation: ConversationId,
}

// Slash command parsing and handling
mod commands {
    use super::*;

    pub enum Command {
        Quit,
        Help,
        Clear,
        System(Option<String>),
        Backend(String),
        Model(String),
        Models,
        Parse(ParseMode),
        Timeout(u64),
    }

    pub enum CommandResult {
        Continue,
        Exit,
    }

    impl Command {
        pub fn parse(input: &str) -> Result<Self, String> {
            let Some(rest) = input.strip_prefix('/') else {
                return Err("Not a command".to_string());
            };
            let (name, arg) = match rest.split_once(char::is_whitespace) {
                Some((name, arg)) => (name, arg.trim()),
                None => (rest, ""),
            };

            match name {
                "quit" | "exit" => Ok(Command::Quit),
                "help" => Ok(Command::Help),
                "clear" => Ok(Command::Clear),
                "system" => Ok(Command::System((!arg.is_empty()).then(|| arg.to_string()))),
                "backend" if !arg.is_empty() => Ok(Command::Backend(arg.to_lowercase())),
                "backend" => Err("Usage: /backend <key>".to_string()),
                "model" if !arg.is_empty() => Ok(Command::Model(arg.to_string())),
                "model" => Err("Usage: /model <name>".to_string()),
                "models" => Ok(Command::Models),
                "parse" => arg.parse().map(Command::Parse).map_err(|e: config::ConfigError| e.to_string()),
                "timeout" => arg
                    .parse()
                    .map(Command::Timeout)
                    .map_err(|_| "Usage: /timeout <seconds> (0 for none)".to_string()),
                _ => Err(format!("Unknown command: /{}. Type /help for available commands.", name)),
            }
        }

        pub async fn execute(self, state: &mut AppState) -> CommandResult {
            match self {
                Command::Quit => {
                    println!("Goodbye!");
                    return CommandResult::Exit;
                }
                Command::Help => print_help(),
                Command::Clear => {
                    state
                        .orchestrator
                        .contexts()
                        .reset(&state.conversation, state.turn.system_prompt.as_deref());
                    println!("Conversation history cleared.");
                }
                Command::System(prompt) => {
                    state.orchestrator.contexts().update_system_prompt(prompt.as_deref());
                    match &prompt {
                        Some(p) => println!("System prompt set to: {}", p),
                        None => println!("System prompt cleared."),
                    }
                    state.turn.system_prompt = prompt;
                }
                Command::Backend(key) => match state.orchestrator.registry().get(&key) {
                    Ok(backend) => {
                        let descriptor = backend.descriptor();
                        state.turn.backend = descriptor.key.to_string();
                        if let Some(host) = descriptor.default_host {
                            state.turn.host = host.to_string();
                        }
                        println!("Switched to {} at {}", descriptor.display_name, state.turn.host);
                        println!("(Use /models to see what it serves, then /model <name>)");
                    }
                    Err(e) => eprintln!("{}", e),
                },
                Command::Model(model) => {
                    state.turn.model = model;
                    println!("Model set to {}", state.turn.model);
                }
                Command::Models => {
                    let models = state
                        .orchestrator
                        .registry()
                        .list_models(&state.turn.backend, &state.turn.host, state.turn.api_key.as_deref())
                        .await;
                    if models.is_empty() {
                        println!("No models found (is {} reachable?)", state.turn.host);
                    }
                    for model in models {
                        println!("  {}", model);
                    }
                }
                Command::Parse(mode) => {
                    state.turn.parse_mode = mode;
                    println!("Parse mode set to {}", mode);
                }
                Command::Timeout(secs) => {
                    state.turn.timeout_secs = secs;
                    if secs == 0 {
                        println!("Requests will wait indefinitely.");
                    } else {
                        println!("Request timeout set to {}s", secs);
                    }
                }
            }
            println!();
            CommandResult::Continue
        }
    }

    fn print_help() {
        println!("Available commands:");
        println!("  /quit, /exit           - Exit the chat");
        println!("  /clear                 - Clear conversation history");
        println!("  /system [prompt]       - Set or clear the system prompt");
        println!("  /backend <key>         - Switch backend (openai, ollama, gemini, koboldcpp)");
        println!("  /models                - List models of the current backend");
        println!("  /model <name>          - Switch model");
        println!("  /parse <mode>          - Reply markup: markdown, html, none");
        println!("  /timeout <seconds>     - Request timeout, 0 for none");
        println!("  /help                  - Show this help message");
        println!("  Ctrl+D                 - Exit the chat");
    }
}

async fn chat(registry: Arc<BackendRegistry>, turn: TurnConfig) -> anyhow::Result<()> {
    let contexts = Arc::new(ContextManager::default());
    let mut state = AppState {
        orchestrator: Orchestrator::new(registry, contexts),
        turn,
        conversation: ConversationId::from("console"),
    };
    let channel: Arc<dyn OutputChannel> = Arc::new(ConsoleChannel);

    println!();
    println!("Type /help for commands, Ctrl+D or /quit to exit.");
    println!();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print_status_bar(&state.turn);
        print!("> ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
            None => {
                println!();
                println!("Goodbye!");
                break;
            }
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            match commands::Command::parse(input) {
                Ok(cmd) => match cmd.execute(&mut state).await {
                    commands::CommandResult::Exit => break,
                    commands::CommandResult::Continue => continue,
                },
                Err(err) => {
                    println!("{}", err);
                    println!();
                    continue;
                }
            }
        }

        let outcome = state
            .orchestrator
            .handle_turn(&state.conversation, input, None, &state.turn, channel.clone())
            .await;
        if let TurnOutcome::Replied { chunks_failed, .. } = outcome {
            if chunks_failed > 0 {
                eprintln!("({} part(s) of the reply could not be shown)", chunks_failed);
            }
        }
        println!();
    }

    println!(
        "Conversation had {} messages",
        state.orchestrator.contexts().len(&state.conversation)
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_file();
    let args = Args::parse();

    setup_tracing(args.verbose);

    let registry = Arc::new(BackendRegistry::with_defaults());
    let settings = with_default_host(args.settings()?, &registry);
    tracing::debug!(?settings, "Resolved settings");

    match args.command.clone().unwrap_or(Cmd::Chat) {
        Cmd::Backends => print_backends(&registry),
        Cmd::Models => {
            let turn = settings.turn_config().or_else(|_| {
                // Listing models does not need a model to be chosen.
                let mut partial = settings.clone();
                partial.model.get_or_insert_with(|| "-".to_string());
                partial.turn_config()
            })?;
            let models = registry
                .list_models(&turn.backend, &turn.host, turn.api_key.as_deref())
                .await;
            if models.is_empty() {
                anyhow::bail!("No models available from {} at {}", turn.backend, turn.host);
            }
            for model in models {
                println!("{}", model);
            }
        }
        Cmd::Probe => {
            let backend = settings.backend.as_deref().context("No backend configured")?;
            let host = settings.host.as_deref().context("No host configured")?;
            if registry.probe(backend, host, settings.api_key.as_deref()).await {
                println!("{} is reachable at {}", backend, host);
            } else {
                anyhow::bail!("{} is not reachable at {}", backend, host);
            }
        }
        Cmd::Settings => {
            match args.config.clone().or_else(PathManager::settings_path) {
                Some(path) => println!("Settings file: {}", path.display()),
                None => println!("Settings file: <no config directory>"),
            }
            println!("{:#?}", settings);
        }
        Cmd::Chat => {
            let turn = settings
                .turn_config()
                .context("Configure a backend, host and model via courier.toml, COURIER_* or flags")?;
            registry.resolve(&turn.backend, turn.api_key.as_deref())?;
            chat(registry, turn).await?;
        }
    }
    Ok(())
}
