//! `orc-cli` — a thin reference embedder for local development.
//!
//! `orc-core` itself never listens on a socket (§6); this binary exists
//! so a turn can be driven from a terminal without standing up a real
//! front-end. Grounded on the teacher's `cli/run.rs` (one-shot execution,
//! event-receiver drain loop) and `cli/config.rs` (validate/show), with
//! the teacher's HTTP server, workspace, and agent-manager bootstrapping
//! dropped — this core has no counterpart for any of that.

use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use orc_core::runtime::Runtime;
use orc_core::{PublicChunk, TurnInput};
use orc_domain::config::Config;
use orc_domain::model::{Character, Chat, ConnectionProfile, Participant, ParticipantKind, Persona, SamplingParameters, User};
use orc_store::RepositoryBackend;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// orc-cli — local driver for the Chat Orchestration Core.
#[derive(Debug, Parser)]
#[command(name = "orc-cli", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Create a throwaway user/character/persona/chat wired to a local
    /// Ollama connection profile, for smoke-testing without a real API.
    Demo,
    /// Send a single message to a chat and print the response.
    Run {
        /// Chat id (from `orc-cli demo`, or a chat you created another way).
        #[arg(long)]
        chat: Uuid,
        /// User id that owns the chat.
        #[arg(long)]
        user: Uuid,
        /// The message to send.
        message: String,
        /// Output every streamed chunk as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Interactive REPL against a chat.
    Repl {
        #[arg(long)]
        chat: Uuid,
        #[arg(long)]
        user: Uuid,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, config_path) = load_config()?;
    let tracer_provider = init_tracing(&config.observability);
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config(ConfigCommand::Validate) => {
            if !config_validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let out = toml::to_string_pretty(&config)?;
            print!("{out}");
            Ok(())
        }
        Command::Demo => {
            let rt = Runtime::new(config)?;
            let (user_id, chat_id) = seed_demo(&rt)?;
            println!("user:  {user_id}");
            println!("chat:  {chat_id}");
            println!();
            println!("try:   orc-cli run --chat {chat_id} --user {user_id} \"hello\"");
            Ok(())
        }
        Command::Run { chat, user, message, json } => {
            let rt = Arc::new(Runtime::new(config)?);
            run_one(rt, chat, user, message, json).await
        }
        Command::Repl { chat, user } => {
            let rt = Arc::new(Runtime::new(config)?);
            repl(rt, chat, user).await
        }
    };

    if let Some(provider) = tracer_provider {
        let _ = provider.shutdown();
    }
    result
}

/// Structured logging always; OTLP/gRPC trace export layered on top when
/// `observability.otlp_endpoint` is configured (§9 ambient stack).
fn init_tracing(obs: &orc_domain::config::ObservabilityConfig) -> Option<opentelemetry_sdk::trace::SdkTracerProvider> {
    use opentelemetry::trace::TracerProvider as _;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,orc_core=debug"));
    let fmt_layer = tracing_subscriber::fmt::layer();

    match &obs.otlp_endpoint {
        Some(endpoint) => {
            let exporter = match opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint.clone())
                .build()
            {
                Ok(e) => e,
                Err(e) => {
                    eprintln!("otlp exporter init failed ({e}), continuing with local logging only");
                    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
                    return None;
                }
            };
            let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                .with_batch_exporter(exporter)
                .with_sampler(opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(obs.sample_rate))
                .with_resource(
                    opentelemetry_sdk::Resource::builder()
                        .with_service_name(obs.service_name.clone())
                        .build(),
                )
                .build();
            let tracer = provider.tracer("orc-core");
            let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .with(otel_layer)
                .init();
            Some(provider)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(fmt_layer).init();
            None
        }
    }
}

/// Load configuration from the path named by `ORC_CONFIG` (`config.toml`
/// by default), falling back to built-in defaults when the file is absent.
fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("ORC_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}

fn config_validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }
    let error_count = issues
        .iter()
        .filter(|e| e.severity == orc_domain::config::ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;
    for issue in &issues {
        println!("{issue}");
    }
    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");
    error_count == 0
}

fn seed_demo(rt: &Runtime) -> anyhow::Result<(Uuid, Uuid)> {
    use orc_domain::capability::ProviderShape;

    let user = rt.users.create(User {
        id: Uuid::new_v4(),
        email: "demo@example.invalid".into(),
        display_name: "Demo User".into(),
        password_hash: None,
        totp_secret_ciphertext: None,
        created_at: chrono::Utc::now(),
    })?;

    let persona = rt.personas.create(Persona {
        id: Uuid::new_v4(),
        user_id: user.id,
        name: "Sam".into(),
        description: "A curious traveler.".into(),
        personality: "Friendly and inquisitive.".into(),
        system_prompt: None,
        default_image_id: None,
        is_favorite: false,
        avatar_overrides: vec![],
        tags: vec![],
        character_links: vec![],
    })?;

    let character = rt.characters.create(Character {
        id: Uuid::new_v4(),
        user_id: user.id,
        name: "Aria".into(),
        description: "A wandering bard who tells stories of distant lands.".into(),
        personality: "Warm, curious, a little mischievous.".into(),
        scenario: "A tavern at dusk, candlelight flickering on old wood.".into(),
        first_message: "Well met, traveler. What brings you to this old tavern?".into(),
        example_dialogues: "<START>\n{{user}}: Who are you?\n{{char}}: Just a bard with too many stories.".into(),
        system_prompt: Some("You are {{char}}, speaking to {{user}}. {{personality}}".into()),
        default_image_id: None,
        is_favorite: false,
        avatar_overrides: vec![],
        tags: vec![],
    })?;

    let profile = rt.connection_profiles.create(ConnectionProfile {
        id: Uuid::new_v4(),
        user_id: user.id,
        provider: ProviderShape::Ollama,
        model_name: "llama3".into(),
        api_credential_id: None,
        base_url: None,
        parameters: SamplingParameters::default(),
        is_default: true,
        is_cheap: true,
        tags: vec![],
    })?;

    let chat = rt.chats.create(Chat {
        id: Uuid::new_v4(),
        user_id: user.id,
        title: "New chat".into(),
        participants: vec![
            Participant {
                kind: ParticipantKind::Persona,
                ref_id: Some(persona.id),
                is_active: true,
                connection_profile_id: None,
                image_profile_id: None,
            },
            Participant {
                kind: ParticipantKind::Character,
                ref_id: Some(character.id),
                is_active: true,
                connection_profile_id: Some(profile.id),
                image_profile_id: None,
            },
        ],
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
        title_last_checked_at_interchange: None,
    })?;

    Ok((user.id, chat.id))
}

async fn run_one(rt: Arc<Runtime>, chat: Uuid, user: Uuid, message: String, json_output: bool) -> anyhow::Result<()> {
    let input = TurnInput { text: message, ..Default::default() };
    let mut rx = orc_core::turn::submit_turn(rt, chat, user, input).await?;

    let mut exit_code = 0i32;
    let mut collected: Vec<PublicChunk> = Vec::new();

    while let Some(chunk) = rx.recv().await {
        if json_output {
            collected.push(chunk);
            continue;
        }
        print_chunk(&chunk, &mut exit_code);
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&collected)?);
    }

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn print_chunk(chunk: &PublicChunk, exit_code: &mut i32) {
    match chunk {
        PublicChunk::MessageStarted { .. } => {}
        PublicChunk::Delta { text } => {
            print!("{text}");
            std::io::stdout().flush().ok();
        }
        PublicChunk::ToolStarted { tool_name, .. } => {
            eprintln!("\x1b[2m[tool: {tool_name}]\x1b[0m");
        }
        PublicChunk::ToolFinished { tool_name, success, .. } => {
            eprintln!("\x1b[2m[tool: {tool_name} -> {}]\x1b[0m", if *success { "ok" } else { "error" });
        }
        PublicChunk::Final { .. } => println!(),
        PublicChunk::Stopped { .. } => eprintln!("\nturn stopped"),
        PublicChunk::Error { message, .. } => {
            eprintln!("error: {message}");
            *exit_code = 1;
        }
    }
}

async fn repl(rt: Arc<Runtime>, chat: Uuid, user: Uuid) -> anyhow::Result<()> {
    println!("orc-cli repl — chat {chat}. Ctrl-D to quit.");
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let input = TurnInput { text: line.to_string(), ..Default::default() };
        let mut rx = orc_core::turn::submit_turn(rt.clone(), chat, user, input).await?;
        let mut exit_code = 0i32;
        while let Some(chunk) = rx.recv().await {
            print_chunk(&chunk, &mut exit_code);
        }
    }
    Ok(())
}
