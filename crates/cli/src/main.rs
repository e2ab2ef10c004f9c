use clap::{Parser, Subcommand};
use deskbot::activity::Activity;
use deskbot::backend::{BackendClient, ChatBackend};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "deskbot")]
#[command(about = "Deskbot CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: DESKBOT_CONFIG_PATH or ~/.deskbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the messaging endpoint (POST /api/messages).
    Serve {
        /// Config file path (default: DESKBOT_CONFIG_PATH or ~/.deskbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 3978)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Probe the backend health endpoint. Exits non-zero when unhealthy.
    Health {
        /// Config file path (default: DESKBOT_CONFIG_PATH or ~/.deskbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Chat with a running endpoint (interactive). Card submissions are not supported.
    Chat {
        /// Config file path (default: DESKBOT_CONFIG_PATH or ~/.deskbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Conversation id to use (default: a fresh one).
        #[arg(long, value_name = "ID")]
        conversation: Option<String>,
    },

    /// Print the effective config with secrets masked.
    Config {
        /// Config file path (default: DESKBOT_CONFIG_PATH or ~/.deskbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("deskbot {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("serve failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Health { config }) => match run_health(config).await {
            Ok(true) => println!("backend healthy"),
            Ok(false) => {
                println!("backend unhealthy");
                std::process::exit(1);
            }
            Err(e) => {
                log::error!("health failed: {}", e);
                std::process::exit(1);
            }
        },
        Some(Commands::Chat {
            config,
            conversation,
        }) => {
            if let Err(e) = run_chat(config, conversation).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Config { config }) => {
            if let Err(e) = run_show_config(config) {
                log::error!("config failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(deskbot::config::default_config_path);
    let dir = deskbot::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = deskbot::config::load_config(config_path)?;
    if let Some(p) = port {
        config.server.port = p;
    }
    log::info!(
        "starting messaging endpoint on {}:{} (config {})",
        config.server.bind,
        config.server.port,
        path.display()
    );
    deskbot::gateway::run_server(config).await
}

async fn run_health(config_path: Option<std::path::PathBuf>) -> anyhow::Result<bool> {
    let (config, _) = deskbot::config::load_config(config_path)?;
    let client = BackendClient::new(&config.backend);
    Ok(client.health_check().await)
}

fn run_show_config(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, _) = deskbot::config::load_config(config_path)?;
    let redacted = deskbot::config::redacted(&config);
    println!("{}", serde_json::to_string_pretty(&redacted)?);
    Ok(())
}

async fn run_chat(
    config_path: Option<std::path::PathBuf>,
    conversation: Option<String>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, _) = deskbot::config::load_config(config_path)?;
    let url = format!(
        "http://{}:{}/api/messages",
        config.server.bind.trim(),
        config.server.port
    );
    let conversation =
        conversation.unwrap_or_else(|| format!("cli-{}", uuid::Uuid::new_v4()));
    let client = reqwest::Client::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        match send_message(&client, &url, &conversation, input).await {
            Ok(replies) => {
                for reply in replies {
                    println!("< {}", render_reply(&reply));
                }
            }
            Err(e) => {
                eprintln!("chat error: {}", e);
            }
        }
    }

    Ok(())
}

async fn send_message(
    client: &reqwest::Client,
    url: &str,
    conversation: &str,
    text: &str,
) -> anyhow::Result<Vec<Value>> {
    let activity = Activity::message(conversation, text);
    let res = client.post(url).json(&activity).send().await?;
    if !res.status().is_success() {
        anyhow::bail!("endpoint returned {}", res.status());
    }
    let body: Value = res.json().await?;
    Ok(body
        .get("replies")
        .and_then(|r| r.as_array())
        .cloned()
        .unwrap_or_default())
}

/// Text replies as-is; cards as a list of their article titles.
fn render_reply(reply: &Value) -> String {
    if let Some(text) = reply.get("text").and_then(|t| t.as_str()) {
        return text.to_string();
    }
    let titles: Vec<String> = reply
        .get("attachments")
        .and_then(|a| a.as_array())
        .into_iter()
        .flatten()
        .filter_map(|a| a.get("content")?.get("body")?.as_array())
        .flatten()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("Container"))
        .filter_map(|b| {
            let title = b.get("items")?.get(0)?.get("text")?.as_str()?;
            let url = b
                .get("selectAction")
                .and_then(|s| s.get("url"))
                .and_then(|u| u.as_str())
                .unwrap_or("");
            Some(format!("  - {} {}", title, url))
        })
        .collect();
    if titles.is_empty() {
        "[card]".to_string()
    } else {
        format!("[card]\n{}", titles.join("\n"))
    }
}
