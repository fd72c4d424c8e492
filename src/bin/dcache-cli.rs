//! DCache CLI - interactive shell for a DCache node
//!
//! Reads `SET key value ttl`, `GET key`, `HAS key` and `DELETE key` commands
//! from stdin until `EXIT`.

use std::time::Duration;

use anyhow::{anyhow, bail};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use dcache::CacheClient;

/// Interactive client for a DCache node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Node address (host:port)
    #[arg(long, env = "DCACHE_NODE", default_value = "127.0.0.1:3000")]
    nodeaddr: String,

    /// Connection attempts before giving up
    #[arg(long, default_value_t = 5)]
    retries: u32,

    /// Seconds allowed per connection attempt
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,
}

/// A parsed shell line.
#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    Set { key: String, value: String, ttl: u32 },
    Get { key: String },
    Has { key: String },
    Delete { key: String },
}

impl ShellCommand {
    fn parse(line: &str) -> anyhow::Result<Self> {
        if line.is_empty() {
            bail!("empty command");
        }

        let parts: Vec<&str> = line.split(' ').collect();

        match parts[0].to_ascii_uppercase().as_str() {
            "SET" => {
                if parts.len() != 4 {
                    bail!("INVALID SET COMMAND");
                }
                let ttl = parts[3]
                    .parse::<u32>()
                    .map_err(|e| anyhow!("invalid ttl '{}': {}", parts[3], e))?;
                Ok(ShellCommand::Set {
                    key: parts[1].to_string(),
                    value: parts[2].to_string(),
                    ttl,
                })
            }
            "GET" => Ok(ShellCommand::Get {
                key: single_key(&parts, "GET")?,
            }),
            "HAS" => Ok(ShellCommand::Has {
                key: single_key(&parts, "HAS")?,
            }),
            "DELETE" => Ok(ShellCommand::Delete {
                key: single_key(&parts, "DELETE")?,
            }),
            _ => bail!("invalid command"),
        }
    }

    async fn execute(self, client: &CacheClient) -> anyhow::Result<String> {
        match self {
            ShellCommand::Set { key, value, ttl } => {
                client.set(&key, value.into_bytes(), ttl).await?;
                Ok(format!("SET COMMAND KEY ({}) OK", key))
            }
            ShellCommand::Get { key } => Ok(match client.get(&key).await? {
                Some(value) => format!(
                    "GET COMMAND KEY ({}) FOUND\n{}",
                    key,
                    String::from_utf8_lossy(&value)
                ),
                None => format!("GET COMMAND KEY ({}) NOT FOUND", key),
            }),
            ShellCommand::Has { key } => Ok(if client.has(&key).await? {
                format!("HAS COMMAND KEY ({}) FOUND", key)
            } else {
                format!("HAS COMMAND KEY ({}) NOT FOUND", key)
            }),
            ShellCommand::Delete { key } => {
                client.delete(&key).await?;
                Ok(format!("DELETE ({}) COMMAND OK", key))
            }
        }
    }
}

fn single_key(parts: &[&str], command: &str) -> anyhow::Result<String> {
    if parts.len() != 2 {
        bail!("INVALID {} COMMAND", command);
    }
    Ok(parts[1].to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout belongs to the REPL
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dcache=warn".into()),
        )
        .init();

    let args = Args::parse();

    let client = CacheClient::new(args.nodeaddr);
    client
        .connect(args.retries, Duration::from_secs(args.timeout_secs))
        .await?;

    let result = run_shell(&client).await;
    client.end().await;
    result
}

async fn run_shell(client: &CacheClient) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        let line = line.trim_end_matches('\r');

        if line.eq_ignore_ascii_case("EXIT") {
            return Ok(());
        }

        let output = match ShellCommand::parse(line) {
            Ok(command) => match command.execute(client).await {
                Ok(output) => output,
                Err(e) => e.to_string(),
            },
            Err(e) => e.to_string(),
        };

        stdout.write_all(output.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }
}
