//! Command definitions and handlers.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use dockhand_core::{
    ContainerConfig, CredentialStore, Credentials, EngineClient, ImageReference, LogsOptions,
    StreamChannel,
};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;

/// dockhand - talk to a container engine over its HTTP API
#[derive(Parser)]
#[command(name = "dockhand")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Engine address, e.g. unix:///var/run/docker.sock or tcp://host:2376
    ///
    /// Overrides DOCKER_HOST.
    #[arg(long, short = 'H', global = true)]
    pub host: Option<String>,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Check that the engine answers
    Ping,
    /// Show engine version information
    Version,
    /// List containers
    Ps(PsArgs),
    /// List images
    Images,
    /// Pull an image
    Pull(PullArgs),
    /// Create and start a container
    Run(RunArgs),
    /// Print a container's logs
    Logs(LogsArgs),
    /// Copy a file out of a container
    Cp(CpArgs),
    /// Store registry credentials
    Login(LoginArgs),
}

#[derive(Args)]
pub struct PsArgs {
    /// Show stopped containers too
    #[arg(long, short)]
    pub all: bool,
}

#[derive(Args)]
pub struct PullArgs {
    /// Image reference, e.g. busybox:1.36
    pub image: String,
}

#[derive(Args)]
pub struct RunArgs {
    /// Image repository
    pub image: String,

    /// Image tag
    #[arg(long, short)]
    pub tag: Option<String>,

    /// Container name
    #[arg(long)]
    pub name: Option<String>,

    /// Command to run in the container
    #[arg(last = true)]
    pub cmd: Vec<String>,
}

#[derive(Args)]
pub struct LogsArgs {
    /// Container id or name
    pub container: String,

    /// Keep streaming new output
    #[arg(long, short)]
    pub follow: bool,
}

#[derive(Args)]
pub struct CpArgs {
    /// Container id or name
    pub container: String,

    /// Path of the file inside the container
    pub path: String,

    /// Destination file on the host
    pub dest: PathBuf,
}

#[derive(Args)]
pub struct LoginArgs {
    /// Registry user
    #[arg(long, short)]
    pub username: String,

    /// Registry password
    #[arg(long, short, env = "DOCKHAND_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Account email
    #[arg(long, short, default_value = "")]
    pub email: String,

    /// Registry address (defaults to the public index)
    #[arg(long)]
    pub server: Option<String>,
}

pub async fn ping(client: &EngineClient) -> Result<()> {
    let reply = client.ping().await?;
    println!("{reply}");
    Ok(())
}

pub async fn version(client: &EngineClient) -> Result<()> {
    let version = client.version().await?;
    println!("Version:     {}", field(&version, "Version"));
    println!("API version: {}", field(&version, "ApiVersion"));
    println!("OS/Arch:     {}/{}", field(&version, "Os"), field(&version, "Arch"));
    Ok(())
}

pub async fn ps(client: &EngineClient, args: PsArgs) -> Result<()> {
    let containers = client.list_containers(args.all, None).await?;
    println!("{:<14} {:<30} {:<20}", "CONTAINER ID", "IMAGE", "STATUS");
    for container in &containers {
        println!(
            "{:<14} {:<30} {:<20}",
            short_id(field(container, "Id")),
            field(container, "Image"),
            field(container, "Status"),
        );
    }
    Ok(())
}

pub async fn images(client: &EngineClient) -> Result<()> {
    let images = client.list_images(false).await?;
    println!("{:<40} {:<14}", "REPOSITORY:TAG", "IMAGE ID");
    for image in &images {
        let id = short_id(field(image, "Id").trim_start_matches("sha256:"));
        match image["RepoTags"].as_array() {
            Some(tags) if !tags.is_empty() => {
                for tag in tags.iter().filter_map(Value::as_str) {
                    println!("{tag:<40} {id:<14}");
                }
            }
            _ => println!("{:<40} {id:<14}", "<none>"),
        }
    }
    Ok(())
}

pub async fn pull(client: EngineClient, args: PullArgs) -> Result<()> {
    let reference = ImageReference::parse(&args.image);
    let client = client
        .with_stored_credentials(registry_of(&reference.repository))
        .await?;
    let progress = client
        .pull_image(&reference.repository, reference.tag.as_deref())
        .await?;
    if let Some(status) = progress.last().and_then(|d| d["status"].as_str()) {
        println!("{status}");
    }
    println!("{reference}");
    Ok(())
}

pub async fn run(client: EngineClient, args: RunArgs) -> Result<()> {
    let client = client
        .with_stored_credentials(registry_of(&args.image))
        .await?;
    let mut config = ContainerConfig::default();
    if !args.cmd.is_empty() {
        config = config.cmd(args.cmd);
    }
    let id = client
        .run(&args.image, config, args.tag.as_deref(), args.name.as_deref())
        .await?;
    println!("{id}");
    Ok(())
}

pub async fn logs(client: &EngineClient, args: LogsArgs) -> Result<()> {
    let options = LogsOptions {
        follow: args.follow,
        ..LogsOptions::default()
    };
    let mut demuxer = client.logs(&args.container, &options).await?;

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    while let Some(frame) = demuxer.next_frame().await? {
        match frame.channel {
            StreamChannel::Stdout => stdout.write_all(&frame.payload)?,
            StreamChannel::Stderr => stderr.write_all(&frame.payload)?,
        }
    }
    stdout.flush()?;
    Ok(())
}

pub async fn cp(client: &EngineClient, args: CpArgs) -> Result<()> {
    let entry = client
        .copy_file_from_container(&args.container, &args.path)
        .await?;
    let dest = if args.dest.is_dir() {
        args.dest.join(&entry.name)
    } else {
        args.dest
    };
    tokio::fs::write(&dest, &entry.content)
        .await
        .with_context(|| format!("writing {}", dest.display()))?;
    println!("{} bytes -> {}", entry.size, dest.display());
    Ok(())
}

pub async fn login(client: &EngineClient, args: LoginArgs) -> Result<()> {
    let Some(path) = client.config().credential_store.clone() else {
        bail!("no credential store path: set DOCKHAND_CREDENTIALS or HOME");
    };
    let credentials = Credentials::new(
        args.username,
        args.password,
        args.email,
        args.server.as_deref(),
    );

    let reply = client.login(&credentials).await?;
    if let Some(status) = reply["Status"].as_str() {
        println!("{status}");
    }

    let mut store = CredentialStore::load(&path).await?;
    store.insert(&credentials);
    store.save(&path).await?;
    tracing::info!(registry = %credentials.server_address, "Credentials stored");
    Ok(())
}

fn field<'a>(value: &'a Value, key: &str) -> &'a str {
    value[key].as_str().unwrap_or("-")
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

/// Registry host for a repository, or `None` for the public index.
fn registry_of(repository: &str) -> Option<&str> {
    let (first, _) = repository.split_once('/')?;
    (first.contains('.') || first.contains(':') || first == "localhost").then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::parse_from([
            "dockhand", "--host", "tcp://127.0.0.1:2375", "run", "busybox", "--tag", "1.36", "--",
            "echo", "hi",
        ]);
        assert_eq!(cli.host.as_deref(), Some("tcp://127.0.0.1:2375"));
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.image, "busybox");
                assert_eq!(args.tag.as_deref(), Some("1.36"));
                assert_eq!(args.cmd, vec!["echo", "hi"]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_registry_of() {
        assert_eq!(registry_of("busybox"), None);
        assert_eq!(registry_of("library/busybox"), None);
        assert_eq!(registry_of("registry.local:5000/app"), Some("registry.local:5000"));
        assert_eq!(registry_of("localhost/app"), Some("localhost"));
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
    }
}
