//! Strata CLI
//!
//! Uploads and downloads files through the routing client against a fixed
//! list of data nodes, and issues bearer tokens for local testing.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use strata_auth::{JwtTokens, MemUserDriver, UserDriver};
use strata_client::{
    CallContext, DataClient, NodeSelector, RandomSelector, RoundRobinSelector, StaticRegistry,
};
use strata_common::{
    ByteStream, ChecksumAlgorithm, ChecksumCalculator, DATA_NODE_ROLE, RoutingConfig, User,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "strata-cli")]
#[command(about = "Strata command line client")]
#[command(version)]
struct Args {
    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// How the routing client reaches data nodes
#[derive(clap::Args, Debug)]
struct RouteArgs {
    /// Data node base URLs
    #[arg(long = "node", env = "STRATA_NODES", value_delimiter = ',', required = true)]
    nodes: Vec<String>,

    /// Registry role to route to
    #[arg(long, default_value = DATA_NODE_ROLE)]
    role: String,

    /// Node selection strategy
    #[arg(long, value_enum, default_value_t = Selector::Random)]
    selector: Selector,

    /// Bearer token sent to the data node
    #[arg(long, env = "STRATA_TOKEN", hide_env_values = true)]
    token: String,

    /// Username the token was issued to (used for logging)
    #[arg(long, env = "STRATA_USER", default_value = "anonymous")]
    user: String,

    /// Trace id for the request; generated when absent
    #[arg(long)]
    trace_id: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Selector {
    Random,
    RoundRobin,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload a local file
    Upload {
        #[command(flatten)]
        route: RouteArgs,
        /// Local file to read
        local: PathBuf,
        /// Destination path on the data node
        remote: String,
        /// Expected checksum, `<algorithm>:<hex>`
        #[arg(long, conflicts_with = "compute_checksum")]
        checksum: Option<String>,
        /// Compute a checksum of the local file with this algorithm
        #[arg(long, value_parser = parse_algorithm)]
        compute_checksum: Option<ChecksumAlgorithm>,
    },
    /// Download a remote file
    Download {
        #[command(flatten)]
        route: RouteArgs,
        /// Path on the data node
        remote: String,
        /// Local file to write
        local: PathBuf,
    },
    /// Issue a bearer token for a user
    Token {
        /// Users as `username:password:email:display name`, comma separated
        #[arg(long, env = "STRATA_USERS", hide_env_values = true)]
        users: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// Secret shared with the data nodes
        #[arg(long, env = "STRATA_JWT_SECRET", hide_env_values = true)]
        secret: String,
        /// Token lifetime in seconds
        #[arg(long, default_value = "3600")]
        validity_secs: u64,
    },
}

fn parse_algorithm(name: &str) -> Result<ChecksumAlgorithm, String> {
    ChecksumAlgorithm::from_name(name).ok_or_else(|| format!("unknown checksum algorithm {name}"))
}

impl RouteArgs {
    fn client(&self) -> DataClient {
        let registry = Arc::new(StaticRegistry::from_urls(&self.role, self.nodes.iter()));
        let selector: Arc<dyn NodeSelector> = match self.selector {
            Selector::Random => Arc::new(RandomSelector::new()),
            Selector::RoundRobin => Arc::new(RoundRobinSelector::new()),
        };
        let routing = RoutingConfig {
            role: self.role.clone(),
            ..RoutingConfig::default()
        };
        DataClient::from_config(&routing, registry, selector)
    }

    fn context(&self) -> CallContext {
        let trace_id = self
            .trace_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        CallContext::new(trace_id, &self.token)
    }
}

async fn file_checksum(path: &Path, algorithm: ChecksumAlgorithm) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut calculator = ChecksumCalculator::new(algorithm);
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        calculator.update(&buf[..n]);
    }
    Ok(format!("{}:{}", algorithm.name(), calculator.finalize()))
}

async fn upload(
    route: &RouteArgs,
    local: &Path,
    remote: &str,
    checksum: Option<String>,
    compute: Option<ChecksumAlgorithm>,
) -> Result<()> {
    let checksum = match (checksum, compute) {
        (Some(checksum), _) => checksum,
        (None, Some(algorithm)) => file_checksum(local, algorithm).await?,
        (None, None) => String::new(),
    };
    let file = tokio::fs::File::open(local)
        .await
        .with_context(|| format!("failed to open {}", local.display()))?;
    let size = file.metadata().await?.len();
    let body: ByteStream = Box::pin(ReaderStream::new(file));

    let ctx = route.context();
    debug!(trace_id = %ctx.trace_id, checksum = %checksum, "starting upload");
    route
        .client()
        .upload(&ctx, &User::new(&route.user), remote, body, &checksum)
        .await
        .with_context(|| format!("upload of {remote} failed"))?;

    info!("uploaded {} ({} bytes) to {}", local.display(), size, remote);
    println!("{remote}: {size} bytes uploaded");
    Ok(())
}

async fn download(route: &RouteArgs, remote: &str, local: &Path) -> Result<()> {
    let ctx = route.context();
    let mut stream = route
        .client()
        .download(&ctx, &User::new(&route.user), remote)
        .await
        .with_context(|| format!("download of {remote} failed"))?;

    let mut file = tokio::fs::File::create(local)
        .await
        .with_context(|| format!("failed to create {}", local.display()))?;
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| format!("transfer of {remote} interrupted"))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    info!("downloaded {} ({} bytes) to {}", remote, written, local.display());
    println!("{remote}: {written} bytes downloaded");
    Ok(())
}

fn issue_token(
    users: &str,
    username: &str,
    password: &str,
    secret: &str,
    validity: Duration,
) -> Result<String> {
    if secret.is_empty() {
        bail!("token secret must not be empty");
    }
    let driver = MemUserDriver::from_list(users);
    let user = driver.get_by_credentials(username, password)?;
    Ok(JwtTokens::new(secret.as_bytes(), validity).issue(&user)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Commands::Upload {
            route,
            local,
            remote,
            checksum,
            compute_checksum,
        } => upload(&route, &local, &remote, checksum, compute_checksum).await,
        Commands::Download {
            route,
            remote,
            local,
        } => download(&route, &remote, &local).await,
        Commands::Token {
            users,
            username,
            password,
            secret,
            validity_secs,
        } => {
            let token = issue_token(
                &users,
                &username,
                &password,
                &secret,
                Duration::from_secs(validity_secs),
            )?;
            println!("{token}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_auth::TokenVerifier;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "strata-cli",
            "upload",
            "--node",
            "http://a:9002,http://b:9002",
            "--token",
            "t",
            "--selector",
            "round-robin",
            "./a.txt",
            "/docs/a.txt",
        ])
        .unwrap();
        match args.command {
            Commands::Upload { route, remote, .. } => {
                assert_eq!(route.nodes.len(), 2);
                assert_eq!(route.role, "data-node");
                assert!(matches!(route.selector, Selector::RoundRobin));
                assert_eq!(remote, "/docs/a.txt");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_issue_token_round_trips() {
        let token = issue_token(
            "alice:pw:alice@example.com:Alice",
            "alice",
            "pw",
            "secret",
            Duration::from_secs(60),
        )
        .unwrap();
        let user = JwtTokens::new(b"secret", Duration::from_secs(60))
            .verify(&token)
            .await
            .unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.display_name, "Alice");

        let minute = Duration::from_secs(60);
        assert!(issue_token("alice:pw:a:A", "alice", "wrong", "secret", minute).is_err());
        assert!(issue_token("alice:pw:a:A", "alice", "pw", "", minute).is_err());
    }

    #[tokio::test]
    async fn test_file_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let sum = file_checksum(&path, ChecksumAlgorithm::Sha256).await.unwrap();
        assert_eq!(sum, strata_common::sha256_checksum(b"hello"));
        assert!(file_checksum(&dir.path().join("missing"), ChecksumAlgorithm::Crc32c)
            .await
            .is_err());
    }
}
