use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::*;
use tyk_injector::admission::Injector;
use tyk_injector::ca::{CertificateAuthority, LocalCa};
use tyk_injector::config::SidecarConfig;
use tyk_injector::gateway::{DashboardGateway, Gateway, MemoryGateway};
use tyk_injector::{logging, server};

const SELF_SIGNED_CA_NAME: &str = "tyk-mesh-ca";

#[derive(Clone, Debug, Parser)]
struct Options {
    /// Sidecar template (YAML)
    #[arg(long, env = "TK8S_CONFIG")]
    config: PathBuf,

    #[arg(long, env = "TK8S_LISTEN", default_value = "0.0.0.0:8443")]
    listen: SocketAddr,

    // Without a certificate the webhook serves plain HTTP, which is only useful for local runs;
    // the apiserver requires TLS
    #[arg(long, env = "TK8S_CERT_PATH", requires = "key_path")]
    cert_path: Option<PathBuf>,

    #[arg(long, env = "TK8S_KEY_PATH", requires = "cert_path")]
    key_path: Option<PathBuf>,

    /// Dashboard base URL; routes are kept in memory when unset
    #[arg(long, env = "TK8S_GATEWAY_URL")]
    gateway_url: Option<String>,

    #[arg(long, env = "TK8S_GATEWAY_SECRET", default_value = "")]
    gateway_secret: String,

    #[arg(long, env = "TK8S_GATEWAY_ORG_ID", default_value = "")]
    gateway_org_id: String,

    #[arg(long, env = "TK8S_GATEWAY_TIMEOUT_SECS", default_value_t = 10)]
    gateway_timeout_secs: u64,

    /// PEM CA used to sign mesh certificates; a self-signed CA is generated when unset
    #[arg(long, env = "TK8S_CA_CERT", requires = "ca_key")]
    ca_cert: Option<PathBuf>,

    #[arg(long, env = "TK8S_CA_KEY", requires = "ca_cert")]
    ca_key: Option<PathBuf>,

    #[arg(short, long, env = "TK8S_VERBOSITY", default_value = "info")]
    verbosity: String,
}

fn build_gateway(opts: &Options) -> Result<Arc<dyn Gateway>> {
    match &opts.gateway_url {
        Some(url) => {
            info!("registering routes with the dashboard at {url}");
            let timeout = Duration::from_secs(opts.gateway_timeout_secs);
            let gateway = DashboardGateway::new(url, &opts.gateway_secret, &opts.gateway_org_id, timeout)
                .context("could not create dashboard client")?;
            Ok(Arc::new(gateway))
        },
        None => {
            warn!("no gateway URL configured, routes will only be kept in memory");
            Ok(Arc::new(MemoryGateway::new()))
        },
    }
}

fn build_ca(opts: &Options) -> Result<Arc<dyn CertificateAuthority>> {
    let ca = match (&opts.ca_cert, &opts.ca_key) {
        (Some(cert), Some(key)) => {
            let cert = std::fs::read_to_string(cert).with_context(|| format!("could not read {}", cert.display()))?;
            let key = std::fs::read_to_string(key).with_context(|| format!("could not read {}", key.display()))?;
            LocalCa::from_pem(&cert, &key)?
        },
        (None, None) => {
            info!("no CA configured, generating a self-signed one");
            LocalCa::new(SELF_SIGNED_CA_NAME)?
        },
        _ => bail!("--ca-cert and --ca-key must be given together"),
    };
    Ok(Arc::new(ca))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("could not listen for shutdown signal: {err}");
    }
    info!("shutting down");
}

#[instrument(skip_all, err)]
async fn run(opts: Options) -> Result<()> {
    let config = Arc::new(SidecarConfig::load(&opts.config)?);
    let injector = Arc::new(Injector::new(config, build_gateway(&opts)?, build_ca(&opts)?));
    let routes = server::routes(injector);

    match (&opts.cert_path, &opts.key_path) {
        (Some(cert), Some(key)) => {
            let (addr, serving) = warp::serve(routes)
                .tls()
                .cert_path(cert)
                .key_path(key)
                .bind_with_graceful_shutdown(opts.listen, shutdown_signal());
            info!("listening on https://{addr}");
            serving.await;
        },
        _ => {
            let (addr, serving) = warp::serve(routes)
                .try_bind_with_graceful_shutdown(opts.listen, shutdown_signal())
                .with_context(|| format!("could not bind {}", opts.listen))?;
            warn!("no TLS certificate configured, listening on http://{addr}");
            serving.await;
        },
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Options::parse();
    logging::setup(&format!("{},hyper=warn", args.verbosity));
    info!("starting Tyk sidecar injector");
    if let Err(err) = run(args).await {
        error!("injector failed: {err:#}");
        std::process::exit(1);
    }
}
