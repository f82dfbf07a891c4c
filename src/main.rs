//! nsfc-report-dl - REST server for the project catalog and report builds.

use clap::Parser;
use nsfc_report_dl::{Config, ReportDownloader, api};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Serve the NSFC closing-report catalog over HTTP
#[derive(Parser, Debug)]
#[command(name = "nsfc-report-dl", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "NSFC_REPORT_DL_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind the API server to
    #[arg(long, env = "NSFC_REPORT_DL_BIND")]
    bind: Option<SocketAddr>,

    /// SQLite catalog path
    #[arg(long)]
    database: Option<PathBuf>,

    /// Directory for report files
    #[arg(long)]
    upload_dir: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> nsfc_report_dl::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_toml_file(path)?,
            None => Config::default(),
        };

        if let Some(bind) = self.bind {
            config.api.bind_address = bind;
        }
        if let Some(database) = self.database {
            config.persistence.database_path = database;
        }
        if let Some(upload_dir) = self.upload_dir {
            config.persistence.upload_dir = upload_dir;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> nsfc_report_dl::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nsfc_report_dl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Args::parse().into_config()?;
    let downloader = Arc::new(ReportDownloader::new(config.clone()).await?);

    api::serve_with_shutdown(
        downloader.clone(),
        Arc::new(config),
        nsfc_report_dl::wait_for_signal(),
    )
    .await?;

    downloader.shutdown().await
}
