// Copyright (c) 2022 Tomohide Takao
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

// cf. https://docs.aws.amazon.com/IAM/latest/UserGuide/id_credentials_access-keys.html#rotating_access_keys_console

use api::{create_router, AppState};
use directory::IamDirectory;
use expired_keys::{fetch_expired_keys, KeyReport, ThresholdHours};
use eyre::{Context, Result};
use std::io::{stdout, BufWriter, Write};
use std::sync::Arc;
use structopt::{clap, StructOpt};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod account;
pub mod api;
pub mod date_format;
pub mod directory;
pub mod error;
pub mod expired_keys;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use directory::{AccessKey, Directory, KeyStatus, User};
pub use error::Error;

#[derive(Debug, StructOpt)]
#[structopt(name = "iam_key_expiry")]
#[structopt(long_version(option_env!("LONG_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))))]
#[structopt(setting(clap::AppSettings::ColoredHelp))]
pub struct Opt {
    /// AWS region; defaults to the environment/profile configuration
    #[structopt(long = "region")]
    pub region: Option<String>,
    /// Maximum number of users whose access keys are listed concurrently
    #[structopt(long = "concurrency", default_value = "8")]
    pub concurrency: usize,
    #[structopt(subcommand)]
    pub sub: Sub,
}

#[derive(Debug, StructOpt)]
pub enum Sub {
    #[structopt(name = "serve", about = "Serves the key-check HTTP API")]
    #[structopt(setting(clap::AppSettings::ColoredHelp))]
    Serve {
        #[structopt(long = "host", default_value = "0.0.0.0")]
        host: String,
        #[structopt(long = "port", default_value = "8000")]
        port: u16,
    },

    #[structopt(
        name = "check",
        about = "Lists the access keys older than the given number of hours"
    )]
    #[structopt(setting(clap::AppSettings::ColoredHelp))]
    Check {
        #[structopt(long = "hours", default_value = "2160", allow_hyphen_values = true)]
        hours: i64,
        #[structopt(long = "format", default_value = "json", possible_values = &["json", "csv"])]
        format: String,
    },
}

pub async fn run() -> Result<()> {
    init_tracing();

    let opt = Opt::from_args();

    let mut loader = aws_config::from_env();
    if let Some(region) = opt.region.clone() {
        loader = loader.region(aws_types::region::Region::new(region));
    }
    let shared_config = loader.load().await;
    let directory = IamDirectory::new(&shared_config);

    match opt.sub {
        Sub::Serve { host, port } => {
            let app = create_router(AppState {
                directory: Arc::new(directory),
                concurrency: opt.concurrency,
            });

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .wrap_err_with(|| format!("Failed to bind {addr}."))?;
            info!(%addr, "listening");

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .wrap_err("Failed to serve the key-check API.")?;
        }
        Sub::Check { hours, format } => {
            let threshold = ThresholdHours::new(hours)
                .wrap_err_with(|| format!("Invalid --hours when checks access keys: {hours}."))?;

            let expired_keys = fetch_expired_keys(&directory, threshold, opt.concurrency)
                .await
                .wrap_err_with(|| {
                    format!(
                        "Failed to fetch expired access keys when checks access keys.\ndirectory is {:#?}.",
                        &directory
                    )
                })?;

            let out = stdout();
            let mut out = BufWriter::new(out.lock());
            print_expired_keys(&mut out, &expired_keys, &format)?;
            out.flush()
                .wrap_err("Failed to flush when checks access keys.")?;
        }
    }
    Ok(())
}

fn init_tracing() {
    // Logs go to stderr so that `check` output stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

pub fn print_expired_keys<W: Write>(
    w: &mut W,
    expired_keys: &[KeyReport],
    format: &str,
) -> Result<()> {
    if expired_keys.is_empty() {
        writeln!(w, "No expired access keys found.")?;
        return Ok(());
    }

    match format {
        "csv" => {
            let mut wtr = csv::Writer::from_writer(w);
            for ek in expired_keys {
                wtr.serialize(ek).wrap_err_with(|| {
                    format!("Failed to serialize.\nexpired key is {:#?}.", &ek)
                })?;
            }
            wtr.flush().wrap_err("Failed to flush csv writer.")?;
        }
        _ => {
            serde_json::to_writer_pretty(&mut *w, expired_keys)
                .wrap_err("Failed to serialize expired keys as json.")?;
            writeln!(w)?;
        }
    }
    Ok(())
}
