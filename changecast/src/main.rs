use clap::Parser;
use changecast::{Config, PublisherServices, telemetry, verify};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before anything else that might build a TLS client
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let args = changecast::config::Args::parse();
    let config = Config::load(&args)?;

    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry(config.log_format)?;
    tracing::debug!("{:?}", args);

    let services = PublisherServices::from_config(&config)?;
    let report = verify::verify_destinations(&config.subscriptions, &services).await;

    tracing::info!(
        delivered = report.delivered,
        skipped = report.skipped,
        failed = report.failed.len(),
        "Destination verification finished"
    );

    if !report.is_success() {
        anyhow::bail!("{} destination(s) failed verification", report.failed.len());
    }
    Ok(())
}
