use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keel_core::app::{ControllerBuilder, ControllerConfig, Rollout, ShutdownHandle};
use keel_core::domain::{AdjustOptions, ServiceSpec};
use keel_core::impls::{InMemoryOrchestrator, RolloutScript};
use keel_core::ports::TracingEventSink;

/// keel demo: drive a service lifecycle against the in-memory orchestrator
#[derive(Parser, Debug)]
#[command(name = "keel")]
#[command(about = "Replicated service lifecycle with rollout convergence detection", long_about = None)]
#[command(version)]
struct Cli {
    /// Controller configuration file (JSON)
    #[arg(short, long, env = "KEEL_CONFIG")]
    config: Option<PathBuf>,

    /// Override pollIntervalMs from the config file
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Service name
    #[arg(short, long, default_value = "web")]
    service: String,

    /// Image for the initial deployment
    #[arg(short, long, default_value = "app:1")]
    image: String,

    /// Initial replica count
    #[arg(short, long, default_value_t = 3)]
    replicas: u64,

    /// Roll out this image at the end; its tasks are rejected by the orchestrator
    #[arg(long)]
    fail_image: Option<String>,

    /// Do not monitor create / update
    #[arg(short, long)]
    detach: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(cli: &Cli) -> anyhow::Result<ControllerConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            ControllerConfig::from_json_str(&raw)
                .with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => ControllerConfig::default(),
    };
    if let Some(interval) = cli.poll_interval_ms {
        config.poll_interval_ms = interval;
    }
    Ok(config)
}

fn report(step: &str, rollout: &Rollout) {
    match &rollout.report {
        Some(report) => println!(
            "{step}: service={} id={} converged after {} polls ({} running)",
            rollout.service,
            rollout.service_id,
            report.polls,
            report.running_tasks.len()
        ),
        None => println!(
            "{step}: service={} id={} (detached)",
            rollout.service, rollout.service_id
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let config = load_config(&cli)?;
    info!(?config, "Loaded controller config");

    // (A) orchestrator を用意（fail_image の task は rejected になる）
    let mut orchestrator = InMemoryOrchestrator::new();
    if let Some(image) = &cli.fail_image {
        orchestrator =
            orchestrator.with_script(image.clone(), RolloutScript::rejected("no suitable node"));
    }
    let orchestrator = Arc::new(orchestrator);

    // (B) Ctrl-C で監視を止める
    let shutdown = Arc::new(ShutdownHandle::new());
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, cancelling monitoring");
                shutdown.request_shutdown();
            }
        });
    }

    let controller = ControllerBuilder::new()
        .orchestrator(orchestrator)
        .config(config)
        .event_sink(Arc::new(TracingEventSink))
        .build()?
        .with_shutdown(shutdown.subscribe());

    // (C) pull → create → update → scale → force
    controller.pull(&cli.image).await?;

    let spec = ServiceSpec::new(&cli.service, &cli.image).with_replicas(cli.replicas);
    let rollout = controller.create(&spec, cli.detach).await?;
    report("create", &rollout);

    let updated = spec.clone().with_env("PORT=8080");
    let rollout = controller.update(&updated, cli.detach).await?;
    report("update", &rollout);

    let rollout = controller.scale(&cli.service, cli.replicas + 1).await?;
    report("scale", &rollout);

    let rollout = controller
        .adjust(&cli.service, &AdjustOptions::new().with_force())
        .await?;
    report("force", &rollout);

    // (D) 失敗する rollout（指定時のみ）
    if let Some(image) = &cli.fail_image {
        match controller
            .adjust(&cli.service, &AdjustOptions::new().with_image(image.clone()))
            .await
        {
            Ok(rollout) => report("fail-image", &rollout),
            Err(err) => println!("fail-image: {err} (kind={:?})", err.kind()),
        }
    }

    // (E) inspect → remove
    let snapshot = controller.get(&cli.service).await?;
    println!("version: {}", snapshot.version);
    println!("{}", serde_json::to_string_pretty(&snapshot.spec)?);

    for service in controller.list().await? {
        println!("listed: {} ({})", service.spec.name, service.id);
    }

    controller.remove(&cli.service).await?;
    println!("removed: {}", cli.service);

    Ok(())
}
