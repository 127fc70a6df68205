mod cli;

use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use seqpod_core::{BuilderConfig, MemoryApi, PodBuilder};
use seqpod_image::{HttpRegistry, ImageCache, ImageResolver, RegistryConfig};
use seqpod_model::Task;
use seqpod_observe::{LoggerConfig, logger_init};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::cli::{Cli, Command, LogArgs, RegistryArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log)?;

    let mut config = BuilderConfig::from_env().context("builder configuration")?;
    if let Some(platform) = cli.registry.platform.clone() {
        config.platform = platform;
    }
    let resolver = resolver(&cli.registry, config.cache_capacity)?;

    match cli.command {
        Command::Pod {
            task,
            namespace,
            compact,
        } => {
            let task = read_task(&task, &namespace).await?;
            let builder = PodBuilder::new(Arc::new(MemoryApi::new()), resolver, Arc::new(config));
            let pod = builder
                .assemble(&task)
                .await
                .with_context(|| format!("rendering task {}/{}", task.namespace(), task.name()))?;
            info!(
                task = %task.name(),
                steps = pod.step_count(),
                "pod rendered"
            );
            let out = if compact {
                serde_json::to_string(&pod)?
            } else {
                serde_json::to_string_pretty(&pod)?
            };
            println!("{out}");
        }
        Command::Image { reference } => {
            let image = resolver
                .resolve(&reference)
                .await
                .with_context(|| format!("resolving {reference}"))?;
            println!("{} {}", image.name, image.digest);
            for (platform, command) in &image.commands {
                println!("  {platform:<16} {command}");
            }
        }
    }
    Ok(())
}

fn init_logging(args: &LogArgs) -> anyhow::Result<()> {
    let mut cfg = LoggerConfig::from_env()?;
    if let Some(format) = args.log_format {
        cfg.format = format;
    }
    if let Some(level) = &args.log_level {
        cfg.level = level.clone();
    }
    // stdout carries the rendered output
    cfg.to_stderr = true;
    logger_init(&cfg)?;
    Ok(())
}

fn resolver(args: &RegistryArgs, capacity: usize) -> anyhow::Result<Arc<ImageResolver>> {
    let registry = HttpRegistry::new(RegistryConfig {
        insecure: args.insecure.clone(),
        timeout: args.timeout.map(Duration::from_secs),
        ..RegistryConfig::default()
    })?;
    Ok(Arc::new(ImageResolver::new(
        Arc::new(registry),
        ImageCache::with_capacity(capacity),
    )))
}

/// Loads a task manifest, filling in what the platform would have assigned on admission.
async fn read_task(path: &Path, namespace: &str) -> anyhow::Result<Task> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?
    };

    let mut task: Task = serde_json::from_str(&raw).context("parsing task manifest")?;
    if task.metadata.namespace.is_empty() {
        task.metadata.namespace = namespace.to_string();
    }
    if task.metadata.uid.is_none() {
        let uid = uuid::Uuid::new_v4().to_string();
        debug!(%uid, "task has no uid; using a placeholder");
        task.metadata.uid = Some(uid);
    }
    Ok(task)
}
