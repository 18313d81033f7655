use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Parser;
use std::env;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod append;
mod cleanup;
mod cli;
mod discover;
mod document;
mod driver;
mod probe;
mod publish;
mod reconcile;
mod workflow;

use cleanup::CleanupClient;
use cli::{CheckArgs, Command, DailyArgs, DiscoverArgs, PublishArgs, RemoveGroupArgs, RootArgs};
use driver::DriverConfig;
use probe::HttpProber;
use publish::PublishClient;
use reconcile::{Eligibility, ReconcileOptions};
use workflow::DiscoverConfig;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = RootArgs::parse();
    match args.command {
        Command::Check(args) => cmd_check(args),
        Command::Discover(args) => cmd_discover(args),
        Command::Publish(args) => cmd_publish(args),
        Command::Daily(args) => cmd_daily(args),
        Command::RemoveGroup(args) => cmd_remove_group(args),
    }
}

fn reconcile_options(retry_errors: bool) -> ReconcileOptions {
    ReconcileOptions {
        eligibility: if retry_errors {
            Eligibility::RetryNonActive
        } else {
            Eligibility::PendingOnly
        },
    }
}

fn cmd_check(args: CheckArgs) -> Result<()> {
    let prober = HttpProber::new(Duration::from_secs(args.timeout_secs));
    let summary = workflow::check_dataset(
        &args.metadata,
        &prober,
        &reconcile_options(args.retry_errors),
    )?;
    println!(
        "probed {} distribution(s): {} activated, {} failed{}",
        summary.outcome.probed,
        summary.outcome.activated,
        summary.outcome.failed,
        if summary.saved { ", document saved" } else { "" }
    );
    Ok(())
}

fn cmd_discover(args: DiscoverArgs) -> Result<()> {
    let prober = HttpProber::new(Duration::from_secs(args.timeout_secs));
    let config = DiscoverConfig {
        url_template: args.url_template,
        title: args.title,
        today: Utc::now().date_naive(),
    };
    let hasher = args.with_sha256.then_some(&prober);
    let summary = workflow::discover_dataset(&args.metadata, &prober, hasher, &config)?;
    let note = if summary.saved { ", document saved" } else { "" };
    match summary.appended {
        Some(version) => println!("appended release {version}{note}"),
        None => println!("no new release{note}"),
    }
    Ok(())
}

fn cmd_publish(args: PublishArgs) -> Result<()> {
    let client = PublishClient::new(args.api_base, Duration::from_secs(args.timeout_secs));
    workflow::publish_dataset(&args.metadata, &client)
}

fn cmd_daily(args: DailyArgs) -> Result<()> {
    let prober = HttpProber::new(Duration::from_secs(args.timeout_secs));
    let config = DriverConfig {
        reconcile: reconcile_options(args.retry_errors),
        today: Utc::now().date_naive(),
    };
    let outcome = driver::run_all(&args.root, &prober, &config)?;
    println!(
        "{} processed, {} failed, {} skipped",
        outcome.processed, outcome.failed, outcome.skipped
    );
    if outcome.failed > 0 {
        return Err(anyhow!("{} dataset(s) failed", outcome.failed));
    }
    Ok(())
}

fn cmd_remove_group(args: RemoveGroupArgs) -> Result<()> {
    // Same convention as publishing: the account name doubles as the
    // name of the environment variable holding the API key.
    let api_key = env::var(&args.account)
        .map_err(|_| anyhow!("API key environment variable `{}` is not set", args.account))?;
    let client = CleanupClient::new(
        args.api_base,
        args.sparql_endpoint,
        Duration::from_secs(args.timeout_secs),
    );
    let report = client.remove_group(&args.account, &args.group, &api_key)?;
    println!("{} deleted, {} failed", report.deleted, report.failed);
    if report.failed > 0 {
        return Err(anyhow!("{} delete(s) failed", report.failed));
    }
    Ok(())
}
