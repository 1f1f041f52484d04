mod cli;
mod config;
mod storage;

use clap::Parser;
use color_eyre::Result;
use keyhold_core::{catalog::default_registry, crypto::EncryptionService, error::StoreError};
use keyhold_store::engine::SecureStorageEngine;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Entry point: a thin pass-through over the secure storage engine. No
/// command path ever prints a decrypted key.
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command {
        cli::Command::Set { provider, key } => {
            let engine = storage::open_engine(&config).await?;
            run_set(&engine, &provider, key).await?;
        }
        cli::Command::Rm { provider } => {
            let engine = storage::open_engine(&config).await?;
            engine.delete(&provider).await.map_err(to_eyre)?;
            println!("Removed key for {provider}");
        }
        cli::Command::List => {
            let engine = storage::open_engine(&config).await?;
            run_list(&engine).await;
        }
        cli::Command::Show { provider } => {
            let engine = storage::open_engine(&config).await?;
            run_show(&engine, &provider).await;
        }
        cli::Command::Check { provider } => {
            let engine = storage::open_engine(&config).await?;
            run_check(&engine, &provider).await?;
        }
        cli::Command::Providers => run_providers(),
        cli::Command::Config(cli::ConfigCommand::Init) => init_config(&config)?,
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

async fn run_set<E: EncryptionService>(
    engine: &SecureStorageEngine<E>,
    provider: &str,
    key: Option<String>,
) -> Result<()> {
    let key = match key {
        Some(key) => key,
        None => read_key_from_stdin()?,
    };
    engine.store(provider, &key).await.map_err(to_eyre)?;

    let info = engine.get_display_info(provider).await;
    match info.last_four {
        Some(tail) => println!("Stored key for {provider} (****{tail})"),
        None => println!("Stored key for {provider}"),
    }
    Ok(())
}

async fn run_list<E: EncryptionService>(engine: &SecureStorageEngine<E>) {
    let identifiers = engine.list_stored_identifiers().await;
    if identifiers.is_empty() {
        println!("No stored keys");
        return;
    }
    for identifier in identifiers {
        let info = engine.get_display_info(&identifier).await;
        match info.last_four {
            Some(tail) => println!("{identifier}  ****{tail}"),
            None => println!("{identifier}"),
        }
    }
}

async fn run_show<E: EncryptionService>(engine: &SecureStorageEngine<E>, provider: &str) {
    let info = engine.get_display_info(provider).await;
    if info.is_stored {
        match info.last_four {
            Some(tail) => println!("{provider}: stored (****{tail})"),
            None => println!("{provider}: stored"),
        }
    } else {
        println!("{provider}: not stored");
    }
}

/// Prove the stored key decrypts and still matches its provider format
/// without letting the plaintext out of the callback scope.
async fn run_check<E: EncryptionService>(
    engine: &SecureStorageEngine<E>,
    provider: &str,
) -> Result<()> {
    engine
        .with_decrypted_secret(provider, |_| ())
        .await
        .map_err(to_eyre)?;
    println!("{provider}: key decrypts and matches the expected format");
    Ok(())
}

fn run_providers() {
    for identifier in default_registry().identifiers() {
        println!("{identifier}");
    }
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

fn read_key_from_stdin() -> Result<String> {
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let key = line.trim();
    if key.is_empty() {
        color_eyre::eyre::bail!("no key provided on stdin");
    }
    Ok(key.to_string())
}

fn to_eyre(err: StoreError) -> color_eyre::Report {
    color_eyre::eyre::eyre!(err.to_string())
}
