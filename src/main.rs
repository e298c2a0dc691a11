mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use skycache_core::{Config, ConfigError};
use skycache_weather::{
    JsonRenderer, RedisCache, RenderFormat, WeatherProvider, WeatherRenderer, WeatherResolver,
};
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;

/// Exit status for caller mistakes (empty location, unknown day).
const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = skycache_core::init() {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            if let Some(config_err) = e.downcast_ref::<ConfigError>() {
                eprintln!("{}", config_err.user_message());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let (config, _) = Config::load_validated(cli.config.as_deref())?;

    let cache = RedisCache::connect(&config.cache)
        .await
        .context("Failed to connect to Redis")?;
    let provider =
        WeatherProvider::new(&config.upstream).context("Failed to create weather client")?;
    let resolver = WeatherResolver::new(
        Arc::new(cache.clone()),
        Arc::new(provider),
        config.upstream.api_key.clone(),
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling request");
            on_interrupt.cancel();
        }
    });

    let renderer: Box<dyn WeatherRenderer> = match cli.format {
        RenderFormat::Json if cli.pretty => Box::new(JsonRenderer::pretty()),
        format => format.renderer(),
    };

    let location = cli.location();
    let outcome = match cli.day {
        Some(date) => resolver
            .resolve_day_with_cancel(&location, date, &cancel)
            .await
            .map(|day| renderer.render_day(&day)),
        None => resolver
            .resolve_with_cancel(&location, &cancel)
            .await
            .map(|result| renderer.render(&result)),
    };

    drop(resolver);
    cache.disconnect();

    match outcome {
        Ok(rendered) => {
            let output = rendered.context("Failed to render weather")?;
            println!("{}", output.trim_end());
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::warn!(kind = err.kind(), "Weather lookup failed: {}", err);
            println!("{}", renderer.render_error(&err).trim_end());
            eprintln!("{}", err.user_message());
            Ok(if err.is_client_error() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
