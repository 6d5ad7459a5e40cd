use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use glycoscorer::{GlycoScorer, GlycoScorerError};

fn configure_log(log_file: Option<&PathBuf>) -> io::Result<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer().compact().with_writer(io::stderr).with_filter(
        EnvFilter::builder()
            .with_default_directive(tracing::Level::INFO.into())
            .from_env_lossy(),
    );

    if let Some(log_file) = log_file {
        let handle = std::fs::File::create(log_file)?;
        let (writer, guard) = tracing_appender::non_blocking(handle);
        let file_layer = fmt::layer()
            .compact()
            .with_ansi(false)
            .with_timer(fmt::time::ChronoLocal::rfc_3339())
            .with_writer(writer)
            .with_filter(
                EnvFilter::builder()
                    .with_default_directive(tracing::Level::DEBUG.into())
                    .from_env_lossy(),
            );
        tracing_subscriber::registry()
            .with(stderr_layer)
            .with(file_layer)
            .init();
        Ok(Some(guard))
    } else {
        tracing_subscriber::registry().with(stderr_layer).init();
        Ok(None)
    }
}

fn main() -> Result<(), GlycoScorerError> {
    let matches = GlycoScorer::command().get_matches();
    let args = GlycoScorer::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let mut config = Figment::new()
        .merge(Serialized::defaults(&args))
        .merge(Toml::file("glycoscorer.toml"));
    if let Some(config_file) = args.config_file.as_ref() {
        config = config.merge(Toml::file_exact(config_file));
    }
    // Flags given on the command line win over files and the environment
    let driver: GlycoScorer = config
        .merge(Env::prefixed("GLYCOSCORER_"))
        .merge(Serialized::defaults(args.explicit_arguments(&matches)?))
        .extract()?;

    let _guard = configure_log(driver.log_file.as_ref())?;
    driver.main()?;
    Ok(())
}
