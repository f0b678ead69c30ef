use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use log::{debug, error, info, LevelFilter};
use thiserror::Error;

use snapstream::{FrameError, Reader, Writer};

mod cli;
use crate::cli::{named, Cli, Config, ConfigError};

#[derive(Error, Debug)]
enum AppError {
    #[error("config {}: {}", .path.display(), .source)]
    Config { path: PathBuf, source: ConfigError },
    #[error("open {}: {}", .path.display(), .source)]
    Open { path: PathBuf, source: io::Error },
    #[error("create {}: {}", .path.display(), .source)]
    Create { path: PathBuf, source: io::Error },
    #[error(transparent)]
    IO(#[from] io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

fn main() -> ExitCode {
    // Parse the cli
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());

    let verbose = cli.verbose || config.as_ref().map_or(false, |c| c.verbose);
    env_logger::Builder::new()
        .filter_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    let res = config
        .map_err(|source| AppError::Config {
            path: cli.config.clone().unwrap_or_default(),
            source,
        })
        .and_then(|config| run(&cli, &config));

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: &Config) -> Result<(), AppError> {
    debug!("CONFIG: {:?}", config);

    let input: Box<dyn Read> = match named(&cli.input) {
        None => Box::new(io::stdin().lock()),
        Some(path) => Box::new(File::open(path).map_err(|source| AppError::Open {
            path: path.to_path_buf(),
            source,
        })?),
    };
    let input = BufReader::with_capacity(config.buffer_size, input);

    let output: Box<dyn Write> = match named(&cli.output) {
        None => Box::new(io::stdout().lock()),
        Some(path) => Box::new(File::create(path).map_err(|source| AppError::Create {
            path: path.to_path_buf(),
            source,
        })?),
    };
    let mut output = BufWriter::with_capacity(config.buffer_size, output);

    if cli.decompress {
        decompress(input, &mut output)?;
    } else {
        compress(input, &mut output)?;
    }
    output.flush()?;
    Ok(())
}

fn compress<R: Read, W: Write>(mut input: R, output: W) -> Result<u64, AppError> {
    let start = Instant::now();

    let mut writer = Writer::new(output)?.with_logger(log::logger());
    let len = io::copy(&mut input, &mut writer)?;
    writer.close()?;

    info!("Finished compression, read {} bytes in {:?}", len, start.elapsed());
    Ok(len)
}

fn decompress<R: Read, W: Write>(input: R, mut output: W) -> Result<u64, AppError> {
    let start = Instant::now();

    let mut reader = Reader::new(input)?.with_logger(log::logger());
    let len = io::copy(&mut reader, &mut output)?;

    info!("Finished decompression, wrote {} bytes in {:?}", len, start.elapsed());
    Ok(len)
}
