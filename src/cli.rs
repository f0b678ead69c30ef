use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "snapstream")]
#[command(about = "Compress or decompress a snappy framed stream")]
#[command(author, version, long_about = None)]
pub struct Cli {
    /// Decompress the input instead of compressing it
    #[arg(short, long)]
    pub decompress: bool,

    /// Output file, `-` or absent for standard output
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Input file, `-` or absent for standard input
    pub input: Option<PathBuf>,
}

// `-` and absent both mean the standard stream
pub fn named(path: &Option<PathBuf>) -> Option<&Path> {
    match path.as_deref() {
        Some(p) if p != Path::new("-") => Some(p),
        _ => None,
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    IO(#[from] io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error("buffer_size must be greater than zero")]
    ZeroBuffer,
}

// Configuration
#[derive(Deserialize, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Size of the read buffer on the input and write buffer on the output
    pub buffer_size: usize,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            buffer_size: 64 * 1024,
            verbose: false,
        }
    }
}

impl Config {
    pub fn parse(content: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(content)?;
        if config.buffer_size == 0 {
            return Err(ConfigError::ZeroBuffer);
        }
        Ok(config)
    }

    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        match path {
            None => Ok(Config::default()),
            Some(path) => Config::parse(&fs::read_to_string(path)?),
        }
    }
}
