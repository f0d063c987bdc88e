//! pathkv CLI
//!
//! Inspect and edit a single config file from the command line.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use pathkv::manager::persist_to;
use pathkv::{BinaryBackend, ConfigBackend, ConfigStore, IniBackend, PathKvError};
use tracing_subscriber::{fmt, EnvFilter};

/// pathkv CLI
#[derive(Parser, Debug)]
#[command(name = "pathkv-cli")]
#[command(about = "Read and write path-addressed config files")]
#[command(version)]
struct Args {
    /// Store file
    #[arg(short, long)]
    file: PathBuf,

    /// Store format
    #[arg(long, value_enum, default_value_t = Format::Ini)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Ini,
    Binary,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the value at a path
    Get {
        /// Dotted path, e.g. App.Name
        path: String,
    },

    /// Store a value at a path
    Set {
        /// Dotted path
        path: String,

        /// Value to store
        value: String,
    },

    /// Store a list of values at a path
    SetArray {
        /// Dotted path
        path: String,

        /// Elements to store
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Print the elements stored at a path, one per line
    GetArray {
        /// Dotted path
        path: String,
    },

    /// Print every path and its value
    Dump,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pathkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!("pathkv CLI v{}", pathkv::VERSION);

    let outcome = match args.format {
        Format::Ini => run::<IniBackend>(&args),
        Format::Binary => run::<BinaryBackend>(&args),
    };

    if let Err(e) = outcome {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run<B: ConfigBackend + 'static>(args: &Args) -> pathkv::Result<()> {
    match &args.command {
        Commands::Get { path } => {
            let store = open_existing::<B>(&args.file)?;
            println!("{}", store.get_str(path)?);
        }
        Commands::GetArray { path } => {
            let store = open_existing::<B>(&args.file)?;
            for item in store.get_array::<String>(path)? {
                println!("{}", item);
            }
        }
        Commands::Dump => {
            let store = open_existing::<B>(&args.file)?;
            for path in store.paths() {
                match store.get_str(&path) {
                    Ok(value) => println!("{}={}", path, value),
                    Err(_) => println!("{}=<opaque>", path),
                }
            }
        }
        Commands::Set { path, value } => {
            let mut store = open_or_create::<B>(&args.file)?;
            store.set_str(path, value)?;
            tracing::info!("Set '{}' in {}", path, args.file.display());
        }
        Commands::SetArray { path, values } => {
            let mut store = open_or_create::<B>(&args.file)?;
            store.set_array(path, values.clone())?;
            tracing::info!("Set {} elements at '{}' in {}", values.len(), path, args.file.display());
        }
    }
    Ok(())
}

/// Load the file, failing when it is missing or malformed
fn open_existing<B: ConfigBackend>(file: &Path) -> pathkv::Result<ConfigStore<B>> {
    if !file.exists() {
        return Err(PathKvError::ResourceUnavailable {
            path: file.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "store file does not exist"),
        });
    }

    let mut store = ConfigStore::<B>::default();
    if !store.init_from_file(file) {
        return Err(PathKvError::Initialization(format!(
            "cannot load {}",
            file.display()
        )));
    }
    Ok(store)
}

/// Load the file (or start empty when missing) and persist every change to it
fn open_or_create<B: ConfigBackend>(file: &Path) -> pathkv::Result<ConfigStore<B>> {
    let store = if file.exists() {
        open_existing::<B>(file)?
    } else {
        tracing::info!("Creating {}", file.display());
        ConfigStore::<B>::default()
    };
    Ok(store.observed_by(persist_to(file)))
}
