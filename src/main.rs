use clap::{Parser, Subcommand};
use periodic_backup::backup::executor::{find_backup, run_restore, BackupConfig};
use periodic_backup::backup::location::{Location, LocationConfig};
use periodic_backup::backup::result_error::error::Error;
use periodic_backup::backup::result_error::WithMsg;
use std::fs::File;
use std::path::PathBuf;
use std::process::exit;
use tracing::error;
use validator::Validate;

/// Back up an application data directory to one or more storage locations,
/// and restore from them.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file
    #[arg(short, long)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one backup cycle to every configured location
    Backup,
    /// List the backups available at one configured location
    List {
        /// Index of the location in the config file, starting at 0
        #[arg(short, long, default_value_t = 0)]
        location: usize,
    },
    /// Restore one stored backup into a target directory
    Restore {
        /// Index of the location in the config file, starting at 0
        #[arg(short, long, default_value_t = 0)]
        location: usize,
        /// Base name of the backup to restore, as printed by `list`
        #[arg(short, long)]
        backup: String,
        /// Directory to restore into
        #[arg(short, long)]
        target: PathBuf,
    },
}

fn load_config(path: &PathBuf) -> Result<BackupConfig, Error> {
    File::open(path)
        .map_err(Error::from)
        .and_then(|f| {
            serde_yml::from_reader::<_, BackupConfig>(f)
                .map_err(Error::from)
                .with_msg(format!("Parse YAML config failed: {:?}", path))
        })
        .and_then(|bc| {
            bc.validate()
                .map_err(Error::from)
                .map(|_| bc)
                .with_msg(format!("Config validation failed: {:?}", path))
        })
}

fn location_at(config: &BackupConfig, idx: usize) -> Result<&LocationConfig, Error> {
    config.locations().get(idx).ok_or_else(|| {
        Error::from(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!(
                "no location with index {idx}, config has {}",
                config.locations().len()
            ),
        ))
    })
}

fn run(args: Args) -> Result<(), Error> {
    let config = load_config(&args.config)?;

    match args.command {
        Command::Backup => {
            let report = config.run_backup()?;
            print!("{report}");
            report.into_result()?;
        }
        Command::List { location } => {
            let location = location_at(&config, location)?;
            let manifests = location.list_available_backups()?;
            if manifests.is_empty() {
                println!("no backups at {}", location.display_id());
            }
            for manifest in manifests {
                println!(
                    "{}  ({} archive(s), taken {})",
                    manifest.file_name_base(),
                    manifest.archives().len(),
                    manifest.timestamp()
                );
            }
        }
        Command::Restore {
            location,
            backup,
            target,
        } => {
            let location = location_at(&config, location)?;
            let manifest = find_backup(location, &backup)?;
            let report = run_restore(location, &manifest, &target, config.temp_dir())?;
            println!("{report}");
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        error!("{e}");
        exit(1);
    }
}
