//! Main entry point for the parz CLI app.

use std::process::ExitCode;

use parz::cli::{self, Commands, StdinPrompt};
use parz::error::{ArchiveError, Stage};
use parz::extract::{self, ReplaceAll, RestoreOptions};
use parz::{compress, stat, Archive};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let command = match cli::run() {
        Ok(command) => command,
        Err(e) => return e.exit(),
    };

    match run_app(command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("parz: {}", e);
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            exit_code(&e)
        }
    }
}

fn run_app(command: Commands) -> Result<(), ArchiveError> {
    match command {
        Commands::Create {
            output,
            inputs,
            codec,
            level,
        } => {
            let archive = Archive::create(output, codec, level)?;
            compress::create(&archive, &inputs)?;
            println!("{}", archive.path.display());
        }
        Commands::Extract {
            archive,
            output,
            integrity,
            replace_all,
        } => {
            let archive = Archive::open(archive)?;
            let opts = RestoreOptions {
                output_dir: output,
                integrity,
                replace_all,
            };
            let report = if replace_all {
                extract::restore(&archive, &opts, &mut ReplaceAll)?
            } else {
                extract::restore(&archive, &opts, &mut StdinPrompt)?
            };
            for path in &report.restored {
                println!("{}", path);
            }
            for path in &report.damaged {
                println!("{}: checksum mismatch", path);
            }
            for path in &report.skipped {
                println!("{}: skipped", path);
            }
        }
        Commands::List { archive } => {
            let archive = Archive::open(archive)?;
            for entry in stat::list(&archive)? {
                match entry {
                    parz::header::Entry::Link(l) => {
                        println!("{} -> {}", l.meta.arc_path, l.target)
                    }
                    other => println!("{}", other.arc_path()),
                }
            }
        }
        Commands::Stat { archive } => {
            let archive = Archive::open(archive)?;
            print!("{}", stat::scan(&archive)?.render());
        }
    }
    Ok(())
}

fn exit_code(err: &ArchiveError) -> ExitCode {
    match err.stage() {
        None => ExitCode::from(1),
        Some(Stage::Compress) => ExitCode::from(2),
        Some(Stage::Decompress) => ExitCode::from(3),
        Some(Stage::Integrity) => ExitCode::from(4),
    }
}
