use std::io::Write;

use anyhow::{bail, Context};
use clap::Parser;
use inquire::error::InquireResult;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod config;
mod export;
mod lock;
mod semantic;
mod shell;
mod storage;
#[cfg(test)]
mod tests;
mod web;

use app::AppFactory;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_logging();

    match args.command {
        cli::Command::Daemon {} => {
            let paths = AppFactory::get_paths()?;
            let _lock = lock::FileLock::try_acquire(&paths.base_path)
                .context("Failed to lock the store directory")?;
            let config = AppFactory::create_config(&paths)?;
            let service = AppFactory::create_service(&paths, &config)?;
            web::start_daemon(config, service)
        }

        cli::Command::Shell {} => shell::run(&AppFactory::create_remote()),

        cli::Command::List {} => {
            let pdfs = AppFactory::create_remote().list_pdfs()?;
            print_json(&web::ListResponse { pdfs })
        }

        cli::Command::Upload { path } => {
            if !path.is_file() {
                bail!("File not found: {}", path.display());
            }
            print_json(&AppFactory::create_remote().upload_pdf(&path)?)
        }

        cli::Command::Delete { name } => {
            print_json(&AppFactory::create_remote().delete_pdf(&name)?)
        }

        cli::Command::Reset { yes } => {
            if !yes {
                match shell::confirm_reset() {
                    InquireResult::Ok(true) => {}
                    InquireResult::Ok(false) => {
                        println!("Reset cancelled.");
                        return Ok(());
                    }
                    InquireResult::Err(err) => bail!("An error occurred: {}", err),
                }
            }
            print_json(&AppFactory::create_remote().reset()?)
        }

        cli::Command::Search { query, top_k, pdf } => {
            let resp = AppFactory::create_remote().search(&query, top_k, pdf.as_deref())?;
            print_json(&resp)
        }

        cli::Command::Export { name, output } => {
            let paths = AppFactory::get_paths()?;
            let config = AppFactory::create_config(&paths)?;
            let store = AppFactory::create_store(&paths, &config)?;
            if !store.exists(&name) {
                bail!("{name} is not indexed");
            }
            let entry = store.load(&name)?;

            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("could not create {}", path.display()))?;
                    export::write_csv(&entry, file)?;
                    log::info!("Embeddings for {name} saved to {}", path.display());
                }
                None => {
                    let stdout = std::io::stdout();
                    let mut lock = stdout.lock();
                    export::write_csv(&entry, &mut lock)?;
                    lock.flush()?;
                }
            }
            Ok(())
        }
    }
}
