//! Interactive menu client.
//!
//! Loops over a menu of API operations until the user picks Exit or
//! cancels with Esc / Ctrl+C.

use std::fmt::Display;
use std::path::PathBuf;

use inquire::{error::InquireResult, InquireError, Select, Text};

use crate::app::AppRemote;
use crate::web::SearchResponse;

const SHELL_TOP_K: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    List,
    Upload,
    Delete,
    Reset,
    Search,
    Exit,
}

impl MenuItem {
    const ALL: [MenuItem; 6] = [
        MenuItem::List,
        MenuItem::Upload,
        MenuItem::Delete,
        MenuItem::Reset,
        MenuItem::Search,
        MenuItem::Exit,
    ];
}

impl Display for MenuItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MenuItem::List => "List PDFs",
            MenuItem::Upload => "Upload PDF",
            MenuItem::Delete => "Delete PDF",
            MenuItem::Reset => "Reset DB",
            MenuItem::Search => "Search",
            MenuItem::Exit => "Exit",
        };
        f.write_str(label)
    }
}

pub fn run(remote: &AppRemote) -> anyhow::Result<()> {
    loop {
        println!("\n=== PDF Vector DB Client ===");
        let choice = match Select::new("Choose an option:", MenuItem::ALL.to_vec()).prompt() {
            Ok(choice) => choice,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                MenuItem::Exit
            }
            Err(err) => return Err(err.into()),
        };

        let result = match choice {
            MenuItem::List => list(remote),
            MenuItem::Upload => upload(remote),
            MenuItem::Delete => delete(remote),
            MenuItem::Reset => reset(remote),
            MenuItem::Search => search(remote),
            MenuItem::Exit => {
                println!("Goodbye!");
                return Ok(());
            }
        };

        // a failed request or a cancelled prompt returns to the menu
        if let Err(err) = result {
            println!("Error: {err}");
        }
    }
}

fn list(remote: &AppRemote) -> anyhow::Result<()> {
    let pdfs = remote.list_pdfs()?;
    println!("Indexed PDFs: {pdfs:?}");
    Ok(())
}

fn upload(remote: &AppRemote) -> anyhow::Result<()> {
    let path = PathBuf::from(Text::new("Enter path to PDF:").prompt()?.trim());
    if !path.exists() {
        println!("File not found.");
        return Ok(());
    }

    let resp = remote.upload_pdf(&path)?;
    println!("{}", serde_json::to_string_pretty(&resp)?);
    Ok(())
}

fn delete(remote: &AppRemote) -> anyhow::Result<()> {
    let name = Text::new("Enter PDF name to delete (without .pdf):").prompt()?;
    let resp = remote.delete_pdf(name.trim())?;
    println!("{}", serde_json::to_string_pretty(&resp)?);
    Ok(())
}

fn reset(remote: &AppRemote) -> anyhow::Result<()> {
    match confirm_reset() {
        InquireResult::Ok(true) => {
            let resp = remote.reset()?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        InquireResult::Ok(false) => println!("Reset cancelled."),
        InquireResult::Err(err) => return Err(err.into()),
    }
    Ok(())
}

pub fn confirm_reset() -> InquireResult<bool> {
    inquire::prompt_confirmation("Are you sure you want to reset everything?")
}

fn search(remote: &AppRemote) -> anyhow::Result<()> {
    let query = Text::new("Enter your search query:").prompt()?;
    let pdf = Text::new("Search in one PDF (enter name) or press Enter for all:").prompt()?;
    let pdf = Some(pdf.trim()).filter(|p| !p.is_empty());

    let resp = remote.search(query.trim(), Some(SHELL_TOP_K), pdf)?;
    print!("{}", format_results(&resp));
    Ok(())
}

pub fn format_results(resp: &SearchResponse) -> String {
    let mut out = String::from("\nSearch Results:\n");
    if let Some(message) = &resp.message {
        out.push_str(&format!("{message}\n"));
    }
    for hit in &resp.results {
        out.push_str(&format!(
            "- PDF: {} | Page: {} | Score: {:.4}\n",
            hit.pdf, hit.page, hit.score
        ));
        out.push_str(&format!("  Text: {}\n\n", hit.text));
    }
    out
}
