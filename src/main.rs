//! Main entry point for the epub-package CLI application.
//!
//! Opens an EPUB, resolves its package document and prints it, or a node
//! selected from it.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use epub_package::xml::{child_for_path, extract_all_text, xml2string};
use epub_package::{
    Cli, Diagnostic, EpubArchive, LocalFileReader, Outcome, XmlTree, open_epub,
    resolve_package_document_with,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the package document was read.
async fn run(cli: &Cli) -> Result<bool> {
    let archive = open_epub(Path::new(&cli.file)).await?;

    if cli.list {
        list_files(&archive, cli.verbose > 0);
        return Ok(true);
    }

    let outcome = resolve_package_document_with(&archive, &cli.resolve_options()).await;

    if cli.json {
        print_json(cli, &outcome)?;
    } else {
        if !cli.quiet {
            print_diagnostics(outcome.diagnostics());
        }
        if let Some(tree) = outcome.value() {
            print_node(cli, tree);
        }
    }

    Ok(outcome.is_success())
}

fn print_node(cli: &Cli, tree: &XmlTree) {
    let segments = cli.find_path();
    let Some(node) = child_for_path(tree.root(), &segments) else {
        if !cli.quiet {
            eprintln!("warning: nothing at {}", segments.join("/"));
        }
        return;
    };

    if cli.text {
        println!("{}", extract_all_text(node));
    } else {
        println!("{}", xml2string(node, cli.depth));
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        match &diagnostic.data {
            Some(data) => eprintln!("warning: {diagnostic} ({data})"),
            None => eprintln!("warning: {diagnostic}"),
        }
    }
}

fn print_json(cli: &Cli, outcome: &Outcome<XmlTree>) -> Result<()> {
    let selected = outcome.value().and_then(|tree| {
        child_for_path(tree.root(), &cli.find_path()).map(|node| {
            if cli.text {
                extract_all_text(node)
            } else {
                xml2string(node, cli.depth)
            }
        })
    });
    let report = json!({
        "success": outcome.is_success(),
        "diagnostics": outcome.diagnostics(),
        "node": selected,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// List the archive entries.
///
/// The verbose table shows sizes, compression ratio and method, and timestamps.
fn list_files(archive: &EpubArchive<LocalFileReader>, verbose: bool) {
    let entries = archive.entries();

    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:<8}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Method", "Date", "Time"
        );
        println!("{}", "-".repeat(80));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        if !verbose {
            println!("{}", entry.name);
            continue;
        }

        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();
        println!(
            "{:>10}  {:>10}  {}  {:<8}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            entry.compression_method.label(),
            year,
            month,
            day,
            hour,
            minute,
            entry.name
        );

        if !entry.is_directory() {
            total_uncompressed = total_uncompressed.saturating_add(entry.uncompressed_size);
            total_compressed = total_compressed.saturating_add(entry.compressed_size);
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(80));
        println!(
            "{:>10}  {:>10}  {}  {:>31}  {} files",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
    }
}

/// Space saved, as a right-aligned percentage
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        // Widened so ZIP64 sizes cannot overflow
        let kept = u128::from(compressed) * 100 / u128::from(uncompressed);
        format!("{:>4}%", 100 - kept)
    } else {
        "  0%".to_string()
    }
}
