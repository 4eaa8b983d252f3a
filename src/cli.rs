use clap::Parser;

use crate::package::ResolveOptions;
use crate::xml::{DEFAULT_DEPTH, ParseOptions};

#[derive(Parser, Debug)]
#[command(name = "epub-package")]
#[command(version)]
#[command(about = "Print the package document (content.opf) of an EPUB", long_about = None)]
#[command(after_help = "Examples:\n  \
  epub-package book.epub                      show the package element and its children\n  \
  epub-package book.epub --find package/metadata --depth 2\n  \
  epub-package book.epub --find package/metadata/dc:title --text\n  \
  epub-package -l book.epub                   list archive entries")]
pub struct Cli {
    /// EPUB file path
    #[arg(value_name = "FILE")]
    pub file: String,

    /// List archive entries instead of reading the package document
    #[arg(short = 'l')]
    pub list: bool,

    /// Select a node by slash-separated element names (case-insensitive)
    #[arg(long, value_name = "PATH")]
    pub find: Option<String>,

    /// Levels of children to print
    #[arg(long, default_value_t = DEFAULT_DEPTH)]
    pub depth: usize,

    /// Print the text content of the selected node
    #[arg(long)]
    pub text: bool,

    /// Keep comments from the package document
    #[arg(long)]
    pub comments: bool,

    /// Drop leading whitespace-only text nodes
    #[arg(long)]
    pub strip_whitespace: bool,

    /// Report the outcome and diagnostics as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Verbose listing with -l, more logging otherwise (-vv => debug)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Do not print diagnostics
    #[arg(short = 'q')]
    pub quiet: bool,
}

impl Cli {
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            parse: ParseOptions {
                preserve_comments: self.comments,
                remove_trailing_whitespaces: self.strip_whitespace,
            },
        }
    }

    /// Path segments of `--find`, empty segments dropped
    pub fn find_path(&self) -> Vec<&str> {
        self.find
            .as_deref()
            .map(|p| p.split('/').filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Default log filter, used unless `RUST_LOG` is set
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "epub_package=warn",
            1 => "epub_package=info",
            _ => "epub_package=debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from([
            "epub-package",
            "book.epub",
            "--find",
            "/package//metadata/",
            "--depth",
            "3",
            "--comments",
            "-vv",
        ]);
        assert_eq!(cli.file, "book.epub");
        assert_eq!(cli.find_path(), vec!["package", "metadata"]);
        assert_eq!(cli.depth, 3);
        assert!(cli.resolve_options().parse.preserve_comments);
        assert!(!cli.resolve_options().parse.remove_trailing_whitespaces);
        assert_eq!(cli.log_filter(), "epub_package=debug");
    }

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["epub-package", "book.epub"]);
        assert_eq!(cli.depth, DEFAULT_DEPTH);
        assert!(cli.find_path().is_empty());
        assert_eq!(cli.resolve_options(), ResolveOptions::default());
        assert_eq!(cli.log_filter(), "epub_package=warn");
    }
}
