//! bookwriter - parse, format and paginate manuscripts

use std::fmt;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bookwriter::{Book, ManuscriptParser, ParseError, ParseOptions};
use bookwriter_render::{FrameType, LayoutConfig, LayoutEngine, LayoutError, PageSize, RenderTree};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "bookwriter")]
#[command(version, about = "Manuscript parser and paginator", long_about = None)]
#[command(after_help = "EXAMPLES:
    bookwriter parse novel.bk --pretty          Print the parsed book as JSON
    bookwriter layout novel.bk --summary        Show which page each chapter lands on
    bookwriter layout novel.bk --page-size a4   Paginate for A4 paper
    bookwriter fmt novel.bk                     Print the canonical manuscript")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a manuscript and print the book as JSON
    Parse {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Reject unknown metadata fields and chapters without pages
        #[arg(long)]
        strict: bool,

        /// Indent the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Paginate a manuscript and print the render tree
    Layout {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// JSON layout configuration; missing fields take their defaults
        #[arg(long, value_name = "JSON")]
        config: Option<PathBuf>,

        /// Page size preset, overriding the configuration file
        #[arg(long, value_enum)]
        page_size: Option<PageSizeArg>,

        /// Reject unknown metadata fields and chapters without pages
        #[arg(long)]
        strict: bool,

        /// Indent the JSON output
        #[arg(long, conflicts_with = "summary")]
        pretty: bool,

        /// Print one line per page instead of JSON
        #[arg(long)]
        summary: bool,
    },

    /// Print a manuscript in canonical form
    Fmt {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PageSizeArg {
    Letter,
    A4,
}

impl From<PageSizeArg> for PageSize {
    fn from(value: PageSizeArg) -> Self {
        match value {
            PageSizeArg::Letter => PageSize::US_LETTER,
            PageSizeArg::A4 => PageSize::A4,
        }
    }
}

#[derive(Debug)]
enum CliError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: ParseError,
    },
    Config {
        path: PathBuf,
        source: serde_json::Error,
    },
    Layout(LayoutError),
    Output(serde_json::Error),
}

impl CliError {
    fn help(&self) -> Option<String> {
        match self {
            Self::Io { .. } => Some("Check that the file exists and is readable.".to_string()),
            Self::Parse { source, .. } => Some(source.help()),
            Self::Config { .. } => Some(
                "The layout configuration must be a JSON object; see LayoutConfig for field names."
                    .to_string(),
            ),
            Self::Layout(err) => Some(err.help()),
            Self::Output(_) => None,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            Self::Parse { path, source } => write!(f, "{}: {}", path.display(), source),
            Self::Config { path, source } => {
                write!(f, "invalid layout config {}: {}", path.display(), source)
            }
            Self::Layout(err) => write!(f, "layout failed: {err}"),
            Self::Output(err) => write!(f, "failed to serialize output: {err}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<LayoutError> for CliError {
    fn from(value: LayoutError) -> Self {
        Self::Layout(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Output(value)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            if let Some(help) = e.help() {
                eprintln!("help: {help}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(command: Command) -> Result<String, CliError> {
    match command {
        Command::Parse {
            file,
            strict,
            pretty,
        } => {
            let book = load_book(&file, options(strict))?;
            let json = if pretty {
                serde_json::to_string_pretty(&book)?
            } else {
                serde_json::to_string(&book)?
            };
            Ok(json)
        }
        Command::Layout {
            file,
            config,
            page_size,
            strict,
            pretty,
            summary,
        } => {
            let book = load_book(&file, options(strict))?;
            let mut cfg = match config {
                Some(path) => load_config(&path)?,
                None => LayoutConfig::default(),
            };
            if let Some(size) = page_size {
                cfg.page_size = size.into();
            }
            let tree = LayoutEngine::new(cfg).layout(&book)?;
            if summary {
                Ok(summarize(&book, &tree))
            } else if pretty {
                Ok(tree.to_json_pretty()?)
            } else {
                Ok(tree.to_json()?)
            }
        }
        Command::Fmt { file } => {
            let (book, has_id) = load_manuscript(&file, ParseOptions::default())?;
            // A generated id would differ on every run.
            let text = if has_id {
                book.to_manuscript().to_string()
            } else {
                book.to_manuscript().without_id().to_string()
            };
            Ok(text.trim_end().to_string())
        }
    }
}

fn options(strict: bool) -> ParseOptions {
    if strict {
        ParseOptions::strict()
    } else {
        ParseOptions::default()
    }
}

/// Creation and modification times of a file, falling back to now.
fn file_timestamps(meta: &fs::Metadata) -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();
    let created = meta.created().map(DateTime::<Utc>::from).unwrap_or(now);
    let updated = meta.modified().map(DateTime::<Utc>::from).unwrap_or(created);
    (created, updated)
}

fn load_book(path: &Path, options: ParseOptions) -> Result<Book, CliError> {
    load_manuscript(path, options).map(|(book, _)| book)
}

/// Parse `path`, also reporting whether the file carried an `@id:` line.
fn load_manuscript(path: &Path, options: ParseOptions) -> Result<(Book, bool), CliError> {
    let io_err = |source| CliError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parse_err = |source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let (created_at, updated_at) = file_timestamps(&file.metadata().map_err(io_err)?);
    log::debug!("parsing {} (modified {})", path.display(), updated_at);

    let mut parser = ManuscriptParser::with_options(options);
    parser.push_reader(BufReader::new(file)).map_err(parse_err)?;
    let has_id = parser.has_id();
    let book = parser.finish(created_at, updated_at).map_err(parse_err)?;
    Ok((book, has_id))
}

fn load_config(path: &Path) -> Result<LayoutConfig, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Config {
        path: path.to_path_buf(),
        source,
    })
}

fn summarize(book: &Book, tree: &RenderTree) -> String {
    let mut out = format!(
        "{} by {}: {} pages, {} chapters\n",
        book.title, book.author, tree.metadata.total_pages, tree.metadata.total_chapters
    );
    for page in &tree.pages {
        let mut parts = Vec::new();
        if page.is_blank() {
            parts.push("blank".to_string());
        }
        if page.frame(FrameType::Dedication).is_some() {
            parts.push("dedication".to_string());
        }
        if let Some(title) = page.frame(FrameType::ChapterTitle) {
            parts.push(format!("chapter \"{}\"", title.line_texts().join(" ")));
        }
        if let Some(body) = page.frame(FrameType::BodyText) {
            parts.push(format!("{} lines", body.lines.len()));
        }
        out.push_str(&format!(
            "{:>4} {:<5} {}\n",
            page.page_number,
            format!("{:?}", page.side),
            parts.join(", ")
        ));
    }
    out.trim_end().to_string()
}
