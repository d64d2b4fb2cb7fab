use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::Parser;
use log::{debug, error, LevelFilter};

use html_escaper::{ExtraSelector, Policy, PolicyConfig, Result, Sanitizer};

/// Sanitize untrusted HTML (or Markdown with embedded HTML) read from FILE
/// or stdin and write the result to stdout.
#[derive(Parser, Debug)]
#[command(name = "html-escaper", version)]
struct Cli {
    /// Input file; stdin when omitted
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Treat the input as a single open or close tag
    #[arg(long, conflicts_with = "markdown")]
    tag: bool,

    /// Treat the input as Markdown and sanitize its raw HTML
    #[arg(long)]
    markdown: bool,

    /// TOML policy file overriding the default allow-lists
    #[arg(short, long, value_name = "FILE")]
    policy: Option<PathBuf>,

    /// Additional elements to keep, as a CSS selector list (`x-card, div > span.note`)
    #[arg(short = 's', long, value_name = "SELECTOR")]
    extra_selector: Option<String>,

    /// Validate the policy, print it as TOML and exit
    #[arg(long)]
    print_policy: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long = "log-level", default_value = "warn")]
    log_level: String,
}

fn setup_logging(level: &str) {
    let filter = match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Warn,
    };

    env_logger::Builder::new()
        .filter_level(filter)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

fn main() {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    if let Err(e) = run(&cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match cli.policy {
        Some(ref path) => PolicyConfig::load(path)?,
        None => PolicyConfig::default(),
    };

    let policy = Policy::from_config(config)?;
    if cli.print_policy {
        print!("{}", policy.config().to_toml_string()?);
        return Ok(());
    }

    let extra = match cli.extra_selector {
        Some(ref source) => Some(ExtraSelector::parse(source)?),
        None => None,
    };

    let input = match cli.file {
        Some(ref path) => {
            debug!("reading {}", path.display());
            fs::read_to_string(path)?
        }
        None => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            input
        }
    };

    let sanitizer = Sanitizer::new(&policy);
    let output = if cli.tag {
        sanitizer.sanitize_tag(&input)
    } else if cli.markdown {
        html_escaper::markdown::render_markdown(sanitizer, &input)
    } else {
        sanitizer.sanitize_document_with(&input, extra.as_ref())
    };

    let mut stdout = io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    Ok(())
}
