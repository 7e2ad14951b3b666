use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use honeyclient::{analyze, Options, Personality, RunSummary, Session};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "honeyclient")]
#[command(about = "Low-interaction honeyclient: load a page, run its scripts and events, log what it does", long_about = None)]
struct Args {
    /// URL or local HTML file to analyze
    #[arg(required_unless_present = "list_personalities")]
    target: Option<String>,

    /// YAML options file (defaults to $HONEYCLIENT_CONFIG, then the user config dir)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Browser personality to emulate
    #[arg(short, long)]
    personality: Option<String>,

    /// Additional DOM event to fire on elements (repeatable)
    #[arg(short, long = "event", value_name = "EVENT")]
    events: Vec<String>,

    /// Follow meta refresh directives
    #[arg(long)]
    follow_meta_refresh: bool,

    /// Load frames and iframes into child windows
    #[arg(long)]
    follow_frames: bool,

    /// Follow hyperlinks after the dispatch passes
    #[arg(long)]
    follow_links: bool,

    /// Fetch @font-face sources found in inline styles
    #[arg(long)]
    inspect_font_faces: bool,

    /// Maximum depth of nested navigations
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Print the available personalities and exit
    #[arg(long)]
    list_personalities: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    if args.list_personalities {
        for personality in Personality::all() {
            println!("{:<16} {}", personality.key, personality.description);
        }
        return Ok(());
    }

    let mut options = Options::load(args.config).context("failed to load options")?;
    if let Some(personality) = args.personality {
        options.personality = personality;
    }
    options.events.extend(args.events);
    options.follow_meta_refresh |= args.follow_meta_refresh;
    options.follow_frames |= args.follow_frames;
    options.follow_links |= args.follow_links;
    options.inspect_font_faces |= args.inspect_font_faces;
    if let Some(depth) = args.max_depth {
        options.max_navigation_depth = depth;
    }

    let target = args.target.context("no target given")?;
    let session = Rc::new(Session::http(options)?);
    let summary = analyze(session, &target)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, 0);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, indent: usize) {
    println!(
        "{:indent$}{} scripts={} handlers={} listeners={} events={} fetches={}",
        "",
        summary.url,
        summary.scripts_evaluated,
        summary.handlers_attached,
        summary.listeners_registered,
        summary.events_dispatched,
        summary.resources_fetched,
        indent = indent * 2,
    );
    for child in &summary.children {
        print_summary(child, indent + 1);
    }
}
