use anyhow::{Result, bail};
use calloop::EventLoop;
use clap::{Parser, Subcommand};
use log::{debug, info};
use ocha::catalog::Catalog;
use ocha::config::{Config, load_config};
use ocha::matcher;
use ocha::model::SearchResult;
use ocha::result_queue::{self, ResultEvent};
use ocha::runner::{CatalogRunner, CompoundRunner, QueryRunner};
use ocha::{executor, indexer, schedule};
use serde::Serialize;
use std::time::{Duration, Instant};

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Scan the configured sources into the catalog
    Index,
    /// Search the catalog, printing results as they arrive
    Query {
        /// Words to look for
        #[arg(required = true)]
        text: Vec<String>,
        /// How long to wait for results
        #[arg(long, default_value_t = 3000)]
        wait_ms: u64,
        /// Deliver everything without pausing between bunches
        #[arg(long)]
        all: bool,
        /// One JSON object per line
        #[arg(long, conflicts_with = "markup")]
        json: bool,
        /// Names as markup with <b> around matches
        #[arg(long)]
        markup: bool,
    },
    /// Open the catalog entry with this path
    Run { path: String },
    /// Re-index on the configured schedule
    Watch,
}

#[derive(Debug, Clone, Copy)]
enum Format {
    Terminal,
    Markup,
    Json,
}

struct Printer {
    query: String,
    format: Format,
    printed: usize,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    origin: u64,
    query: &'a str,
    confidence: f32,
    #[serde(flatten)]
    result: &'a SearchResult,
}

impl Printer {
    fn print(event: ResultEvent, printer: &mut Printer) {
        if event.query != printer.query {
            debug!("dropping result for old query '{}'", event.query);
            return;
        }
        let name = &event.result.display_name;
        match printer.format {
            Format::Terminal => println!("{}\t{}", emphasize(&printer.query, name), event.result.path),
            Format::Markup => println!("{}", matcher::markup(&printer.query, name, "<b>", "</b>")),
            Format::Json => {
                let line = JsonLine {
                    origin: event.origin.0,
                    query: &event.query,
                    confidence: event.confidence,
                    result: &event.result,
                };
                match serde_json::to_string(&line) {
                    Ok(json) => println!("{}", json),
                    Err(e) => debug!("cannot serialize {:?}: {}", event.result.path, e),
                }
            }
        }
        printer.printed += 1;
    }
}

fn emphasize(query: &str, name: &str) -> String {
    let Some(highlight) = matcher::highlight(query, name) else {
        return name.to_string();
    };
    let text = highlight.text();
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for range in highlight.ranges() {
        out.push_str(&text[last..range.start]);
        out.push_str(BOLD);
        out.push_str(&text[range.clone()]);
        out.push_str(RESET);
        last = range.end;
    }
    out.push_str(&text[last..]);
    out
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = load_config()?;

    match args.command {
        Cmd::Index => index(&config),
        Cmd::Query {
            text,
            wait_ms,
            all,
            json,
            markup,
        } => {
            let format = if json {
                Format::Json
            } else if markup {
                Format::Markup
            } else {
                Format::Terminal
            };
            query(&config, &text.join(" "), Duration::from_millis(wait_ms), all, format)
        }
        Cmd::Run { path } => run(&config, &path),
        Cmd::Watch => schedule::watch(config),
    }
}

fn index(config: &Config) -> Result<()> {
    let catalog_path = config.catalog_path()?;
    if let Some(dir) = catalog_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut catalog = Catalog::connect(&catalog_path)?;
    let stats = indexer::index(&mut catalog, config)?;
    catalog.disconnect();
    println!(
        "{} entries indexed into {}, {} removed",
        stats.indexed,
        catalog_path.display(),
        stats.removed
    );
    Ok(())
}

fn query(config: &Config, text: &str, wait: Duration, all: bool, format: Format) -> Result<()> {
    let catalog_path = config.catalog_path()?;

    // 1. Runners push into the queue from their own threads
    let (sender, queue) = result_queue::channel();
    let catalog_runner = CatalogRunner::new(&catalog_path, config.pacing.clone(), sender)?;
    let children: Vec<Box<dyn QueryRunner>> = vec![Box::new(catalog_runner)];
    let mut runner = CompoundRunner::new(children);

    // 2. ...and this thread prints whatever the loop hands it
    let mut event_loop: EventLoop<Printer> = EventLoop::try_new()?;
    queue.attach(&event_loop.handle(), Printer::print)?;
    let mut printer = Printer {
        query: text.trim().to_string(),
        format,
        printed: 0,
    };

    runner.start();
    runner.set_query(text);
    if all {
        runner.consolidate();
    }

    let deadline = Instant::now() + wait;
    while printer.printed < config.pacing.maximum {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        event_loop.dispatch(Some(deadline - now), &mut printer)?;
    }
    runner.release();

    info!("{} results for '{}'", printer.printed, printer.query);
    Ok(())
}

fn run(config: &Config, path: &str) -> Result<()> {
    let mut catalog = Catalog::connect(config.catalog_path()?)?;
    let result = catalog.find_result(path);
    catalog.disconnect();
    let Some(result) = result? else {
        bail!("{} is not in the catalog", path);
    };
    executor::execute(&result)?;
    Ok(())
}
