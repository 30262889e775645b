use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use anchorto_core::headless::{HeadlessHistory, HeadlessPage, StaticLibraryManager};
use anchorto_core::{AnchorConfig, AnchorTo, Destination, History, Page, ScrollOutcome, UrlMode};

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Sections of the page, top to bottom, as id:height
    #[arg(
        short = 's',
        long = "section",
        value_delimiter = ',',
        default_value = "hero:900,features:1200,gallery:800,pricing:1000,footer:400"
    )]
    sections: Vec<String>,

    /// Id of the section to scroll to
    #[arg(short = 't', long = "to", default_value = "pricing")]
    to: String,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 800.0)]
    viewport: f64,

    /// Scroll offset to start from
    #[arg(long, default_value_t = 0.0)]
    from: f64,

    /// Override the animation duration in milliseconds
    #[arg(long)]
    speed: Option<u64>,

    /// Override the offset kept above the destination
    #[arg(long)]
    offset: Option<f64>,

    /// Resize a section while scrolling, as id:height:delay_ms (repeatable)
    #[arg(short = 'g', long = "grow")]
    grow: Vec<String>,

    /// Height-modifying library that instantiates late, as name:delay_ms (repeatable)
    #[arg(short = 'l', long = "library")]
    libraries: Vec<String>,

    /// Watch the layout after scrolling and correct once it settles
    #[arg(long)]
    post_settle: bool,

    /// Report layout changes through an observer instead of polling
    #[arg(long)]
    observer: bool,

    /// How the URL reflects the section scrolled to
    #[arg(long, value_enum)]
    url: Option<UrlModeArg>,

    /// Location the page is loaded at
    #[arg(long, default_value = "https://example.com/")]
    location: String,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report {
    outcome: ScrollOutcome,
    events: Vec<&'static str>,
    trace: Vec<f64>,
    position: f64,
    destination_top: Option<f64>,
    url: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum UrlModeArg {
    /// Write the section id into the fragment
    Hash,
    /// Write `scrollto=<id>` into the query string
    Query,
    /// Leave the URL alone
    None,
}

impl From<UrlModeArg> for UrlMode {
    fn from(mode: UrlModeArg) -> Self {
        match mode {
            UrlModeArg::Hash => UrlMode::Hash,
            UrlModeArg::Query => UrlMode::Query,
            UrlModeArg::None => UrlMode::None,
        }
    }
}

fn parse_section(value: &str) -> Result<(String, f64)> {
    let (id, height) = value
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid section '{}', expected id:height", value))?;
    let height: f64 = height
        .parse()
        .with_context(|| format!("Invalid height in section '{}'", value))?;
    Ok((id.to_string(), height))
}

fn parse_growth(value: &str) -> Result<(String, f64, Duration)> {
    let mut parts = value.splitn(3, ':');
    let (Some(id), Some(height), Some(delay)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("Invalid growth '{}', expected id:height:delay_ms", value);
    };
    let height: f64 = height
        .parse()
        .with_context(|| format!("Invalid height in growth '{}'", value))?;
    let delay: u64 = delay
        .parse()
        .with_context(|| format!("Invalid delay in growth '{}'", value))?;
    Ok((id.to_string(), height, Duration::from_millis(delay)))
}

fn parse_library(value: &str) -> Result<(String, Duration)> {
    let (name, delay) = value
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid library '{}', expected name:delay_ms", value))?;
    let delay: u64 = delay
        .parse()
        .with_context(|| format!("Invalid delay in library '{}'", value))?;
    Ok((name.to_string(), Duration::from_millis(delay)))
}

pub async fn run(mut config: AnchorConfig, args: SimulateArgs) -> Result<()> {
    if let Some(speed) = args.speed {
        config.scroll.speed_ms = speed;
    }
    if let Some(offset) = args.offset {
        config.scroll.offset = offset;
    }
    if let Some(mode) = args.url {
        config.navigation.url = mode.into();
    }
    if args.post_settle {
        config.settle.post_settle_adjust = true;
    }
    config.validate()?;

    let sections = args
        .sections
        .iter()
        .map(|s| parse_section(s))
        .collect::<Result<Vec<_>>>()?;
    let growth = args
        .grow
        .iter()
        .map(|g| parse_growth(g))
        .collect::<Result<Vec<_>>>()?;
    let libraries = args
        .libraries
        .iter()
        .map(|l| parse_library(l))
        .collect::<Result<Vec<_>>>()?;

    let mut page = HeadlessPage::new(args.viewport).with_sections(sections);
    if args.observer {
        page = page.with_layout_observer();
    }
    let page = Arc::new(page);
    if page.element(&args.to).is_none() {
        bail!("No section '{}' (sections: {})", args.to, page.section_ids().join(", "));
    }
    page.set_scroll_y(args.from);
    page.clear_trace();

    let history = Arc::new(HeadlessHistory::parse(&args.location)?);

    let manager = Arc::new(StaticLibraryManager::new());
    for (name, delay) in libraries {
        manager.register(&name);
        config.readiness.height_modifying_libraries.push(name.clone());
        let manager = manager.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.add_instance(&name);
            info!(library = %name, "Library instantiated");
        });
    }

    for (id, height, delay) in growth {
        let page = page.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if page.resize_section(&id, height) {
                info!(section = %id, height, "Section resized");
            } else {
                warn!(section = %id, "Cannot resize unknown section");
            }
        });
    }

    let settle = config.settle.clone();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let destination = Destination::Selector(format!("#{}", args.to));

    let mut anchor = AnchorTo::new(page.clone(), config)
        .with_destination(destination.clone())
        .with_history(history.clone())
        .with_manager(manager.clone())
        .with_event_sender(event_tx);
    if let Some(trigger) = page.section_ids().first().and_then(|id| page.element(id)) {
        anchor = anchor.with_trigger(trigger);
    }

    anchor.sync_url(&destination);
    let outcome = anchor.scroll_to(&destination).await;

    if matches!(outcome, ScrollOutcome::Completed { monitoring: true, .. }) {
        // Let the monitor run its full window plus the final correction
        let budget = settle.initial_delay() + settle.max_wait() + settle.check_interval() * 2;
        tokio::time::sleep(budget + settle.micro_adjust_duration()).await;
    }

    let mut events = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        events.push(event.kind.name());
    }

    let report = Report {
        outcome,
        events,
        trace: page.scroll_trace(),
        position: page.scroll_y(),
        destination_top: page.section_top(&args.to),
        url: history.location().to_string(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &Report) {
    match report.outcome {
        ScrollOutcome::NoDestination => {
            println!("Destination not found, nothing scrolled.");
            return;
        }
        ScrollOutcome::Completed {
            readiness,
            from,
            target,
            frames,
            correction,
            monitoring,
            ..
        } => {
            println!("Scrolled {:.0} -> {:.0} in {} frames", from, target, frames);
            println!("  Readiness: {:?}", readiness);
            if let Some(correction) = correction {
                println!("  Micro-adjust: {:?}", correction);
            }
            if monitoring {
                println!("  Post-settle monitor ran");
            }
        }
    }

    println!("  Events: {}", report.events.join(", "));
    println!("  URL: {}", report.url);
    println!("  Final position: {:.1}", report.position);
    if let Some(top) = report.destination_top {
        println!("  Destination top: {:.1}", top);
    }

    println!("\nFrames:");
    for (i, y) in report.trace.iter().enumerate() {
        println!("  {:>4}  {:>10.2}", i, y);
    }
}
