//! Line-driven widget session.
//!
//! Every stdin line replaces the place name; the pipeline decides when to
//! fetch. Each state change is rendered to stdout.

use anyhow::Context;
use nowcast_core::{
    Coordinates, QueryInput, TemperatureUnit, WeatherPipeline, WeatherView, WidgetState,
};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Type a place and pause to fetch. :c / :f / :t switch units, :q quits.";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line<'a> {
    Quit,
    Unit(TemperatureUnit),
    Toggle,
    Edit(&'a str),
}

impl<'a> Line<'a> {
    fn parse(raw: &'a str) -> Self {
        match raw.trim() {
            ":q" | ":quit" => Line::Quit,
            ":c" => Line::Unit(TemperatureUnit::Celsius),
            ":f" => Line::Unit(TemperatureUnit::Fahrenheit),
            ":t" => Line::Toggle,
            _ => Line::Edit(raw),
        }
    }
}

pub async fn run(mut pipeline: WeatherPipeline, seed: Option<Coordinates>) -> anyhow::Result<()> {
    let mut input = QueryInput::new(pipeline.state().query);
    let mut state_rx = pipeline.subscribe();

    eprintln!("{HELP}");
    render(&pipeline.state());

    start(&mut pipeline, &mut input, seed).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                if !handle_line(&mut pipeline, &mut input, &line) {
                    break;
                }
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                render(&state);
            }
            _ = &mut ctrl_c => break,
        }
    }

    pipeline.teardown();
    Ok(())
}

/// Seed from coordinates when given. Without a seed, or when seeding fails,
/// arm the timer for the initial query.
async fn start(pipeline: &mut WeatherPipeline, input: &mut QueryInput, seed: Option<Coordinates>) {
    if let Some(at) = seed {
        match pipeline.seed_from_coordinates(at).await {
            Ok(label) => {
                if let Some(label) = label {
                    input.replace(label);
                }
                return;
            }
            Err(err) => {
                tracing::warn!(%at, error = %err, "could not resolve starting coordinates");
            }
        }
    }
    pipeline.mount();
}

/// Apply one stdin line. Returns `false` when the session should end.
fn handle_line(pipeline: &mut WeatherPipeline, input: &mut QueryInput, raw: &str) -> bool {
    match Line::parse(raw) {
        Line::Quit => return false,
        Line::Unit(unit) => pipeline.set_unit(unit),
        Line::Toggle => {
            pipeline.toggle_unit();
        }
        Line::Edit(text) => {
            if let Some(query) = input.edit(text) {
                pipeline.set_query(query.to_string());
            }
        }
    }
    true
}

fn render(state: &WidgetState) {
    println!("{}", WeatherView::from_state(state));
}
