//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod config;

use clap::{App, Arg};
use config::{Config, LoggingFileRotation, LoggingFmtStyle};
use fibcheck_harness::{Collaborators, ErrorKind, Orchestrator, RunReport};
use fibcheck_testbed::Testbed;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

// Builds a formatting layer writing to the given destination.
fn fmt_layer<S, W>(
    writer: W,
    style: LoggingFmtStyle,
    colors: bool,
    show_source: bool,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_file(show_source)
        .with_line_number(show_source)
        .with_ansi(colors);
    match style {
        LoggingFmtStyle::Compact => layer.compact().boxed(),
        LoggingFmtStyle::Full => layer.boxed(),
        LoggingFmtStyle::Json => layer.json().boxed(),
        LoggingFmtStyle::Pretty => layer.pretty().boxed(),
    }
}

fn init_tracing(config: &config::Logging) {
    // Enable logging to journald.
    let journald = config.journald.then(|| {
        tracing_journald::layer().expect("couldn't connect to journald")
    });

    // Enable logging to a file.
    let file = config.file.as_ref().map(|file| {
        let file_appender = match file.rotation {
            LoggingFileRotation::Never => rolling::never(&file.dir, &file.name),
            LoggingFileRotation::Hourly => {
                rolling::hourly(&file.dir, &file.name)
            }
            LoggingFileRotation::Daily => rolling::daily(&file.dir, &file.name),
        };
        fmt_layer(file_appender, file.style, false, file.show_source)
    });

    // Enable logging to stderr.
    let stderr = config.stderr.enabled.then(|| {
        fmt_layer(
            std::io::stderr,
            config.stderr.style,
            config.stderr.colors,
            config.stderr.show_source,
        )
    });

    let env_filter = tracing_subscriber::EnvFilter::builder()
        .parse_lossy(
            std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV)
                .unwrap_or_else(|_| config.filter.clone()),
        );
    tracing_subscriber::registry()
        .with(env_filter)
        .with(journald)
        .with(file)
        .with(stderr)
        .init();
}

fn signal_listener() -> mpsc::Receiver<()> {
    let (signal_tx, signal_rx) = mpsc::channel(1);

    tokio::task::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).unwrap();
        let mut sigterm = signal(SignalKind::terminate()).unwrap();

        tokio::select! {
            _ = sigint.recv() => {
                info!("received SIGINT");
                let _ = signal_tx.send(()).await;
            },
            _ = sigterm.recv() => {
                info!("received SIGTERM");
                let _ = signal_tx.send(()).await;
            }
        }
    });

    signal_rx
}

fn print_report(report: &RunReport, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(report) => println!("{report}"),
            Err(error) => error!(%error, "failed to serialize run report"),
        }
    } else {
        print!("{report}");
    }
}

// Runs the scenario the given number of times, returning whether all runs
// passed.
//
// A signal interrupts the ongoing run, which is still torn down, and skips
// the remaining ones.
async fn run(
    config: Config,
    runs: u32,
    json: bool,
    mut signal_rx: mpsc::Receiver<()>,
) -> bool {
    let testbed = Testbed::start(config.testbed);
    let orchestrator =
        Orchestrator::new(&config.scenario, Collaborators::single(&testbed));

    let mut passed = true;
    for run_id in 1..=runs {
        let interrupt = async {
            // A closed channel means the listener is gone, not a signal.
            if signal_rx.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        };
        let report = orchestrator.run_until(run_id, interrupt).await;
        passed &= report.passed();
        print_report(&report, json);

        let interrupted = report
            .failure
            .as_ref()
            .is_some_and(|failure| failure.kind == ErrorKind::Interrupted);
        if interrupted {
            warn!("verification interrupted");
            break;
        }
    }
    passed
}

// ===== main =====

fn main() {
    // Parse command-line parameters.
    let matches = App::new("Route preference verification harness")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("file")
                .help("Specify an alternative configuration file."),
        )
        .arg(
            Arg::with_name("runs")
                .short("n")
                .long("runs")
                .value_name("count")
                .help("Number of consecutive runs (defaults to 1)."),
        )
        .arg(
            Arg::with_name("json")
                .long("json")
                .help("Print run reports in JSON format."),
        )
        .get_matches();

    // Read configuration file.
    let config_file = matches.value_of("config");
    let config = match Config::load(config_file) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };
    let runs = match matches.value_of("runs").map(str::parse::<u32>) {
        None => 1,
        Some(Ok(runs)) if runs > 0 => runs,
        Some(_) => {
            eprintln!("invalid run count");
            std::process::exit(1);
        }
    };
    let json = matches.is_present("json");

    // Initialize tracing.
    init_tracing(&config.logging);

    info!("starting up");

    let passed = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create async runtime")
        .block_on(async {
            // Spawn signal listener.
            let signal_rx = signal_listener();

            run(config, runs, json, signal_rx).await
        });

    info!("exiting");
    if !passed {
        std::process::exit(1);
    }
}
