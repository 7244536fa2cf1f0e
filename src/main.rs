//! Welcome Team - headcount reconciliation console
//!
//! Two volunteers count the auditorium independently; the console compares
//! their tallies zone by zone and only lets the count be confirmed once they
//! agree within tolerance.
//!
//! Module structure:
//! - `domain/` - Core types (zones, entries, confirmed counts, seats, requests)
//! - `io/` - External interfaces (store, journal, console, Prometheus)
//! - `services/` - Business rules (validation, reconciliation, workflows)
//! - `infra/` - Infrastructure (Config, Metrics, Clock)

use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use welcome_team::domain::request::ServiceRequest;
use welcome_team::domain::seat::Seat;
use welcome_team::infra::{Clock, Config, CurrentService, Metrics, ServiceResolver, SystemClock};
use welcome_team::io::console::{self, Command};
use welcome_team::io::{InMemoryStore, Journal, RealtimeStore, Subscription};
use welcome_team::services::headcount_monitor::LiveHeadcount;
use welcome_team::services::requests::{pending_requests, sort_requests_by_time};
use welcome_team::services::{create_headcount_monitor, HeadcountService, RequestService, SeatService, SubmitOutcome};

/// Welcome Team - dual-counter headcount console
#[derive(Parser, Debug)]
#[command(name = "welcome-team", version, about)]
struct Args {
    /// Path to TOML configuration file [default: $CONFIG_FILE or config/dev.toml]
    #[arg(short, long)]
    config: Option<String>,
}

/// Everything a console command can touch
struct Console {
    current: CurrentService,
    clock: Arc<dyn Clock>,
    headcount: HeadcountService,
    seats: SeatService,
    requests: RequestService,
    live: watch::Receiver<Arc<LiveHeadcount>>,
    seat_sub: Subscription<Vec<Seat>>,
    request_sub: Subscription<Vec<ServiceRequest>>,
}

impl Console {
    /// Execute one command; returns false on quit
    async fn execute(&mut self, command: Command) -> bool {
        let id = &self.current.id;
        match command {
            Command::Submit { counter, counts } => match self.headcount.submit_entry(id, &counter, counts).await {
                Ok(SubmitOutcome::Accepted(entry_id)) => println!("recorded {} ({})", counter.trim(), entry_id),
                Ok(SubmitOutcome::Rejected(errors)) => {
                    for e in errors {
                        println!("  - {}", e);
                    }
                }
                Err(e) => println!("error: {}", e),
            },
            Command::Confirm => match self.headcount.confirm_current(id, self.current.date).await {
                Ok(confirmed) => println!("{}", console::render_confirmed(&confirmed)),
                Err(e) => println!("error: {}", e),
            },
            Command::Status => {
                let live = self.live.borrow().clone();
                if let Some(e) = &live.store_error {
                    println!("store unavailable ({}); showing last known counts", e);
                }
                print!("{}", console::render_view(&live.view));
            }
            Command::Seats => match self.seat_sub.latest() {
                Ok(seats) => print!("{}", console::render_seats(&seats)),
                Err(e) => println!("error: {}", e),
            },
            Command::ToggleSeat(seat_id) => {
                let current = match self.seat_sub.latest() {
                    Ok(seats) => seats.iter().find(|s| s.id == seat_id).cloned(),
                    Err(e) => {
                        println!("error: {}", e);
                        return true;
                    }
                };
                let current = current.unwrap_or_else(|| Seat::vacant(seat_id));
                match self.seats.toggle_seat(id, &current).await {
                    Ok(seat) => println!("{} {}", seat.id, if seat.occupied { "occupied" } else { "free" }),
                    Err(e) => println!("error: {}", e),
                }
            }
            Command::Request(request) => match self.requests.submit_request(id, request).await {
                Ok(raised) => println!("raised {}", raised.id),
                Err(e) => println!("error: {}", e),
            },
            Command::Requests => match self.request_sub.latest() {
                Ok(all) => {
                    let pending = sort_requests_by_time(&pending_requests(&all));
                    print!("{}", console::render_requests(&pending, self.clock.now()));
                }
                Err(e) => println!("error: {}", e),
            },
            Command::Resolve(request_id) => match self.requests.resolve_request(id, &request_id).await {
                Ok(_) => println!("resolved {}", request_id),
                Err(e) => println!("error: {}", e),
            },
            Command::Help => println!("{}", console::HELP),
            Command::Quit => return false,
        }
        true
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default: INFO, use RUST_LOG=debug for every evaluation
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "welcome-team starting");

    let args = Args::parse();
    let config_path = Config::resolve_config_path(args.config.as_deref());
    let config = Config::load_from_path(&config_path);

    info!(
        config_file = %config.config_file(),
        site_id = %config.site_id(),
        service_id = ?config.service_id(),
        utc_offset_minutes = %config.utc_offset_minutes(),
        history_limit = %config.history_limit(),
        journal_enabled = %config.journal_enabled(),
        journal_file = %config.journal_file(),
        prometheus_port = %config.prometheus_port(),
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let metrics = Arc::new(Metrics::new());
    let store: Arc<dyn RealtimeStore> = Arc::new(InMemoryStore::new(clock.clone()));

    let resolver = ServiceResolver::new(config.utc_offset_minutes(), config.service_id().map(str::to_string));
    let current = resolver.resolve(clock.as_ref());
    info!(service = %current.id, date = %current.date, "service_resolved");

    let mut headcount = HeadcountService::new(store.clone(), metrics.clone());
    if config.journal_enabled() {
        headcount = headcount.with_journal(Journal::new(config.journal_file()));
    }

    // Start headcount monitor
    let (live, monitor) = create_headcount_monitor(
        store.as_ref(),
        &current,
        config.history_limit(),
        metrics.clone(),
        shutdown_rx.clone(),
    )?;
    tokio::spawn(monitor.run());

    // Start Prometheus metrics HTTP server (if port > 0)
    let prometheus_port = config.prometheus_port();
    if prometheus_port > 0 {
        let prom_metrics = metrics.clone();
        let prom_site = config.site_id().to_string();
        let prom_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = welcome_team::io::prometheus::start_metrics_server(
                prometheus_port,
                prom_metrics,
                prom_site,
                prom_shutdown,
            )
            .await
            {
                error!(error = %e, "Prometheus metrics server error");
            }
        });
    }

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        // First tick is immediate
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    let seats = SeatService::new(store.clone(), metrics.clone());
    let requests = RequestService::new(store.clone(), metrics.clone());
    let seat_sub = seats.subscribe_seats(&current.id)?;
    let request_sub = requests.subscribe_requests(&current.id)?;

    let mut console =
        Console { current, clock, headcount, seats, requests, live, seat_sub, request_sub };

    println!("{}", console::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shutdown = shutdown_rx;
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.changed() => break,
        };
        let Some(line) = line else {
            break;
        };
        match Command::parse(&line) {
            Ok(Some(command)) => {
                if !console.execute(command).await {
                    break;
                }
            }
            Ok(None) => {}
            Err(message) => {
                warn!(input = %line.trim(), "console_parse_error");
                println!("{}", message);
            }
        }
    }

    let _ = shutdown_tx.send(true);
    info!("welcome-team shutdown complete");
    Ok(())
}
