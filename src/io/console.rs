//! Line-oriented console protocol for the `welcome-team` binary
//!
//! Commands:
//! - `submit <name> <left> <middle> <right> <production> <outside>`
//! - `submit <name> {"left":50,"middle":80,...}`
//! - `confirm`, `status`
//! - `seats`, `seat <section-row-col>` (toggles)
//! - `request <section> <row> <type> [x<qty>] [-- note]`, `requests`, `resolve <id>`
//! - `help`, `quit`

use crate::domain::headcount::ConfirmedCount;
use crate::domain::request::{NewRequest, RequestId, RequestType, ServiceRequest};
use crate::domain::seat::{Seat, SeatId, SectionName};
use crate::domain::zone::{RawZoneCounts, ZoneName};
use crate::services::headcount::HeadcountView;
use crate::services::pairing::HeadcountPhase;
use crate::services::requests::format_time_elapsed;
use crate::services::seats::{available_count, compute_seat_summaries, occupied_count, section_availability};
use chrono::{DateTime, Utc};
use std::fmt::Write;

pub const HELP: &str = "\
commands:
  submit <name> <left> <middle> <right> <production> <outside>
  submit <name> {\"left\":0,\"middle\":0,\"right\":0,\"production\":0,\"outside\":0}
  confirm                 confirm today's headcount
  status                  show the headcount comparison
  seats                   seat availability by row
  seat <section-row-col>  toggle a seat
  request <section> <row> <type> [x<qty>] [-- note]
  requests                pending requests, oldest first
  resolve <id>            mark a request resolved
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Submit { counter: String, counts: RawZoneCounts },
    Confirm,
    Status,
    Seats,
    ToggleSeat(SeatId),
    Request(NewRequest),
    Requests,
    Resolve(RequestId),
    Help,
    Quit,
}

impl Command {
    /// Parse one input line; `Ok(None)` for a blank line
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "" => return Ok(None),
            "submit" => parse_submit(rest)?,
            "confirm" => Command::Confirm,
            "status" => Command::Status,
            "seats" => Command::Seats,
            "seat" => {
                let seat = SeatId::parse(&rest.to_ascii_lowercase()).ok_or_else(|| format!("invalid seat '{}'", rest))?;
                Command::ToggleSeat(seat)
            }
            "request" => Command::Request(parse_request(rest)?),
            "requests" => Command::Requests,
            "resolve" if !rest.is_empty() => Command::Resolve(RequestId(rest.to_string())),
            "resolve" => return Err("usage: resolve <id>".to_string()),
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command '{}' (try 'help')", other)),
        };
        Ok(Some(command))
    }
}

fn parse_submit(rest: &str) -> Result<Command, String> {
    if let Some(brace) = rest.find('{') {
        let counter = rest[..brace].trim().to_string();
        let counts: RawZoneCounts =
            serde_json::from_str(&rest[brace..]).map_err(|e| format!("invalid counts: {}", e))?;
        return Ok(Command::Submit { counter, counts });
    }

    let tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens.len() < ZoneName::ALL.len() + 1 {
        return Err("usage: submit <name> <left> <middle> <right> <production> <outside>".to_string());
    }
    let (name, numbers) = tokens.split_at(tokens.len() - ZoneName::ALL.len());
    let mut values = [0.0f64; 5];
    for (value, token) in values.iter_mut().zip(numbers) {
        *value = token.parse::<f64>().map_err(|_| format!("'{}' is not a number", token))?;
    }
    let [left, middle, right, production, outside] = values;

    Ok(Command::Submit {
        counter: name.join(" "),
        counts: RawZoneCounts { left, middle, right, production, outside },
    })
}

fn parse_request(rest: &str) -> Result<NewRequest, String> {
    let (fields, note) = match rest.split_once("--") {
        Some((fields, note)) => (fields.trim(), note.trim().to_string()),
        None => (rest, String::new()),
    };

    let mut tokens: Vec<&str> = fields.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err("usage: request <section> <row> <type> [x<qty>] [-- note]".to_string());
    }
    let section: SectionName = tokens[0].to_ascii_lowercase().parse()?;
    let row: u32 = tokens[1].parse().map_err(|_| format!("'{}' is not a row number", tokens[1]))?;

    let mut quantity = 1;
    if let Some(qty) = tokens.last().and_then(|t| t.strip_prefix('x')).and_then(|q| q.parse::<u32>().ok()) {
        quantity = qty;
        tokens.pop();
    }
    let request_type: RequestType = tokens[2..].join(" ").parse()?;

    Ok(NewRequest { section, row, area_label: None, request_type, quantity, note })
}

fn phase_label(phase: HeadcountPhase) -> &'static str {
    match phase {
        HeadcountPhase::NoEntries => "waiting for counts",
        HeadcountPhase::OneSubmitted => "waiting for a second counter",
        HeadcountPhase::TwoSubmitted { discrepant: true } => "counts disagree; recount the flagged zones",
        HeadcountPhase::TwoSubmitted { discrepant: false } => "ready to confirm",
        HeadcountPhase::Confirmed => "confirmed",
    }
}

/// Text rendering of the headcount comparison
pub fn render_view(view: &HeadcountView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "headcount {} - {}", view.date, phase_label(view.phase));

    for (slot, entry) in [("A", &view.counter_a), ("B", &view.counter_b)] {
        match entry {
            Some(entry) => {
                let zones: Vec<String> =
                    entry.counts.iter().map(|(zone, count)| format!("{}={}", zone, count)).collect();
                let _ = writeln!(
                    out,
                    "  counter {}: {} total={} [{}]",
                    slot,
                    entry.counter_name,
                    entry.total,
                    zones.join(" ")
                );
            }
            None => {
                let _ = writeln!(out, "  counter {}: -", slot);
            }
        }
    }

    if let (Some(a), Some(b)) = (&view.counter_a, &view.counter_b) {
        for d in &view.discrepancies {
            let _ = writeln!(
                out,
                "  ! {}: {} counted {}, {} counted {} (off by {})",
                d.zone.label(),
                a.counter_name,
                d.count_a,
                b.counter_name,
                d.count_b,
                d.diff
            );
        }
    }
    if !view.ignored_counters.is_empty() {
        let names: Vec<&str> = view.ignored_counters.iter().map(|n| n.as_str()).collect();
        let _ = writeln!(out, "  not compared: {}", names.join(", "));
    }
    if let Some(merged) = view.merged_preview() {
        let total: u64 = merged.iter().map(|(_, c)| u64::from(c)).sum();
        let _ = writeln!(out, "  confirm would record total={}", total);
    }
    if let Some(confirmed) = &view.confirmed {
        let _ = writeln!(out, "  {}", render_confirmed(confirmed));
    }
    for past in view.history.iter().filter(|c| c.date != view.date) {
        let _ = writeln!(out, "  previous {}", render_confirmed(past));
    }
    out
}

pub fn render_confirmed(count: &ConfirmedCount) -> String {
    let zones: Vec<String> = count.totals.iter().map(|(zone, n)| format!("{}={}", zone, n)).collect();
    format!(
        "{} confirmed total={} [{}] ({} / {})",
        count.date,
        count.total(),
        zones.join(" "),
        count.counter_a.counter_name,
        count.counter_b.counter_name
    )
}

/// Seat board: stored-seat totals, free seats per section, then one line per
/// section with rows as `row:available/total`
pub fn render_seats(seats: &[Seat]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "marked seats: {} free, {} occupied", available_count(seats), occupied_count(seats));

    let by_section: Vec<String> = section_availability(seats)
        .into_iter()
        .map(|(section, free)| format!("{} {}", section.label(), free))
        .collect();
    let _ = writeln!(out, "free by section: {}", by_section.join(", "));

    let summaries = compute_seat_summaries(seats);
    for section in SectionName::ALL {
        let rows: Vec<String> = summaries
            .iter()
            .filter(|s| s.section == section)
            .map(|s| format!("{}:{}/{}", s.row, s.available_seats, s.total_seats))
            .collect();
        let _ = writeln!(out, "{:<6} {}", section.label(), rows.join(" "));
    }
    out
}

pub fn render_requests(requests: &[ServiceRequest], now: DateTime<Utc>) -> String {
    if requests.is_empty() {
        return "no pending requests\n".to_string();
    }
    let mut out = String::new();
    for r in requests {
        let _ = write!(
            out,
            "{} {} row {} {} x{} ({})",
            r.id,
            r.section.label(),
            r.row,
            r.request_type,
            r.quantity,
            format_time_elapsed(r.created_at, now)
        );
        if !r.note.is_empty() {
            let _ = write!(out, " - {}", r.note);
        }
        out.push('\n');
    }
    out
}
