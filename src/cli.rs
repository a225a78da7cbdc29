use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::board::TicketBoard;
use crate::config::AppConfig;
use crate::model::ticket::{Ticket, FILTER_ALL, KNOWN_STATUSES};
use crate::sources;
use crate::sync::normalize::{DisplayFormat, Normalizer, RandomIdGenerator};
use crate::sync::{TicketDraft, TicketLookup, TicketSync};

pub const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List { status: String, json: bool },
    Show { id: String, json: bool },
    Add(TicketDraft),
    Clear,
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub command: Command,
    pub log_level: String,
}

/// Parse the full argument list (without the program name).
pub fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut log_level = DEFAULT_LOG_LEVEL.to_string();
    let mut rest: Vec<String> = Vec::new();
    let mut i = 0;

    while i < args.len() {
        if args[i] == "--log-level" {
            i += 1;
            match args.get(i) {
                Some(level) => log_level = level.clone(),
                None => bail!("Missing value for --log-level"),
            }
        } else {
            rest.push(args[i].clone());
        }
        i += 1;
    }

    let command = match rest.split_first() {
        None => Command::List {
            status: FILTER_ALL.into(),
            json: false,
        },
        Some((cmd, tail)) => match cmd.as_str() {
            "list" | "ls" => parse_list_args(tail)?,
            "show" => parse_show_args(tail)?,
            "add" => Command::Add(parse_add_args(tail)?),
            "clear" => Command::Clear,
            "help" | "-h" | "--help" => Command::Help,
            other => bail!("Unknown command '{other}'. Run `tickets help` for usage."),
        },
    };

    Ok(Invocation { command, log_level })
}

fn parse_list_args(args: &[String]) -> Result<Command> {
    let mut status = FILTER_ALL.to_string();
    let mut json = false;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "-s" | "--status" => {
                i += 1;
                match args.get(i) {
                    Some(s) => status = s.clone(),
                    None => bail!("Missing value for -s/--status flag"),
                }
            }
            "--json" => json = true,
            other => bail!("Unexpected argument '{other}' for list"),
        }
        i += 1;
    }

    Ok(Command::List { status, json })
}

fn parse_show_args(args: &[String]) -> Result<Command> {
    let mut id = None;
    let mut json = false;
    for arg in args {
        match arg.as_str() {
            "--json" => json = true,
            other if id.is_none() => id = Some(other.to_string()),
            other => bail!("Unexpected argument '{other}' for show"),
        }
    }
    match id {
        Some(id) => Ok(Command::Show { id, json }),
        None => bail!("Usage: tickets show <id-or-ticket-number>"),
    }
}

/// Parse `tickets add` arguments into a draft.
///
/// Supported forms:
///   tickets add "No internet since morning"
///   tickets add No internet since morning
///   tickets add "Slow speeds" -d "Drops to 2 Mbps at night" -p high -c Connectivity
pub fn parse_add_args(args: &[String]) -> Result<TicketDraft> {
    if args.is_empty() {
        bail!("Usage: tickets add <subject> [-d <description>] [-p <priority>] [-c <category>]\n\nExamples:\n  tickets add \"No internet since morning\"\n  tickets add \"Slow speeds\" -d \"Drops at night\" -p high");
    }

    let mut subject_parts: Vec<String> = Vec::new();
    let mut draft = TicketDraft::default();
    let mut i = 0;

    while i < args.len() {
        let slot = match args[i].as_str() {
            "-d" | "--desc" | "--description" => Some(&mut draft.description),
            "-p" | "--priority" => Some(&mut draft.priority),
            "-c" | "--category" => Some(&mut draft.category),
            _ => None,
        };
        match slot {
            Some(slot) => {
                let flag = &args[i];
                i += 1;
                match args.get(i) {
                    Some(value) => *slot = Some(value.clone()),
                    None => bail!("Missing value for {flag} flag"),
                }
            }
            None => subject_parts.push(args[i].clone()),
        }
        i += 1;
    }

    draft.subject = subject_parts.join(" ");
    if draft.subject.trim().is_empty() {
        bail!("Ticket subject cannot be empty");
    }

    Ok(draft)
}

pub fn build_sync(config: &AppConfig) -> Result<TicketSync> {
    let remote = sources::create_remote(config)?;
    let cache = sources::create_cache(config);
    let normalizer = Normalizer::new(
        Arc::new(RandomIdGenerator::default()),
        DisplayFormat::from_config(&config.display),
    );
    Ok(TicketSync::new(remote, cache, normalizer))
}

pub async fn run(command: Command, config: &AppConfig) -> Result<()> {
    if command == Command::Help {
        print_help();
        return Ok(());
    }

    let sync = build_sync(config)?;
    let user_id = config.user_id();

    match command {
        Command::List { status, json } => handle_list(&sync, user_id, &status, json).await,
        Command::Show { id, json } => handle_show(&sync, user_id, &id, json).await,
        Command::Add(draft) => {
            let user_id = require_user(user_id)?;
            let ticket = sync
                .create_local_ticket(user_id, draft)
                .await
                .context("Failed to save ticket")?;
            println!("Saved {} — {}", ticket.ticket_number, ticket.subject);
            Ok(())
        }
        Command::Clear => handle_clear(&sync, require_user(user_id)?).await,
        Command::Help => Ok(()),
    }
}

fn require_user(user_id: Option<&str>) -> Result<&str> {
    match user_id {
        Some(id) => Ok(id),
        None => bail!("No user configured. Set [user] id in ~/.tickets/config.toml or TICKETS_USER_ID"),
    }
}

async fn handle_list(
    sync: &TicketSync,
    user_id: Option<&str>,
    status: &str,
    json: bool,
) -> Result<()> {
    let mut board = TicketBoard::new();
    let token = board.begin_refresh();
    let result = sync.load(user_id).await;
    board.finish_refresh(token, result);

    let counts = board.counts();
    let board_is_empty = board.is_empty();
    let visible = board.apply_status_filter(status);

    if json {
        let out = serde_json::json!({ "tickets": visible, "counts": counts });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if board_is_empty {
        println!("No tickets.");
    } else if visible.is_empty() {
        println!("No tickets with status '{status}'.");
    }
    for ticket in &visible {
        println!("{}", format_line(ticket));
    }
    println!();
    println!("{counts}");
    Ok(())
}

async fn handle_show(
    sync: &TicketSync,
    user_id: Option<&str>,
    id: &str,
    json: bool,
) -> Result<()> {
    let ticket = match sync.refresh_ticket(user_id, id).await {
        TicketLookup::Found(t) => t,
        TicketLookup::NotFound => bail!("Ticket '{id}' not found"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&ticket)?);
    } else {
        print_detail(&ticket);
    }
    Ok(())
}

async fn handle_clear(sync: &TicketSync, user_id: &str) -> Result<()> {
    // Load the current list first
    let mut board = TicketBoard::new();
    let token = board.begin_refresh();
    let result = sync.load(Some(user_id)).await;
    board.finish_refresh(token, result);

    // On failure the board keeps its tickets
    sync.clear_cache(user_id)
        .await
        .context("Failed to clear cached tickets")?;

    // Service tickets stay visible
    let removed = board.drop_local();
    println!(
        "Cleared {removed} cached ticket(s); {} remain on the service.",
        board.tickets().len()
    );
    Ok(())
}

pub fn format_line(ticket: &Ticket) -> String {
    format!(
        "{:<16} {:<12} {:<8} {} {:<8}  {}  [{}]",
        ticket.ticket_number,
        ticket.status,
        ticket.priority,
        ticket.formatted_date,
        ticket.formatted_time,
        ticket.subject,
        ticket.source
    )
}

fn print_detail(ticket: &Ticket) {
    println!("{} — {}", ticket.ticket_number, ticket.subject);
    println!("  Status:    {}", ticket.status);
    println!("  Priority:  {}", ticket.priority);
    println!("  Category:  {}", ticket.category);
    println!("  Created:   {} {}", ticket.formatted_date, ticket.formatted_time);
    println!("  Updated:   {}", ticket.updated_at.to_rfc3339());
    if let Some(agent) = &ticket.assigned_to {
        println!("  Assigned:  {}", display_value(agent));
    }
    if let Some(name) = &ticket.subscription_name {
        println!("  Plan:      {}", display_value(name));
    }
    println!("  Replies:   {}", ticket.response_count);
    if let Some(last) = &ticket.last_response {
        println!("  Last:      {}", display_value(last));
    }
    for attachment in &ticket.attachments {
        println!("  Attached:  {}", attachment.uri);
    }
    println!();
    println!("{}", ticket.description);
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(obj) => obj
            .get("name")
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

pub fn print_help() {
    println!("tickets — support tickets from the portal and this device\n");
    println!("USAGE:");
    println!("  tickets [--log-level <level>] <command>\n");
    println!("COMMANDS:");
    println!("  list [-s <status>] [--json]   Show tickets, newest first (default)");
    println!("  show <id> [--json]            Refresh one ticket by id or ticket number");
    println!("  add <subject> [options]       Save a new ticket on this device");
    println!("  clear                         Remove all tickets saved on this device");
    println!();
    println!("ADD OPTIONS:");
    println!("  -d, --desc <text>       Description");
    println!("  -p, --priority <level>  low, medium, high or critical");
    println!("  -c, --category <name>   Category");
    println!();
    println!("STATUS FILTERS:");
    println!("  {FILTER_ALL}, {}", KNOWN_STATUSES.join(", "));
}
