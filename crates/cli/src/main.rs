//! Tally CLI - operator client for the Tally Jobs daemon

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9640";
const QUEUES: [&str; 3] = ["email-reminders", "document-generation", "leads-enrichment"];

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Tally Jobs CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "TALLY_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Args)]
struct ReminderArgs {
    /// Invoice ID
    #[arg(long)]
    invoice_id: i64,

    /// Recipient email
    #[arg(long)]
    email: String,

    /// Recipient name
    #[arg(long, default_value = "")]
    name: String,

    /// Due date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    due: String,

    /// Amount due
    #[arg(long)]
    amount: f64,

    /// Invoice number shown in the email
    #[arg(long)]
    number: Option<String>,

    /// Send this many days before the due date
    #[arg(long, default_value = "2")]
    days_before: i64,
}

#[derive(Clone, Copy, ValueEnum)]
enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule an invoice reminder
    Remind(ReminderArgs),

    /// Replace a pending reminder with a new one
    Reschedule {
        /// Job ID of the reminder to replace
        existing_job_id: String,

        #[command(flatten)]
        reminder: ReminderArgs,
    },

    /// Schedule a free-form email
    Email {
        #[arg(long)]
        to: String,

        #[arg(long)]
        subject: String,

        #[arg(long)]
        text: Option<String>,

        #[arg(long)]
        html: Option<String>,

        /// Delay before sending, in milliseconds
        #[arg(long, default_value = "0")]
        delay_ms: i64,

        #[arg(long, value_enum, default_value = "medium")]
        priority: Priority,
    },

    /// Cancel a job that has not started yet
    Cancel {
        /// Job ID
        job_id: String,
    },

    /// Render an invoice document
    Document {
        #[arg(long)]
        invoice_id: i64,

        #[arg(long, default_value = "cli")]
        requested_by: String,

        /// Email the document here instead of offering a download
        #[arg(long)]
        email: Option<String>,
    },

    /// Enrich a lead from external signals
    Enrich {
        #[arg(long)]
        lead_id: i64,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        company: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        website: Option<String>,

        #[arg(long)]
        value: Option<f64>,

        /// Suggested lead status (new, contacted, qualified, won, lost)
        #[arg(long)]
        status_hint: Option<String>,
    },

    /// Move a lead to another status
    LeadStatus {
        lead_id: i64,

        /// Target status (new, contacted, qualified, won, lost)
        status: String,

        #[arg(long)]
        note: Option<String>,
    },

    /// Correct a lead's source or estimated value, or attach a note
    LeadUpdate {
        lead_id: i64,

        /// Acquisition channel (referral, website, trade_show, ...)
        #[arg(long)]
        source: Option<String>,

        #[arg(long)]
        value: Option<f64>,

        #[arg(long)]
        note: Option<String>,
    },

    /// Show the status of one job
    Status {
        /// Job ID
        job_id: String,
    },

    /// List outstanding jobs for one invoice or lead
    Pending {
        /// Queue name
        queue: String,

        /// Invoice or lead ID
        target_id: i64,
    },

    /// Show job counts per queue
    Stats {
        /// Only this queue
        queue: Option<String>,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct ScheduledResult {
    job_id: String,
    scheduled_for: String,
}

#[derive(Deserialize, Tabled)]
struct PendingRow {
    job_id: String,
    job_type: String,
    state: String,
    #[tabled(display_with = "display_opt")]
    scheduled_for: Option<String>,
    #[tabled(display_with = "display_opt")]
    progress: Option<u8>,
}

#[derive(Deserialize, Tabled)]
struct StatsRow {
    #[serde(default)]
    queue: String,
    waiting: i64,
    delayed: i64,
    active: i64,
    completed: i64,
    failed: i64,
}

fn display_opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Accept a plain date (midnight UTC) or a full RFC 3339 timestamp
fn parse_due(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .context("Invalid due date")?;
        return Ok(midnight.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid due date: {}", raw))
}

fn reminder_params(args: &ReminderArgs) -> Result<Value> {
    Ok(json!({
        "invoice_id": args.invoice_id,
        "recipient": {"email": args.email, "name": args.name},
        "due_at": parse_due(&args.due)?,
        "amount": args.amount,
        "invoice_number": args.number,
        "days_before": args.days_before,
    }))
}

fn delivery_params(email: Option<String>) -> Value {
    match email {
        Some(recipient) => json!({"method": "email", "recipient": recipient}),
        None => json!({"method": "download"}),
    }
}

/// Signals object without the fields that were not given
fn present_params<const N: usize>(fields: [(&str, Option<Value>); N]) -> Value {
    let map: serde_json::Map<String, Value> = fields
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect();
    Value::Object(map)
}

async fn call_rpc(url: &str, method: &str, params: Value) -> Result<Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn print_scheduled(headline: &str, result: Value) -> Result<()> {
    let scheduled: ScheduledResult = serde_json::from_value(result)?;
    println!("{}", headline.green().bold());
    println!();
    println!("{}", Table::new(vec![scheduled]));
    Ok(())
}

fn print_status(view: &Value) {
    let status = view["status"].as_str().unwrap_or("unknown");
    let colored_status = match status {
        "completed" => status.green(),
        "failed" | "error" => status.red(),
        "not_found" => status.yellow(),
        _ => status.cyan(),
    };
    println!("  {} {}", "Status:".bold(), colored_status);

    for (label, key) in [
        ("Type:", "job_type"),
        ("Progress:", "progress"),
        ("Outcome:", "outcome"),
        ("Attempts:", "attempts_made"),
        ("Created:", "created_at"),
        ("Scheduled for:", "scheduled_for"),
        ("Processed:", "processed_on"),
        ("Finished:", "finished_on"),
        ("Failed reason:", "failed_reason"),
        ("Error:", "error"),
    ] {
        match view.get(key) {
            Some(Value::String(s)) => println!("  {} {}", label.bold(), s),
            Some(Value::Null) | None => {}
            Some(other) => println!("  {} {}", label.bold(), other),
        }
    }

    if let Some(message) = view.pointer("/result/message").and_then(Value::as_str) {
        println!("  {} {}", "Message:".bold(), message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Remind(args) => {
            let result = call_rpc(&cli.rpc_url, "reminder.schedule.v1", reminder_params(&args)?)
                .await?;
            print_scheduled("✓ Reminder scheduled", result)?;
        }

        Commands::Reschedule {
            existing_job_id,
            reminder,
        } => {
            let mut params = reminder_params(&reminder)?;
            params["existing_job_id"] = json!(existing_job_id);

            let result = call_rpc(&cli.rpc_url, "reminder.reschedule.v1", params).await?;
            if result["replaced"].as_bool().unwrap_or(false) {
                println!("  {} Job {} replaced", "✓".green(), existing_job_id);
            } else {
                println!(
                    "  {} Job {} was no longer pending, nothing replaced",
                    "○".yellow(),
                    existing_job_id
                );
            }
            print_scheduled("✓ Reminder rescheduled", result)?;
        }

        Commands::Email {
            to,
            subject,
            text,
            html,
            delay_ms,
            priority,
        } => {
            let priority = match priority {
                Priority::High => "high",
                Priority::Medium => "medium",
                Priority::Low => "low",
            };
            let params = json!({
                "message": {"to": to, "subject": subject, "text": text, "html": html},
                "delay_ms": delay_ms,
                "priority": priority,
            });

            let result = call_rpc(&cli.rpc_url, "email.schedule.v1", params).await?;
            print_scheduled("✓ Email scheduled", result)?;
        }

        Commands::Cancel { job_id } => {
            let result = call_rpc(&cli.rpc_url, "job.cancel.v1", json!({ "job_id": job_id })).await?;

            if result["cancelled"].as_bool().unwrap_or(false) {
                println!("{}", format!("✓ Job {} cancelled", job_id).green().bold());
            } else {
                println!(
                    "{}",
                    format!("○ Job {} not cancelled (running, finished or unknown)", job_id)
                        .yellow()
                );
            }
        }

        Commands::Document {
            invoice_id,
            requested_by,
            email,
        } => {
            let params = json!({
                "invoice_id": invoice_id,
                "requested_by": requested_by,
                "delivery": delivery_params(email),
            });

            let result = call_rpc(&cli.rpc_url, "document.enqueue.v1", params).await?;
            println!("{}", "✓ Document generation enqueued".green().bold());
            println!("  {} {}", "Job ID:".bold(), result["job_id"]);
        }

        Commands::Enrich {
            lead_id,
            email,
            company,
            phone,
            website,
            value,
            status_hint,
        } => {
            let signals = present_params([
                ("email", email.map(Value::from)),
                ("company", company.map(Value::from)),
                ("phone", phone.map(Value::from)),
                ("website", website.map(Value::from)),
                ("estimated_value", value.map(Value::from)),
                ("status_hint", status_hint.map(Value::from)),
            ]);
            let params = json!({ "lead_id": lead_id, "signals": signals });

            let result = call_rpc(&cli.rpc_url, "lead.enrich.v1", params).await?;
            println!("{}", "✓ Lead enrichment enqueued".green().bold());
            println!("  {} {}", "Job ID:".bold(), result["job_id"]);
        }

        Commands::LeadStatus {
            lead_id,
            status,
            note,
        } => {
            let params = json!({ "lead_id": lead_id, "status": status, "note": note });

            let result = call_rpc(&cli.rpc_url, "lead.status.v1", params).await?;
            println!(
                "{}",
                format!("✓ Lead {} is now {}", lead_id, result["status"]).green().bold()
            );
            println!(
                "  {} {} ({})",
                "Score:".bold(),
                result["score"],
                result["priority"]
            );
        }

        Commands::LeadUpdate {
            lead_id,
            source,
            value,
            note,
        } => {
            let params = present_params([
                ("lead_id", Some(Value::from(lead_id))),
                ("source", source.map(Value::from)),
                ("estimated_value", value.map(Value::from)),
                ("note", note.map(Value::from)),
            ]);

            let result = call_rpc(&cli.rpc_url, "lead.update.v1", params).await?;
            println!("{}", format!("✓ Lead {} updated", lead_id).green().bold());
            println!(
                "  {} {} ({})",
                "Score:".bold(),
                result["score"],
                result["priority"]
            );
        }

        Commands::Status { job_id } => {
            println!("{}", format!("Job {}", job_id).cyan().bold());
            let view = call_rpc(&cli.rpc_url, "job.status.v1", json!({ "job_id": job_id })).await?;
            print_status(&view);
        }

        Commands::Pending { queue, target_id } => {
            let result = call_rpc(
                &cli.rpc_url,
                "jobs.pending.v1",
                json!({ "queue": queue, "target_id": target_id }),
            )
            .await?;
            let rows: Vec<PendingRow> = serde_json::from_value(result)?;

            if rows.is_empty() {
                println!("{}", "No outstanding jobs".yellow());
            } else {
                println!("{}", Table::new(rows));
            }
        }

        Commands::Stats { queue } => {
            let queues: Vec<String> = match queue {
                Some(q) => vec![q],
                None => QUEUES.iter().map(|q| q.to_string()).collect(),
            };

            let mut rows = Vec::new();
            for queue in queues {
                let result =
                    call_rpc(&cli.rpc_url, "queue.stats.v1", json!({ "queue": queue })).await?;
                let mut row: StatsRow = serde_json::from_value(result)?;
                row.queue = queue;
                rows.push(row);
            }

            println!("{}", "Queue Stats".cyan().bold());
            println!("{}", Table::new(rows));
        }
    }

    Ok(())
}
