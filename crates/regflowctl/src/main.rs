mod client;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use client::{LogRow, RegflowClient, TransitionBody, TransitionResult};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Parser)]
#[command(name = "regflow")]
#[command(version, about = "Registration workflow log client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// regflow server URL
    #[arg(long, env = "REGFLOW_SERVER_URL", default_value = "http://localhost:8082")]
    server_url: String,

    /// Print the raw JSON response
    #[arg(short, long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List workflow stages, their decisions and where each decision routes
    Stages,

    /// Show the log chain of an application, newest first
    Logs {
        /// Application (main_db) id
        main_db_id: i64,

        /// Only rows recorded under this step
        #[arg(short, long)]
        step: Option<String>,
    },

    /// Show the last and next log index of an application
    LastIndex {
        main_db_id: i64,
    },

    /// Show the ordered timeline of an application with the current step marked
    Timeline {
        main_db_id: i64,
    },

    /// Check the log chain of an application for broken linkage
    Verify {
        main_db_id: i64,
    },

    /// Record a decision and hand the application to the next stage(s)
    ///
    /// Examples:
    ///     regflow transition 42 --stage Decking --actor decker \
    ///         --decision "For S&E and Quality Evaluation" \
    ///         --assign "S&E=se_reviewer" --assign "Quality Evaluation=evaluator"
    ///     regflow transition 42 --stage Director --actor director \
    ///         --decision Approved --assign Releasing=releaser
    #[command(verbatim_doc_comment)]
    Transition {
        main_db_id: i64,

        /// Stage being closed
        #[arg(long)]
        stage: String,

        /// User taking the decision
        #[arg(long)]
        actor: String,

        #[arg(long)]
        decision: String,

        #[arg(long)]
        remarks: Option<String>,

        /// Next actor per target stage (format: STAGE=USER), can be repeated
        #[arg(long = "assign", value_name = "STAGE=USER")]
        assignments: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = RegflowClient::new(&cli.server_url);

    match cli.command {
        Commands::Stages => {
            let workflow: Value = client.get("/workflow/stages").await?;
            if cli.json {
                return print_json(&workflow);
            }
            print_stages(&workflow);
        }
        Commands::Logs { main_db_id, step } => {
            let path = match step {
                Some(step) => format!("/application-logs/main-db/{}/step/{}", main_db_id, step),
                None => format!("/application-logs/main-db/{}", main_db_id),
            };
            if cli.json {
                let raw: Value = client.get(&path).await?;
                return print_json(&raw);
            }
            let rows: Vec<LogRow> = client.get(&path).await?;
            if rows.is_empty() {
                println!("No log entries for application {}", main_db_id);
            } else {
                print_rows(&rows);
            }
        }
        Commands::LastIndex { main_db_id } => {
            let index: Value = client
                .get(&format!("/application-logs/main-db/{}/last-index", main_db_id))
                .await?;
            if cli.json {
                return print_json(&index);
            }
            println!(
                "Application {}: last index {}, next index {}",
                main_db_id, index["last_index"], index["next_index"]
            );
        }
        Commands::Timeline { main_db_id } => {
            let timeline: Value = client
                .get(&format!("/application-logs/main-db/{}/timeline", main_db_id))
                .await?;
            if cli.json {
                return print_json(&timeline);
            }
            print_timeline(&timeline);
        }
        Commands::Verify { main_db_id } => {
            let report: Value = client
                .get(&format!("/application-logs/main-db/{}/verify", main_db_id))
                .await?;
            let valid = report["valid"].as_bool().unwrap_or(false);
            if cli.json {
                print_json(&report)?;
            } else {
                print_report(main_db_id, &report);
            }
            if !valid {
                std::process::exit(1);
            }
        }
        Commands::Transition {
            main_db_id,
            stage,
            actor,
            decision,
            remarks,
            assignments,
        } => {
            let body = TransitionBody {
                stage,
                actor,
                decision,
                remarks,
                assignees: parse_assignments(&assignments)?,
            };
            let path = format!("/application-logs/main-db/{}/transition", main_db_id);
            if cli.json {
                let raw: Value = client.post(&path, &body).await?;
                return print_json(&raw);
            }
            let result: TransitionResult = client.post(&path, &body).await?;
            println!("Recorded transition for application {}:", result.main_db_id);
            print_rows(&result.entries);
        }
    }

    Ok(())
}

/// Parse repeated `STAGE=USER` pairs. Stage names may contain spaces and `&`
/// but not `=`.
fn parse_assignments(assignments: &[String]) -> Result<BTreeMap<String, String>> {
    let mut parsed = BTreeMap::new();
    for assignment in assignments {
        let (stage, user) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid assignment format: {}. Expected STAGE=USER", assignment))?;
        let (stage, user) = (stage.trim(), user.trim());
        if stage.is_empty() || user.is_empty() {
            return Err(anyhow!("Invalid assignment format: {}. Expected STAGE=USER", assignment));
        }
        if parsed.insert(stage.to_string(), user.to_string()).is_some() {
            return Err(anyhow!("Stage '{}' assigned more than once", stage));
        }
    }
    Ok(parsed)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_stages(workflow: &Value) {
    let stages = workflow["stages"].as_array().cloned().unwrap_or_default();
    for stage in &stages {
        println!("{}", stage["name"].as_str().unwrap_or("?"));
        for decision in stage["decisions"].as_array().into_iter().flatten() {
            let targets: Vec<&str> = decision["next"]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|t| t.as_str())
                .collect();
            let route = if targets.is_empty() {
                "(end)".to_string()
            } else {
                targets.join(", ")
            };
            println!("  {:<36} -> {}", decision["decision"].as_str().unwrap_or("?"), route);
        }
    }
}

const ROW_HEADER: [&str; 9] = [
    "INDEX", "PREV", "STEP", "USER", "STATUS", "THREAD", "STARTED", "DONE", "DECISION",
];

fn format_line(cols: [&str; 9]) -> String {
    format!(
        "{:<6} {:<6} {:<20} {:<16} {:<12} {:<6} {:<17} {:<17} {}",
        cols[0], cols[1], cols[2], cols[3], cols[4], cols[5], cols[6], cols[7], cols[8]
    )
}

fn format_row(row: &LogRow) -> String {
    let del_index = row.del_index.to_string();
    let del_previous = row.del_previous.to_string();
    let started = row.start_date.format("%Y-%m-%d %H:%M").to_string();
    let done = row
        .accomplished_date
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format_line([
        del_index.as_str(),
        del_previous.as_str(),
        row.application_step.as_str(),
        row.user_name.as_str(),
        row.application_status.as_str(),
        row.del_thread.as_str(),
        started.as_str(),
        done.as_str(),
        row.application_decision.as_deref().unwrap_or("-"),
    ])
}

fn print_rows(rows: &[LogRow]) {
    println!("{}", format_line(ROW_HEADER));
    for row in rows {
        println!("{}", format_row(row));
        if let Some(remarks) = row.application_remarks.as_deref() {
            println!("{:<6} remarks: {}", "", remarks);
        }
    }
}

fn print_timeline(timeline: &Value) {
    let steps = timeline["steps"].as_array().cloned().unwrap_or_default();
    if steps.is_empty() {
        println!("No log entries for application {}", timeline["main_db_id"]);
        return;
    }
    for step in &steps {
        let marker = if step["is_current"].as_bool().unwrap_or(false) { "*" } else { " " };
        println!(
            "{} {:>4}  {:<20} {:<16} {:<12} {}",
            marker,
            step["del_index"],
            step["step"].as_str().unwrap_or("?"),
            step["user_name"].as_str().unwrap_or("?"),
            step["status"].as_str().unwrap_or("?"),
            step["decision"].as_str().unwrap_or(""),
        );
    }
    if let Some(active) = timeline["active_steps"].as_array() {
        let names: Vec<&str> = active.iter().filter_map(|s| s.as_str()).collect();
        if !names.is_empty() {
            println!("\nActive: {}", names.join(", "));
        }
    }
}

fn print_report(main_db_id: i64, report: &Value) {
    let violations = report["violations"].as_array().cloned().unwrap_or_default();
    if violations.is_empty() {
        println!(
            "Application {}: chain of {} entries is valid",
            main_db_id, report["entry_count"]
        );
        return;
    }
    println!(
        "Application {}: {} violation(s) in {} entries",
        main_db_id,
        violations.len(),
        report["entry_count"]
    );
    for violation in &violations {
        println!("  {}", violation);
    }
}
