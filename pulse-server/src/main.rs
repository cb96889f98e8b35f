use std::env;
use std::process;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;

use pulse_bridge::answers::format_dollars;
use pulse_bridge::{Assistant, LlmClient};
use pulse_pipeline::canonical::{CustomerRecord, RowError, UploadBatch};
use pulse_pipeline::ingest::Ingestor;
use pulse_pipeline::record_store::{AggregateMetrics, RecordStore, SegmentRollup};
use pulse_scoring::{RemoteScoringClient, ScoringEngine};

/// Churn threshold for the digest's at-risk list.
const AT_RISK_THRESHOLD: f64 = 0.5;
/// Upsell threshold for the digest's opportunity list.
const UPSELL_THRESHOLD: f64 = 0.5;

// ---------------------------------------------------------------------------
// JSON output contract
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct DigestJson {
    generated_at: String,
    user_id: String,
    batch_id: String,
    ingest_ms: u128,
    row_count: usize,
    row_errors: Vec<RowError>,
    metrics: AggregateMetrics,
    segments: Vec<SegmentRollup>,
    at_risk: Vec<CustomerJson>,
    upsell: Vec<CustomerJson>,
    key_insights: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chat: Option<ChatJson>,
}

#[derive(Serialize)]
struct CustomerJson {
    customer_id: String,
    company_name: String,
    segment: String,
    risk_level: String,
    churn_probability: f64,
    upsell_score: f64,
    total_spent: f64,
    engagement_score: i64,
}

#[derive(Serialize)]
struct ChatJson {
    question: String,
    response: String,
    suggestions: Vec<String>,
}

fn customer_json(record: &CustomerRecord) -> CustomerJson {
    CustomerJson {
        customer_id: record.customer_id.clone(),
        company_name: record.company_name.clone(),
        segment: record.segment.to_string(),
        risk_level: record.risk_level.to_string(),
        churn_probability: record.churn_probability,
        upsell_score: record.upsell_score,
        total_spent: record.total_spent,
        engagement_score: record.engagement_score,
    }
}

// ---------------------------------------------------------------------------
// Human-readable output
// ---------------------------------------------------------------------------

fn print_human(digest: &DigestJson, top: usize) {
    println!();
    println!("  \u{2554}{}\u{2557}", "\u{2550}".repeat(62));
    println!("  \u{2551}{:^62}\u{2551}", "CUSTOMER PULSE \u{2014} Account Intelligence Digest");
    println!("  \u{255a}{}\u{255d}", "\u{2550}".repeat(62));
    println!();

    let m = &digest.metrics;
    println!(
        "  {} customers  \u{00b7}  ${} total revenue  \u{00b7}  avg engagement {:.0}",
        m.total_customers,
        format_dollars(m.total_revenue),
        m.average_engagement
    );
    println!(
        "  {} rows ingested ({} row errors)  \u{00b7}  churn rate {:.0}%  \u{00b7}  {} active",
        digest.row_count,
        digest.row_errors.len(),
        m.churn_rate * 100.0,
        m.active_customers
    );
    println!();

    if !digest.segments.is_empty() {
        println!("  Segments");
        println!("  {:\u{2500}<64}", "");
        for s in &digest.segments {
            println!(
                "  {:14} {:>5} customers  {:>12}  engagement {:.0}",
                s.segment.to_string(),
                s.count,
                format!("${}", format_dollars(s.revenue)),
                s.avg_engagement
            );
        }
        println!();
    }

    if digest.at_risk.is_empty() {
        println!("  No customers above the churn risk threshold. All clear!");
    } else {
        println!("  Top churn risks");
        println!("  {:\u{2500}<64}", "");
        for (i, c) in digest.at_risk.iter().take(top).enumerate() {
            println!(
                "  {}. {:24} {:>4.0}% churn  {:8} {:>12}",
                i + 1,
                c.company_name,
                c.churn_probability * 100.0,
                c.risk_level,
                format!("${}", format_dollars(c.total_spent)),
            );
        }
    }
    println!();

    if !digest.upsell.is_empty() {
        println!("  Upsell opportunities");
        println!("  {:\u{2500}<64}", "");
        for (i, c) in digest.upsell.iter().take(top).enumerate() {
            println!(
                "  {}. {:24} score {:.2}  {:12} {:>12}",
                i + 1,
                c.company_name,
                c.upsell_score,
                c.segment,
                format!("${}", format_dollars(c.total_spent)),
            );
        }
        println!();
    }

    for insight in &digest.key_insights {
        println!("  \u{2022} {}", insight);
    }

    if let Some(chat) = &digest.chat {
        println!();
        println!("  Q: {}", chat.question);
        println!("  {:\u{2500}<64}", "");
        for line in chat.response.lines() {
            println!("  {}", line);
        }
    }

    println!();
    println!("  \u{23f1}  Ingested and scored in {}ms", digest.ingest_ms);
    println!();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn usage() -> ! {
    eprintln!("Usage: pulse-server <customers.csv|customers.json> [--user U] [--top N] [--json] [--chat \"message\"]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --user   Tenant id to ingest under (default: demo-user)");
    eprintln!("  --top    Number of rows per digest list (default: 5)");
    eprintln!("  --json   Output as JSON instead of formatted text");
    eprintln!("  --chat   Run one assistant turn after ingesting");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PULSE_SCORING_URL  Remote scoring service base URL (optional)");
    eprintln!("  PULSE_LLM_URL      Language model base URL (optional)");
    eprintln!("  PULSE_LLM_MODEL    Model name (default: llama3)");
    process::exit(1);
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage();
    }

    let file_path = &args[1];
    let mut user_id = "demo-user".to_string();
    let mut top: usize = 5;
    let mut json_output = false;
    let mut chat_message: Option<String> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--user" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --user requires a value");
                    process::exit(1);
                }
                user_id = args[i + 1].clone();
                i += 2;
            }
            "--top" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --top requires a number");
                    process::exit(1);
                }
                top = args[i + 1].parse().unwrap_or_else(|_| {
                    eprintln!("Error: --top requires a positive integer");
                    process::exit(1);
                });
                i += 2;
            }
            "--json" => {
                json_output = true;
                i += 1;
            }
            "--chat" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --chat requires a message");
                    process::exit(1);
                }
                chat_message = Some(args[i + 1].clone());
                i += 2;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                usage();
            }
        }
    }

    // Scoring: remote when configured, rule model otherwise.
    let engine = match env::var("PULSE_SCORING_URL") {
        Ok(url) if !url.is_empty() => match RemoteScoringClient::new(url) {
            Ok(client) => ScoringEngine::with_remote(client),
            Err(err) => {
                eprintln!("Error: bad PULSE_SCORING_URL: {}", err);
                process::exit(1);
            }
        },
        _ => ScoringEngine::fallback_only(),
    };

    let bytes = match std::fs::read(file_path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("Error reading '{}': {}", file_path, err);
            process::exit(1);
        }
    };

    let file_name = file_path.rsplit('/').next().unwrap_or(file_path);
    let mut batch = match UploadBatch::new(&user_id, file_name, bytes.len() as u64) {
        Ok(batch) => batch,
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(1);
        }
    };

    let store = RecordStore::new();
    let ingestor = Ingestor::new(&engine, &store);

    let ingest_start = Instant::now();
    let report = match ingestor.process(&mut batch, &bytes).await {
        Ok(report) => report,
        Err(err) => {
            eprintln!("Error processing '{}': {}", file_path, err);
            process::exit(1);
        }
    };
    let ingest_ms = ingest_start.elapsed().as_millis();

    // Optional chat turn.
    let chat = match &chat_message {
        Some(message) => {
            let llm = match env::var("PULSE_LLM_URL") {
                Ok(url) if !url.is_empty() => {
                    let model =
                        env::var("PULSE_LLM_MODEL").unwrap_or_else(|_| "llama3".to_string());
                    LlmClient::new(url, model).ok()
                }
                _ => None,
            };
            let assistant = Assistant::new(llm);
            let reply = assistant.process_message(&store, &user_id, message).await;
            Some(ChatJson {
                question: message.clone(),
                response: reply.response,
                suggestions: reply.suggestions,
            })
        }
        None => None,
    };

    let digest = DigestJson {
        generated_at: Utc::now().to_rfc3339(),
        user_id: user_id.clone(),
        batch_id: report.batch_id.clone(),
        ingest_ms,
        row_count: report.row_count,
        row_errors: report.errors.clone(),
        metrics: store.aggregate(&user_id),
        segments: store.segment_rollup(&user_id),
        at_risk: store
            .at_risk(&user_id, AT_RISK_THRESHOLD, top)
            .iter()
            .map(customer_json)
            .collect(),
        upsell: store
            .upsell(&user_id, UPSELL_THRESHOLD, top)
            .iter()
            .map(customer_json)
            .collect(),
        key_insights: report.outcome.insights.key_insights.clone(),
        chat,
    };

    if json_output {
        match serde_json::to_string_pretty(&digest) {
            Ok(json) => println!("{}", json),
            Err(err) => {
                eprintln!("Error serializing digest: {}", err);
                process::exit(1);
            }
        }
    } else {
        print_human(&digest, top);
    }
}
