use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use serde_json::Value;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use servimed_etl::config::Settings;
use servimed_etl::queue::{RetryPolicy, StatusStore, TaskQueue, TaskRequest};
use servimed_etl::services::{OrderService, ScrapeService};
use servimed_etl::{LineItem, OrderRequest};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "servimed", about = "Servimed portal product scraper and order client")]
struct Cli {
    /// 1 = direct scrape, 2 = queued scrape with callback delivery, 3 = queued order
    #[arg(short, long, default_value_t = 1)]
    nivel: u8,

    /// Product filter term; empty scrapes the whole catalogue
    #[arg(short, long, default_value = "")]
    filtro: String,

    /// Stop after this many pages
    #[arg(short = 'p', long)]
    max_pages: Option<u32>,

    /// Submit the task to the queue
    #[arg(long)]
    enqueue: bool,

    /// Look up a previously enqueued task instead of submitting one
    #[arg(long, value_name = "TASK_ID")]
    status: Option<String>,

    /// External order identifier
    #[arg(long)]
    pedido_id: Option<String>,

    /// Product code to order
    #[arg(long)]
    codigo: Option<String>,

    /// Units of the product to order
    #[arg(long, default_value_t = 1)]
    quantidade: u32,

    /// Barcode used as a fallback match during order verification
    #[arg(long, default_value = "")]
    gtin: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::new()?;

    match cli.nivel {
        1 => direct_scrape(settings, &cli).await,
        2 => queued_scrape(settings, &cli).await,
        3 => queued_order(settings, &cli).await,
        other => anyhow::bail!("unknown nivel {other}, expected 1, 2 or 3"),
    }
}

async fn direct_scrape(settings: Settings, cli: &Cli) -> Result<()> {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    println!("Starting extraction at: {}", timestamp);
    if cli.filtro.is_empty() {
        println!("Scope: full catalogue");
    } else {
        println!("Scope: filter \"{}\"", cli.filtro);
    }

    let service = ScrapeService::new(settings);
    let (run, output_file) = service.scrape(&cli.filtro, cli.max_pages).await?;

    println!("\nExtraction Summary:");
    println!("Total Products: {}", run.records.len());
    println!("Dropped Records: {}", run.dropped);
    println!("Pages Processed: {}", run.pages_fetched);
    println!("Reported by Server: {}", run.total_reported);
    println!("Output File: {}", output_file.display());
    println!("Total Time: {:.2} seconds", run.duration_secs());
    if run.duration_secs() > 0.0 {
        println!(
            "Average Speed: {:.1} products/second",
            run.records.len() as f64 / run.duration_secs()
        );
    }

    Ok(())
}

async fn queued_scrape(settings: Settings, cli: &Cli) -> Result<()> {
    if let Some(raw) = &cli.status {
        return print_status(&settings, raw);
    }
    if !cli.enqueue {
        println!("Nothing to do: pass --enqueue to submit a scrape task, or --status TASK_ID to inspect one");
        return Ok(());
    }

    let filter = cli.filtro.clone();
    let max_pages = cli.max_pages;
    let queue = start_queue(settings)?;

    let task_id = queue.enqueue(TaskRequest::Scrape { filter, max_pages })?;
    println!("Task enqueued: {}", task_id);

    let report = queue.wait(task_id, POLL_INTERVAL).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn queued_order(settings: Settings, cli: &Cli) -> Result<()> {
    if let Some(raw) = &cli.status {
        return print_status(&settings, raw);
    }
    let Some(codigo) = cli.codigo.clone() else {
        println!("Nothing to do: pass --codigo PRODUCT_CODE to submit an order, or --status TASK_ID to inspect one");
        return Ok(());
    };

    let order_id = cli
        .pedido_id
        .clone()
        .unwrap_or_else(|| format!("PED{}", Utc::now().timestamp()));
    let order = OrderRequest {
        order_id,
        line_items: vec![LineItem {
            code: codigo,
            gtin: cli.gtin.clone(),
            quantity: cli.quantidade,
        }],
        callback_url: settings.callback.base_url.clone(),
    };

    let queue = start_queue(settings)?;
    let task_id = queue.enqueue(TaskRequest::Order { order })?;
    println!("Order task enqueued: {}", task_id);

    let report = queue.wait(task_id, POLL_INTERVAL).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_status(settings: &Settings, raw: &str) -> Result<()> {
    let task_id = Uuid::parse_str(raw)?;
    let store = StatusStore::for_storage(&settings.storage)?;
    let report = store.get(task_id)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn start_queue(settings: Settings) -> Result<TaskQueue> {
    let store = StatusStore::for_storage(&settings.storage)?;
    let policy = RetryPolicy::from(&settings.queue);
    Ok(TaskQueue::start(store, policy, move |request| {
        dispatch(settings.clone(), request)
    }))
}

async fn dispatch(settings: Settings, request: TaskRequest) -> servimed_etl::Result<Value> {
    match request {
        TaskRequest::Scrape { filter, max_pages } => {
            let report = ScrapeService::new(settings)
                .scrape_and_deliver(&filter, max_pages)
                .await?;
            Ok(serde_json::to_value(report)?)
        }
        TaskRequest::Order { order } => {
            let report = OrderService::new(settings).process(&order).await?;
            Ok(serde_json::to_value(report)?)
        }
    }
}
