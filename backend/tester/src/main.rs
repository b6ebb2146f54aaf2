use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use stock::{
    burst::BurstSummary,
    database::{MenuId, Stock},
    error::StockError,
    service::DecrementResult,
};
use tokio::task::JoinSet;

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    menu_id: MenuId,

    #[arg(short, long, default_value_t = 10)]
    concurrency: usize,

    /// Use the lock-guarded path
    #[arg(short, long)]
    lock: bool,

    /// Reset the stock to this value before firing
    #[arg(short, long)]
    reseed: Option<Stock>,

    #[arg(long, default_value = "http://localhost:1111")]
    base_url: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    data: Option<StockView>,
}

#[derive(Deserialize)]
struct StockView {
    stock: Stock,
}

fn fault(reason: impl Into<String>) -> StockError {
    StockError::UnexpectedFault(reason.into())
}

async fn decrease(client: &Client, url: &str, menu_id: MenuId) -> DecrementResult {
    let response = client
        .post(url)
        .send()
        .await
        .map_err(|e| fault(e.to_string()))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(StockError::NotFound(menu_id));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(fault(format!("{status} {body}")));
    }

    match response.json::<ApiResponse>().await {
        Ok(ApiResponse {
            data: Some(StockView { stock }),
        }) => Ok(stock),
        Ok(_) => Err(fault("response without stock")),
        Err(e) => Err(fault(e.to_string())),
    }
}

async fn current_stock(client: &Client, stock_url: &str) -> Result<Stock> {
    let response: ApiResponse = client
        .get(stock_url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    response
        .data
        .map(|view| view.stock)
        .context("stock response had no data")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = Client::new();

    let base_url = args.base_url.trim_end_matches('/');
    let menu_url = format!("{base_url}/api/menus/{}", args.menu_id);
    let stock_url = format!("{menu_url}/stock");
    let decrease_url = format!("{menu_url}/decrease-stock?lock={}", args.lock);

    if let Some(stock) = args.reseed {
        client
            .put(&stock_url)
            .json(&json!({ "stock": stock }))
            .send()
            .await?
            .error_for_status()
            .context("reseed failed")?;

        println!("Reseeded menu {} with stock {}", args.menu_id, stock);
    }

    let initial = current_stock(&client, &stock_url).await?;
    println!("Initial stock: {initial}");
    println!(
        "Firing {} requests ({})\n",
        args.concurrency,
        if args.lock { "lock" } else { "no lock" }
    );

    let pb = ProgressBar::new(args.concurrency as u64);
    pb.set_style(ProgressStyle::with_template(PROGRESS_TEMPLATE)?.progress_chars("=> "));

    let mut join_set = JoinSet::new();

    for request_id in 0..args.concurrency {
        let client = client.clone();
        let url = decrease_url.clone();
        let menu_id = args.menu_id;

        join_set.spawn(async move { (request_id, decrease(&client, &url, menu_id).await) });
    }

    let mut slots: Vec<Option<DecrementResult>> = (0..args.concurrency).map(|_| None).collect();

    while let Some(joined) = join_set.join_next().await {
        if let Ok((request_id, result)) = joined {
            slots[request_id] = Some(result);
        }
        pb.inc(1);
    }

    pb.finish_and_clear();

    let results: Vec<DecrementResult> = slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(fault("task did not complete"))))
        .collect();

    for (request_id, result) in results.iter().enumerate() {
        match result {
            Ok(stock) => println!("#{request_id:<4} stock -> {stock}"),
            Err(e) => println!("#{request_id:<4} failed: {e}"),
        }
    }

    let final_stock = current_stock(&client, &stock_url).await?;
    let summary = BurstSummary::new(args.menu_id, args.lock, &results, Some(final_stock));

    println!("\nStrategy: {:?}", summary.strategy);
    println!("Successes: {}", summary.successes);
    println!("Failures: {}", summary.failures);

    if let (Some(min), Some(max)) = (summary.min_stock, summary.max_stock) {
        println!("Observed stock range: {min} ~ {max}");
    }

    println!("Final stock: {final_stock}");
    println!("Expected stock: {}", initial - summary.successes as Stock);

    if let Some(lost) = summary.lost_updates(initial).filter(|&lost| lost != 0) {
        println!("Lost updates: {lost}");
    }

    Ok(())
}
