// src/main.rs

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::env;
use std::error::Error;

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Balances {
    flextime: Option<i64>,
    remaining_vacation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Success {
    success: Balances,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_code: u16,
    message: String,
}

async fn probe(client: &Client, url: &str) -> Result<Balances, Box<dyn Error>> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if status != StatusCode::OK {
        let body = response.json::<ErrorBody>().await?;
        return Err(format!("{} -> {} ({}): {}", url, status, body.error_code, body.message).into());
    }
    Ok(response.json::<Success>().await?.success)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url = env::var("TIMESBOOK_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
    let username = env::args().nth(1).unwrap_or_else(|| "max".to_string());
    let client = Client::new();

    // Test 1: Health check
    println!("\n🔍 Testing health check endpoint...");
    let health = client
        .get(format!("{}/health", base_url))
        .send()
        .await?
        .json::<HealthResponse>()
        .await?;
    println!("Health check response: {}", health.status);

    // Test 2: Flextime
    println!("\n🔍 Fetching flextime for {}...", username);
    let flextime = probe(&client, &format!("{}/api/users/{}/flextime", base_url, username)).await?;
    match flextime.flextime {
        Some(minutes) => println!("Flextime: {} min ({:+.2} h)", minutes, minutes as f64 / 60.0),
        None => println!("Flextime missing from response"),
    }

    // Test 3: Remaining vacation
    println!("\n🔍 Fetching remaining vacation for {}...", username);
    let vacation = probe(
        &client,
        &format!("{}/api/users/{}/remaining-vacation", base_url, username),
    )
    .await?;
    match vacation.remaining_vacation {
        Some(days) => println!("Remaining vacation: {:.2} days", days),
        None => println!("Remaining vacation missing from response"),
    }

    // Test 4: Unknown user must be a 404 with an error code
    println!("\n🔍 Checking error mapping for an unknown user...");
    let response = client
        .get(format!("{}/api/users/__nobody__/flextime", base_url))
        .send()
        .await?;
    println!("Unknown user status: {}", response.status());
    if response.status() == StatusCode::NOT_FOUND {
        let body = response.json::<ErrorBody>().await?;
        println!("Error code {}: {}", body.error_code, body.message);
    }

    println!("\n✅ Smoke test finished");
    Ok(())
}
