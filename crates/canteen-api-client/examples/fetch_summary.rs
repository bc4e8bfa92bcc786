//! Fetch a finance summary from a running Canteen backend.
//!
//! ```sh
//! CANTEEN_API_BASE_URL=http://localhost:8080 \
//! CANTEEN_API_TOKEN=<token> \
//! cargo run --example fetch_summary
//! ```

use canteen_api_client::{ApiClient, ClientConfig, SessionStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    canteen_common_log::init_from_env()?;

    let session = SessionStore::new();
    if let Ok(token) = std::env::var("CANTEEN_API_TOKEN") {
        session.set_token(token);
    }

    let client = ApiClient::new(ClientConfig::from_env(), session)?;

    let summary: serde_json::Value = client
        .get("/api/v1/finance/summary", &[("period", "month")])
        .await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
