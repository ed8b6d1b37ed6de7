//! Log in, restore the session on later runs, and list boletos
//!
//! Usage:
//!   BOLETOS_API_URL=http://localhost:3333 BOLETOS_EMAIL=... BOLETOS_PASSWORD=... \
//!     cargo run --example boletos

use boletos_client::{ApiClient, BoletoFilter, ClientConfig, FileCredentialStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ClientConfig::from_env()?;
    let store_path = FileCredentialStore::default_path()
        .unwrap_or_else(|| std::env::temp_dir().join("boletos-credentials.json"));
    let store = FileCredentialStore::open(&store_path)?;

    println!("=== Boletos Client Example ===");
    println!("Endpoint: {}", config.base_url);
    println!("Credentials: {}", store_path.display());
    println!();

    let client = ApiClient::new(config, Arc::new(store))?;

    // Watch auth state changes in the background
    let mut auth_changes = client.auth_state().subscribe();
    tokio::spawn(async move {
        while auth_changes.changed().await.is_ok() {
            let authenticated = auth_changes.borrow_and_update().is_authenticated;
            println!("  (auth state changed: authenticated = {authenticated})");
        }
    });

    match client.restore_session()? {
        Some(user) => println!("✓ Restored session for {}", user.email),
        None => {
            let email = std::env::var("BOLETOS_EMAIL")?;
            let password = std::env::var("BOLETOS_PASSWORD")?;
            let user = client.login(&email, &password).await?;
            println!("✓ Logged in as {}", user.email);
        }
    }
    println!();

    match client.list_boletos(&BoletoFilter::default()).await {
        Ok(boletos) => {
            println!("Boletos:");
            for boleto in boletos {
                println!(
                    "  - {} | R$ {:.2} | due {} | {:?}",
                    boleto.description, boleto.amount, boleto.due_date, boleto.status
                );
            }
        }
        Err(e) if e.is_auth_failure() => {
            println!("! Session is no longer valid ({e}); log in again");
        }
        Err(e) => return Err(e.into()),
    }
    println!();

    if std::env::var("BOLETOS_LOGOUT").is_ok() {
        client.logout().await;
        println!("✓ Logged out");
    }

    Ok(())
}
