use cbpro::core::config::ExchangeConfig;
use cbpro::{CoinbaseProBuilder, PageRequest};
use futures_util::StreamExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // CBPRO_API_KEY / CBPRO_SECRET / CBPRO_PASSPHRASE, all optional
    let config = ExchangeConfig::from_env_file("CBPRO")?.sandbox(true);
    let authenticated = config.has_credentials();

    let connector = CoinbaseProBuilder::new().with_config(config).build_rest_only()?;

    println!("Fetching products...");
    match connector.market.get_products().await {
        Ok(products) => {
            println!("Found {} products", products.len());
            for product in products.iter().take(5) {
                println!(
                    "Product: {} ({}->{})",
                    product.id, product.base_currency, product.quote_currency
                );
            }
        }
        Err(e) => println!("Error fetching products: {}", e),
    }

    println!("\nFetching one page of BTC-USD trades...");
    match connector
        .market
        .get_trades("BTC-USD", &PageRequest::new().limit(5))
        .await
    {
        Ok(page) => {
            for trade in page.iter() {
                println!(
                    "Trade {}: {:?} {} @ {}",
                    trade.trade_id, trade.side, trade.size, trade.price
                );
            }
            println!(
                "Cursors: before={:?} after={:?}",
                page.before().map(|c| c.as_str()),
                page.after().map(|c| c.as_str())
            );
        }
        Err(e) => println!("Error fetching trades: {}", e),
    }

    println!("\nWalking three pages of older trades...");
    let mut trades = connector
        .market
        .stream_trades("BTC-USD", PageRequest::new().limit(5), Some(3));
    let mut seen = 0;
    while let Some(trade) = trades.next().await {
        match trade {
            Ok(_) => seen += 1,
            Err(e) => {
                println!("Error while paging: {}", e);
                break;
            }
        }
    }
    println!("Streamed {} trades", seen);

    if authenticated {
        println!("\nFetching accounts...");
        match connector.accounts.get_accounts().await {
            Ok(accounts) => {
                for account in accounts {
                    println!("{}: {} available", account.currency, account.available);
                }
            }
            Err(e) => println!("Error fetching accounts: {}", e),
        }
    }

    Ok(())
}
