//! Axum service memoizing an expensive lookup per path parameter.
//!
//! ```text
//! cargo run --example axum
//! curl localhost:3000/quotes/ACME
//! curl -X DELETE localhost:3000/quotes/ACME
//! ```

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use memo_kit::{
    backend::InMemoryBackend, Error, KeyRule, MemoizeOptions, Memoized, Memoizer, WrapOptions,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Quote {
    symbol: String,
    price: f64,
}

async fn fetch_quote(symbol: String) -> Result<Option<Quote>, Error> {
    log::info!("fetching quote for {} from upstream", symbol);
    tokio::time::sleep(Duration::from_millis(200)).await;

    if symbol.chars().all(|c| c.is_ascii_uppercase()) {
        let price = symbol.bytes().map(f64::from).sum::<f64>() / 10.0;
        Ok(Some(Quote { symbol, price }))
    } else {
        Ok(None)
    }
}

type Quotes = Memoized<InMemoryBackend, String, Quote, Error>;

async fn get_quote(
    State(quotes): State<Quotes>,
    Path(symbol): Path<String>,
) -> Result<Json<Quote>, StatusCode> {
    match quotes.call(symbol).await {
        Ok(Some(quote)) => Ok(Json(quote)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            log::error!("quote lookup failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn clear_quote(
    State(quotes): State<Quotes>,
    Path(symbol): Path<String>,
) -> Result<StatusCode, StatusCode> {
    match quotes.clear(&symbol).await {
        Ok(Some(0)) | Ok(None) => Ok(StatusCode::NOT_FOUND),
        Ok(Some(_)) => Ok(StatusCode::NO_CONTENT),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init()
        .ok();

    let memoizer = Memoizer::new(
        MemoizeOptions::from_env()?
            .with_client(InMemoryBackend::new())
            .with_ttl(Duration::from_secs(30)),
    );

    let quotes: Quotes = memoizer.wrap(
        fetch_quote,
        WrapOptions::new().with_key(KeyRule::from_fn(|f, symbol: &String| {
            format!("{}:{}", f.name, symbol)
        })),
    )?;

    let app = Router::new()
        .route("/quotes/{symbol}", get(get_quote).delete(clear_quote))
        .with_state(quotes);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    log::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
