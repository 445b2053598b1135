//! Customer service demo — records in one Redis, cached reads in another.
//!
//! Start the server (both Redis instances must be reachable):
//!
//! ```text
//! $ cargo run --example customer_service
//! ```
//!
//! Create a customer:
//!
//! ```text
//! $ curl -X POST http://localhost:8000/customer \
//!     -H 'Content-Type: application/json' \
//!     -d '{"first_name":"Andrew","last_name":"Brookins","email":"a@example.com","age":"38","join_date":"2020-01-02"}'
//! {"pk":"0190...","age":38,"email":"a@example.com",...}
//! ```
//!
//! Read it back — the second request within 10 seconds is served from the
//! cache (watch the `X-Cache` header flip from `MISS` to `HIT`):
//!
//! ```text
//! $ curl -i http://localhost:8000/customer/<pk>
//! ```
//!
//! List all primary keys:
//!
//! ```text
//! $ curl http://localhost:8000/customers
//! {"customers":["0190..."]}
//! ```

use std::sync::Arc;
use std::time::Duration;

use cachet::cache::{RedisBackend, ResponseCache};
use cachet::context::Context;
use cachet::middleware::{LoggerMiddleware, MiddlewareHandler, Next, from_middleware};
use cachet::store::{
    FieldKind, FieldSpec, RecordSchema, RecordStore, RedisRecordStore, StoreError,
};
use cachet::{Response, Router, StatusCode, server::Server};

/// How long a cached customer read stays fresh.
const CACHE_TTL: Duration = Duration::from_secs(10);

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_owned())
}

fn json_response(value: &serde_json::Value) -> Response {
    match Response::json(value) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "response serialization failed");
            Response::new(StatusCode::InternalServerError).body("serialization failure")
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Two independent endpoints: one Redis tuned for durability holds the
    // records, one tuned for performance holds the cache.
    let data_url = env_or("REDIS_DATA_URL", "redis://localhost:6380");
    let cache_url = env_or("REDIS_CACHE_URL", "redis://localhost:6381");
    let bind_addr = env_or("BIND_ADDR", "127.0.0.1:8000");

    let schema = Arc::new(
        RecordSchema::new("customer")
            .field(FieldSpec::required("first_name", FieldKind::Text))
            .field(FieldSpec::required("last_name", FieldKind::Text))
            .field(FieldSpec::required("email", FieldKind::Email))
            .field(FieldSpec::required("join_date", FieldKind::Date))
            .field(FieldSpec::required("age", FieldKind::Integer))
            .field(FieldSpec::optional("bio", FieldKind::Text)),
    );

    let store: Arc<dyn RecordStore> =
        Arc::new(RedisRecordStore::new(&data_url, Arc::clone(&schema))?);
    let cache = ResponseCache::new(Arc::new(RedisBackend::new(&cache_url)?), "cachet-demo")?;

    let mut router = Router::new();

    // POST /customer — validate and persist; never cached.
    {
        let schema = Arc::clone(&schema);
        let store = Arc::clone(&store);
        router.post("/customer", move |ctx: Context| {
            let schema = Arc::clone(&schema);
            let store = Arc::clone(&store);
            async move {
                let body: serde_json::Value = match ctx.json() {
                    Ok(body) => body,
                    Err(e) => {
                        return Response::new(StatusCode::BadRequest)
                            .body(format!("invalid JSON body: {e}"));
                    }
                };
                let record = match schema.validate(&body) {
                    Ok(record) => record,
                    Err(e) => {
                        return Response::new(StatusCode::UnprocessableEntity).body(e.to_string());
                    }
                };
                match store.save(record.clone()).await {
                    Ok(pk) => json_response(&record.to_json(Some(&pk))),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to save customer");
                        Response::new(StatusCode::ServiceUnavailable)
                            .body("record store unavailable")
                    }
                }
            }
        });
    }

    // GET /customers — list primary keys; uncached.
    {
        let store = Arc::clone(&store);
        router.get("/customers", move |_ctx: Context| {
            let store = Arc::clone(&store);
            async move {
                match store.all_ids().await {
                    Ok(ids) => json_response(&serde_json::json!({ "customers": ids })),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to list customers");
                        Response::new(StatusCode::ServiceUnavailable)
                            .body("record store unavailable")
                    }
                }
            }
        });
    }

    // GET /customer/:pk — read one record, cached for CACHE_TTL.
    // A 404 passes through uncached.
    {
        let store = Arc::clone(&store);
        let read_customer = move |ctx: Context| {
            let store = Arc::clone(&store);
            async move {
                let pk = ctx.params().get("pk").unwrap_or_default().to_owned();
                match store.get(&pk).await {
                    Ok(record) => json_response(&record.to_json(Some(&pk))),
                    Err(StoreError::NotFound(_)) => {
                        Response::new(StatusCode::NotFound).body("Customer not found")
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to read customer");
                        Response::new(StatusCode::ServiceUnavailable)
                            .body("record store unavailable")
                    }
                }
            }
        };
        router.get(
            "/customer/:pk",
            cache.wrap("customer.get", CACHE_TTL, read_customer)?,
        );
    }

    let router = Arc::new(router);
    let chain: Vec<MiddlewareHandler> = vec![
        from_middleware(Arc::new(LoggerMiddleware)),
        {
            let router = Arc::clone(&router);
            Arc::new(move |ctx: Context, _next: Next| {
                let router = Arc::clone(&router);
                Box::pin(async move { router.route(ctx.into_request()).await })
            })
        },
    ];

    let server = Server::bind(&bind_addr).await?;
    tracing::info!(address = %server.local_addr(), "customer service up");

    server
        .run_until(
            move |request| {
                let chain = chain.clone();
                async move { Next::new(chain).run(Context::new(request)).await }
            },
            async {
                let _ = tokio::signal::ctrl_c().await;
            },
        )
        .await?;

    Ok(())
}
