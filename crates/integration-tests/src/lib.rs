//! Integration tests for Cartwright.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartwright-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_scenarios` - Stock reconciliation and cart mutations end to end
//! - `multi_tab` - Tabs sharing one profile, including read-modify-write races
//! - `checkout_flow` - Checkout across an interleaved login
//! - `http_api` - The HTTP client against a local stub server
//!
//! Nothing here needs network access: remote endpoints are either in-memory
//! fakes or a stub server bound to `127.0.0.1`.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{MethodFilter, on};
use cartwright_core::OrderPayload;
use cartwright_engine::api::{
    ApiError, CatalogApi, Credentials, LoginApi, LoginResponse, OrderApi, OrderReceipt,
};
use cartwright_engine::catalog::{CatalogProduct, CatalogQuery, filter_by_name};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// A camelCase catalog record priced at 10.
#[must_use]
pub fn product(id: &str, stock: i64) -> CatalogProduct {
    CatalogProduct::new(json!({
        "id": id,
        "name": format!("Product {id}"),
        "price": 10,
        "stock": stock,
    }))
}

// =============================================================================
// In-memory endpoints
// =============================================================================

/// Catalog serving a fixed product list, paged and searchable.
pub struct FakeCatalog {
    products: Vec<CatalogProduct>,
    calls: AtomicUsize,
}

impl FakeCatalog {
    #[must_use]
    pub const fn new(products: Vec<CatalogProduct>) -> Self {
        Self {
            products,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CatalogApi for FakeCatalog {
    fn list_products(
        &self,
        query: &CatalogQuery,
    ) -> impl Future<Output = Result<Vec<CatalogProduct>, ApiError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let matching = filter_by_name(&self.products, query.search.as_deref().unwrap_or(""));
        let size = query.page_size as usize;
        let skip = (query.page_number.max(1) as usize - 1) * size;
        let page: Vec<CatalogProduct> = matching.into_iter().skip(skip).take(size).cloned().collect();
        async move { Ok(page) }
    }
}

/// Order endpoint recording every payload it receives.
#[derive(Default)]
pub struct FakeOrders {
    failing: AtomicBool,
    received: Mutex<Vec<OrderPayload>>,
}

impl FakeOrders {
    /// Make subsequent orders fail (`true`) or succeed (`false`).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn received(&self) -> Vec<OrderPayload> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl OrderApi for FakeOrders {
    fn create_order(
        &self,
        payload: &OrderPayload,
    ) -> impl Future<Output = Result<OrderReceipt, ApiError>> + Send {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload.clone());
        let result = if self.failing.load(Ordering::SeqCst) {
            Err(ApiError::Status {
                status: 503,
                message: "orders unavailable".to_string(),
            })
        } else {
            Ok(OrderReceipt::new(json!({"orderId": 1})))
        };
        async move { result }
    }
}

/// Login endpoint answering with a fixed body. The password `wrong` is
/// refused.
pub struct FakeLogin {
    body: Value,
}

impl FakeLogin {
    #[must_use]
    pub const fn new(body: Value) -> Self {
        Self { body }
    }
}

impl LoginApi for FakeLogin {
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<LoginResponse, ApiError>> + Send {
        let result = if credentials.username.is_empty() {
            Err(ApiError::Rejected("username required".to_string()))
        } else if credentials_are_wrong(credentials) {
            Err(ApiError::Unauthorized)
        } else {
            Ok(LoginResponse::from_json(&self.body))
        };
        async move {
            tokio::task::yield_now().await;
            result
        }
    }
}

fn credentials_are_wrong(credentials: &Credentials) -> bool {
    credentials.password.expose_secret() == "wrong"
}

// =============================================================================
// Stub HTTP server
// =============================================================================

/// One request as the stub server saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path plus query string.
    pub target: String,
    pub authorization: Option<String>,
    pub body: String,
}

type Recorded = Arc<Mutex<Vec<RecordedRequest>>>;

/// Local axum server answering canned JSON responses per route.
///
/// Unknown routes get a 404 with an empty body. Every request is recorded,
/// matched or not.
pub struct StubServer {
    url: Url,
    requests: Recorded,
    task: JoinHandle<()>,
}

impl StubServer {
    /// Bind to an ephemeral local port and start serving.
    ///
    /// `routes` are `(method, path, status, body)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound or a route names an
    /// unknown method or status.
    pub async fn start(routes: &[(&'static str, &'static str, u16, Value)]) -> std::io::Result<Self> {
        let requests: Recorded = Arc::new(Mutex::new(Vec::new()));

        let mut router = Router::new();
        for (method, path, status, body) in routes {
            let filter = Method::from_bytes(method.as_bytes())
                .map_err(std::io::Error::other)
                .and_then(|m| MethodFilter::try_from(m).map_err(std::io::Error::other))?;
            let status = StatusCode::from_u16(*status).map_err(std::io::Error::other)?;
            let body = body.to_string();
            router = router.route(
                path,
                on(filter, move || {
                    let body = body.clone();
                    async move { (status, [(header::CONTENT_TYPE, "application/json")], body) }
                }),
            );
        }
        let router = router
            .fallback(|| async { StatusCode::NOT_FOUND })
            .layer(middleware::from_fn_with_state(Arc::clone(&requests), record));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let url = Url::parse(&format!("http://{addr}/")).map_err(std::io::Error::other)?;
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self {
            url,
            requests,
            task,
        })
    }

    /// Base URL of the server.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Requests received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Buffer the body, record the request, then hand it on unchanged.
async fn record(
    State(recorded): State<Recorded>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    recorded
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(RecordedRequest {
            method: parts.method.to_string(),
            target: parts
                .uri
                .path_and_query()
                .map_or_else(|| parts.uri.path().to_string(), ToString::to_string),
            authorization: parts
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
