use axum::{
    Router,
    extract::Request,
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Error as HeaderError, Header},
};
use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;

use std::sync::Arc;

use crate::{budgets, categories, expenses, reports};
use engine::Engine;

static USER_HEADER: HeaderName = HeaderName::from_static("x-user-id");

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    /// Zone expense dates and "today" are expressed in.
    pub timezone: Tz,
}

impl ServerState {
    /// Current wall-clock time in the configured zone.
    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.timezone).naive_local()
    }
}

/// Caller identity, set by [`auth`] on every routed request.
#[derive(Clone, Debug)]
pub struct UserId(pub String);

/// `TypedHeader` for the identity header.
///
/// Requests must carry a non-blank "x-user-id" entry.
#[derive(Debug)]
struct UserHeader(String);

impl Header for UserHeader {
    fn name() -> &'static HeaderName {
        &USER_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, HeaderError>
    where
        Self: Sized,
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(HeaderError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(HeaderError::invalid());
        };
        let value = value.trim();
        if value.is_empty() {
            return Err(HeaderError::invalid());
        }

        Ok(UserHeader(value.to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        match HeaderValue::from_str(&self.0) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode x-user-id header"),
        }
    }
}

async fn auth(
    user_header: Option<TypedHeader<UserHeader>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(TypedHeader(UserHeader(user_id))) = user_header else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(UserId(user_id));
    Ok(next.run(request).await)
}

pub(crate) fn router(state: ServerState) -> Router {
    Router::new()
        .route("/categories", get(categories::list))
        .route("/expenses", get(expenses::list).post(expenses::create))
        .route(
            "/expenses/{id}",
            get(expenses::get)
                .patch(expenses::update)
                .delete(expenses::delete),
        )
        .route("/budgets", get(budgets::list).post(budgets::create))
        .route(
            "/budgets/{id}",
            get(budgets::get)
                .patch(budgets::update)
                .delete(budgets::delete),
        )
        .route("/budgets/{id}/top-up", post(budgets::top_up))
        .route("/dashboard", get(reports::dashboard))
        .route("/calendar", get(reports::calendar))
        .route("/reports/summary", get(reports::summary))
        .route("/reports/monthly", get(reports::monthly))
        .route("/reports/export.csv", get(reports::export_csv))
        .route_layer(middleware::from_fn(auth))
        .with_state(state)
}

pub async fn run(engine: Arc<Engine>, timezone: Tz, address: &str) {
    let listener = match tokio::net::TcpListener::bind(address).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener on {address}: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, timezone, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Arc<Engine>,
    timezone: Tz,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState { engine, timezone };

    axum::serve(listener, router(state)).await
}
