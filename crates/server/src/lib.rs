use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{ServerState, UserId, run, run_with_listener};

mod budgets;
mod categories;
mod expenses;
mod reports;
mod server;

pub mod types {
    pub mod category {
        pub use api_types::category::{CategoryListResponse, CategoryView};
    }

    pub mod expense {
        pub use api_types::expense::{
            AllocationOutcome, ExpenseCreated, ExpenseListResponse, ExpenseNew, ExpenseQuery,
            ExpenseUpdate, ExpenseView,
        };
    }

    pub mod budget {
        pub use api_types::budget::{
            BudgetListResponse, BudgetNew, BudgetQuery, BudgetSaved, BudgetUpdate, BudgetView,
            TopUpNew, TopUpResult,
        };
    }

    pub mod report {
        pub use api_types::report::{CalendarQuery, ExportQuery, RangeQuery};
        pub use engine::{
            Calendar, CalendarCategory, CalendarDay, CategoryTotal, DashboardSummary,
            MonthlyTotal, PeriodSummary,
        };
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_) | EngineError::Conflict(_) => StatusCode::CONFLICT,
        EngineError::Database(_) | EngineError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::InvalidAmount(_) | EngineError::InvalidPeriod(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        EngineError::Export(export_err) => {
            tracing::error!("export error: {export_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
