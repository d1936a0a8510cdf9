//! API Routes
//!
//! HTTP endpoint definitions. Routes only translate requests into handler
//! calls; all rules live in the handlers and the store.

use std::str::FromStr;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Account, Amount, BalanceForecast, Credit, DomainError, LedgerEntry, PeriodTotals,
    ScheduleEntry,
};
use crate::error::AppError;
use crate::handlers::{
    load_owned_account, AccountHandler, CreditHandler, DepositCommand, DepositHandler,
    IssueCreditCommand, PredictBalanceHandler, PredictBalanceQuery, TransferCommand,
    TransferHandler, TransferResult, WithdrawCommand, WithdrawHandler,
};
use crate::jobs::CycleReport;
use crate::transaction_log::TransactionLog;

use super::middleware::RequestUser;
use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

/// Money arrives as a decimal string to avoid float rounding in JSON
#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub account_id: Uuid,
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct IssueCreditRequest {
    pub account_id: Uuid,
    pub principal: String,
    /// Percent per year
    pub annual_rate: String,
    pub term_months: u32,
}

#[derive(Debug, Serialize)]
pub struct IssueCreditResponse {
    pub credit: Credit,
    pub schedule: Vec<ScheduleEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    #[serde(default = "default_horizon")]
    pub days: u32,
}

fn default_horizon() -> u32 {
    30
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Accounts
        .route("/accounts", post(open_account).get(list_accounts))
        .route("/accounts/deposit", post(deposit))
        .route("/accounts/withdraw", post(withdraw))
        .route("/accounts/:account_id/entries", get(account_entries))
        .route("/accounts/:account_id/forecast", get(forecast))
        // Transfers
        .route("/transfers", post(transfer))
        // Credits
        .route("/credits", post(issue_credit))
        .route("/credits/:credit_id/schedule", get(credit_schedule))
        // Analytics
        .route("/analytics/monthly", get(monthly_summary))
        // Admin
        .route("/admin/collections/run", post(run_collections))
}

fn parse_amount(field: &str, value: &str) -> Result<Decimal, AppError> {
    let amount = Amount::from_str(value)
        .map_err(|e| DomainError::invalid(format!("{}: {}", field, e)))?;
    Ok(amount.value())
}

fn parse_rate(value: &str) -> Result<Decimal, AppError> {
    Decimal::from_str(value)
        .map_err(|e| AppError::InvalidRequest(format!("annual_rate: {}", e)))
}

// =========================================================================
// Accounts
// =========================================================================

async fn open_account(
    State(state): State<AppState>,
    Extension(user): Extension<RequestUser>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let account = AccountHandler::new(state.store).open(user.user_id).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn list_accounts(
    State(state): State<AppState>,
    Extension(user): Extension<RequestUser>,
) -> Result<Json<Vec<Account>>, AppError> {
    let accounts = AccountHandler::new(state.store).list(user.user_id).await?;
    Ok(Json(accounts))
}

async fn deposit(
    State(state): State<AppState>,
    Json(request): Json<MovementRequest>,
) -> Result<(StatusCode, Json<LedgerEntry>), AppError> {
    let amount = parse_amount("amount", &request.amount)?;
    let entry = DepositHandler::new(state.store)
        .execute(DepositCommand::new(request.account_id, amount))
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn withdraw(
    State(state): State<AppState>,
    Extension(user): Extension<RequestUser>,
    Json(request): Json<MovementRequest>,
) -> Result<(StatusCode, Json<LedgerEntry>), AppError> {
    let amount = parse_amount("amount", &request.amount)?;
    let entry = WithdrawHandler::new(state.store)
        .execute(WithdrawCommand::new(request.account_id, user.user_id, amount))
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn account_entries(
    State(state): State<AppState>,
    Extension(user): Extension<RequestUser>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    let entries = TransactionLog::new(state.store, state.clock)
        .entries_for_account(account_id, user.user_id)
        .await?;
    Ok(Json(entries))
}

async fn forecast(
    State(state): State<AppState>,
    Extension(user): Extension<RequestUser>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<BalanceForecast>, AppError> {
    let forecast = PredictBalanceHandler::new(state.store, state.clock)
        .execute(PredictBalanceQuery::new(account_id, user.user_id, query.days))
        .await?;
    Ok(Json(forecast))
}

// =========================================================================
// Transfers
// =========================================================================

async fn transfer(
    State(state): State<AppState>,
    Extension(user): Extension<RequestUser>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransferResult>), AppError> {
    let amount = parse_amount("amount", &request.amount)?;
    let result = TransferHandler::new(state.store)
        .execute(TransferCommand::new(
            request.from_account_id,
            request.to_account_id,
            user.user_id,
            amount,
        ))
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

// =========================================================================
// Credits
// =========================================================================

async fn issue_credit(
    State(state): State<AppState>,
    Extension(user): Extension<RequestUser>,
    Json(request): Json<IssueCreditRequest>,
) -> Result<(StatusCode, Json<IssueCreditResponse>), AppError> {
    let principal = parse_amount("principal", &request.principal)?;
    let annual_rate = parse_rate(&request.annual_rate)?;

    load_owned_account(state.store.as_ref(), request.account_id, user.user_id).await?;

    let issued = CreditHandler::new(state.store, state.clock)
        .issue(IssueCreditCommand::new(
            request.account_id,
            principal,
            annual_rate,
            request.term_months,
        ))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IssueCreditResponse {
            credit: issued.credit,
            schedule: issued.schedule,
        }),
    ))
}

async fn credit_schedule(
    State(state): State<AppState>,
    Extension(user): Extension<RequestUser>,
    Path(credit_id): Path<Uuid>,
) -> Result<Json<Vec<ScheduleEntry>>, AppError> {
    let schedule = CreditHandler::new(state.store, state.clock)
        .schedule_for_owner(credit_id, user.user_id)
        .await?;
    Ok(Json(schedule))
}

// =========================================================================
// Analytics
// =========================================================================

async fn monthly_summary(
    State(state): State<AppState>,
    Extension(user): Extension<RequestUser>,
) -> Result<Json<PeriodTotals>, AppError> {
    let totals = TransactionLog::new(state.store, state.clock)
        .monthly_summary(user.user_id)
        .await?;
    Ok(Json(totals))
}

// =========================================================================
// Admin
// =========================================================================

/// Run one collections cycle now, outside the timer (admins only).
///
/// The cycle settles and penalizes installments on every account, so the
/// caller must be listed in `ADMIN_USER_IDS`.
async fn run_collections(
    State(state): State<AppState>,
    Extension(user): Extension<RequestUser>,
) -> Result<Json<CycleReport>, AppError> {
    if !state.is_admin(user.user_id) {
        tracing::warn!(
            user_id = %user.user_id,
            correlation_id = %user.correlation_id,
            "Collections cycle refused: not an admin"
        );
        return Err(AppError::Forbidden("admin permission required".to_string()));
    }

    tracing::info!(
        requested_by = %user.user_id,
        correlation_id = %user.correlation_id,
        "Manual collections cycle requested"
    );
    Ok(Json(state.collections.run_cycle().await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transfer_request_deserialize() {
        let json = r#"{
            "from_account_id": "550e8400-e29b-41d4-a716-446655440001",
            "to_account_id": "550e8400-e29b-41d4-a716-446655440002",
            "amount": "100.50"
        }"#;

        let request: TransferRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.amount, "100.50");
    }

    #[test]
    fn test_forecast_query_defaults() {
        let query: ForecastQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.days, 30);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("amount", "12.50").unwrap(), dec!(12.50));
        assert!(parse_amount("amount", "12.505").is_err());
        assert!(parse_amount("amount", "-1").is_err());
        assert!(parse_amount("amount", "abc").is_err());
    }
}
