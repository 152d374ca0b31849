//! Route handlers.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use monitor_core::{now_ms, EscrowAccount, EscrowKind, MonitorError};

use crate::error::ApiError;
use crate::state::AppState;

type ApiResult = Result<Response, ApiError>;

const DEFAULT_PAGE_LIMIT: usize = 100;
const MAX_PAGE_LIMIT: i64 = 1000;

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": "ok",
        "trackedAssets": state.config.tracked_assets.len(),
        "trackedEscrows": state.registry.len(),
        "sync": {
            "isRunning": state.sync_task.is_running(),
            "syncInterval": state.sync_task.period().as_millis() as u64,
        },
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterEscrowRequest {
    #[serde(default)]
    pub address: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub pool_address: String,
    #[serde(default)]
    pub collateral_token: String,
    #[serde(default)]
    pub debt_token: String,
    /// Escrow contract instance handed to the note provider
    #[serde(default)]
    pub instance: String,
    /// Decryption key for the account's private state; never logged
    #[serde(default)]
    pub secret_key: String,
}

/// `POST /escrows`
pub async fn register_escrow(
    State(state): State<AppState>,
    Json(req): Json<RegisterEscrowRequest>,
) -> ApiResult {
    let kind = match req.kind.as_str() {
        "lending" => EscrowKind::Lending,
        "stable" => EscrowKind::Stable,
        other => {
            return Err(MonitorError::validation(format!(
                "type must be \"lending\" or \"stable\", got {:?}",
                other
            ))
            .into())
        }
    };

    for (field, value) in [
        ("address", &req.address),
        ("poolAddress", &req.pool_address),
        ("collateralToken", &req.collateral_token),
        ("debtToken", &req.debt_token),
        ("instance", &req.instance),
        ("secretKey", &req.secret_key),
    ] {
        if value.trim().is_empty() {
            return Err(MonitorError::validation(format!("{} must not be empty", field)).into());
        }
    }

    let escrow = EscrowAccount {
        address: req.address.clone(),
        kind,
        pool_address: req.pool_address,
        collateral_token: req.collateral_token,
        debt_token: req.debt_token,
        registered_at_ms: now_ms(),
    };

    state.registry.register(escrow.clone())?;
    info!(address = %escrow.address, "Escrow registered via API");

    // Kick off the first sync; a transient failure here just waits for the
    // next scheduled cycle.
    let sync = state.sync.clone();
    let address = req.address.clone();
    tokio::spawn(async move {
        if let Err(e) = sync.sync_one(&address).await {
            warn!(escrow = %address, error = %e, "Initial sync failed");
        }
    });

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "escrow": escrow })),
    )
        .into_response())
}

/// `GET /escrows`
pub async fn list_escrows(State(state): State<AppState>) -> Response {
    let escrows = state.registry.all();
    Json(json!({ "total": escrows.len(), "escrows": escrows })).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    /// Strict bounds: limit in [1, 1000], offset >= 0.
    fn validate(&self) -> Result<(usize, usize), MonitorError> {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT as i64);
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(MonitorError::validation(format!(
                "limit must be between 1 and {}, got {}",
                MAX_PAGE_LIMIT, limit
            )));
        }

        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err(MonitorError::validation(format!(
                "offset must be non-negative, got {}",
                offset
            )));
        }

        Ok((limit as usize, offset as usize))
    }
}

/// `GET /positions`
pub async fn list_positions(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> ApiResult {
    let (limit, offset) = page.validate()?;
    let all = state.positions.all();
    let total = all.len();
    let positions: Vec<_> = all.into_iter().skip(offset).take(limit).collect();

    Ok(Json(json!({
        "positions": positions,
        "total": total,
        "limit": limit,
        "offset": offset,
    }))
    .into_response())
}

/// `GET /positions/by-collateral/:asset`
pub async fn positions_by_collateral(
    State(state): State<AppState>,
    Path(asset): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult {
    let (limit, offset) = page.validate()?;
    let positions = state.positions.by_collateral(&asset, limit, offset);

    Ok(Json(json!({
        "positions": positions,
        "total": positions.len(),
        "limit": limit,
        "offset": offset,
    }))
    .into_response())
}

/// `GET /positions/:escrow_address`
pub async fn get_position(
    State(state): State<AppState>,
    Path(escrow_address): Path<String>,
) -> ApiResult {
    let position = state.positions.get(&escrow_address).ok_or_else(|| {
        MonitorError::not_found(format!("no position for escrow {}", escrow_address))
    })?;

    Ok(Json(json!({ "position": position })).into_response())
}

/// `POST /sync/:escrow_address`
///
/// A transient sync failure is logged, not surfaced: the next scheduled cycle
/// retries, and the caller learns the refresh did not land via `synced: false`.
pub async fn force_sync(
    State(state): State<AppState>,
    Path(escrow_address): Path<String>,
) -> ApiResult {
    let synced = match state.sync.force_sync_escrow(&escrow_address).await {
        Ok(()) => true,
        Err(e @ MonitorError::NotFound(_)) => return Err(e.into()),
        Err(e) => {
            warn!(escrow = %escrow_address, error = %e, "Forced sync failed");
            false
        }
    };

    Ok(Json(json!({
        "success": true,
        "synced": synced,
        "position": state.positions.get(&escrow_address),
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdateRequest {
    pub asset: Option<String>,
    pub new_price: Option<f64>,
    pub timestamp: Option<u64>,
}

/// `POST /price-update` (authenticated)
pub async fn price_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PriceUpdateRequest>,
) -> ApiResult {
    require_api_key(&headers, &state)?;

    let asset = req
        .asset
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| MonitorError::validation("asset is required"))?;
    let new_price = req
        .new_price
        .ok_or_else(|| MonitorError::validation("newPrice is required"))?;

    state
        .price_monitor
        .apply_external_update(&asset, new_price, req.timestamp)
        .await?;

    Ok(Json(json!({ "success": true })).into_response())
}

/// `GET /prices`
pub async fn prices(State(state): State<AppState>) -> Response {
    let prices: serde_json::Map<String, serde_json::Value> = state
        .prices
        .snapshot()
        .into_iter()
        .map(|p| (p.symbol.clone(), json!(p)))
        .collect();

    Json(json!({
        "prices": prices,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
    .into_response()
}

/// Inter-service authentication. An empty configured key disables the check
/// (local development against mocks).
fn require_api_key(headers: &HeaderMap, state: &AppState) -> Result<(), MonitorError> {
    if state.config.api_key.is_empty() {
        return Ok(());
    }

    match headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        Some(key) if key == state.config.api_key => Ok(()),
        Some(_) => Err(MonitorError::unauthorized("invalid API key")),
        None => Err(MonitorError::unauthorized("missing X-API-Key header")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use monitor_core::{
        EngineHandle, EscrowRegistry, MonitorConfig, PositionStore, PositionSyncService,
        PriceMonitor, PriceStore, ScheduledTask,
    };
    use monitor_ledger::mock::{MockNoteProvider, MockOracle, MockPriceSource};
    use monitor_ledger::Note;
    use tokio::sync::mpsc;

    fn test_state(api_key: &str) -> (AppState, Arc<MockNoteProvider>) {
        let config = Arc::new(MonitorConfig {
            api_key: api_key.to_string(),
            ..MonitorConfig::default()
        });
        let registry = Arc::new(EscrowRegistry::new(config.max_tracked_escrows));
        let positions = Arc::new(PositionStore::new());
        let prices = Arc::new(PriceStore::new());
        let notes = Arc::new(MockNoteProvider::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = EngineHandle::from_sender(tx);

        let price_monitor = Arc::new(PriceMonitor::new(
            Arc::new(MockPriceSource::new(HashMap::from([
                ("ETH".to_string(), 3000.0),
                ("USDC".to_string(), 1.0),
                ("DAI".to_string(), 1.0),
            ]))),
            Arc::new(MockOracle::new()),
            prices.clone(),
            handle.clone(),
            &config,
        ));
        let sync = Arc::new(PositionSyncService::new(
            notes.clone(),
            registry.clone(),
            positions.clone(),
            handle,
        ));
        let sync_task = Arc::new(ScheduledTask::spawn(
            "test-sync",
            Duration::from_secs(3600),
            || async {},
        ));

        (
            AppState {
                config,
                registry,
                positions,
                prices,
                price_monitor,
                sync,
                sync_task,
            },
            notes,
        )
    }

    fn register_request(address: &str) -> RegisterEscrowRequest {
        RegisterEscrowRequest {
            address: address.to_string(),
            kind: "lending".to_string(),
            pool_address: "0xpool".to_string(),
            collateral_token: "ETH".to_string(),
            debt_token: "USDC".to_string(),
            instance: "instance-data".to_string(),
            secret_key: "0xsecret".to_string(),
        }
    }

    fn status_of(result: ApiResult) -> StatusCode {
        match result {
            Ok(response) => response.status(),
            Err(err) => err.into_response().status(),
        }
    }

    #[tokio::test]
    async fn register_then_conflict() {
        let (state, _notes) = test_state("");

        let created = register_escrow(State(state.clone()), Json(register_request("0xa"))).await;
        assert_eq!(status_of(created), StatusCode::CREATED);

        let dup = register_escrow(State(state.clone()), Json(register_request("0xa"))).await;
        assert_eq!(status_of(dup), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn register_validates_fields() {
        let (state, _notes) = test_state("");

        let mut bad_type = register_request("0xa");
        bad_type.kind = "margin".to_string();
        assert_eq!(
            status_of(register_escrow(State(state.clone()), Json(bad_type)).await),
            StatusCode::BAD_REQUEST
        );

        let mut empty_addr = register_request("");
        empty_addr.address = String::new();
        assert_eq!(
            status_of(register_escrow(State(state), Json(empty_addr)).await),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn unknown_position_is_404() {
        let (state, _notes) = test_state("");
        let result = get_position(State(state), Path("0xmissing".to_string())).await;
        assert_eq!(status_of(result), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn by_collateral_validates_pagination() {
        let (state, _notes) = test_state("");

        let bad_limit = positions_by_collateral(
            State(state.clone()),
            Path("ETH".to_string()),
            Query(PageQuery { limit: Some(0), offset: None }),
        )
        .await;
        assert_eq!(status_of(bad_limit), StatusCode::BAD_REQUEST);

        let bad_offset = positions_by_collateral(
            State(state.clone()),
            Path("ETH".to_string()),
            Query(PageQuery { limit: None, offset: Some(-1) }),
        )
        .await;
        assert_eq!(status_of(bad_offset), StatusCode::BAD_REQUEST);

        let ok = positions_by_collateral(
            State(state),
            Path("ETH".to_string()),
            Query(PageQuery { limit: Some(1000), offset: Some(0) }),
        )
        .await;
        assert_eq!(status_of(ok), StatusCode::OK);
    }

    #[tokio::test]
    async fn force_sync_unregistered_is_404() {
        let (state, _notes) = test_state("");
        let result = force_sync(State(state), Path("0xmissing".to_string())).await;
        assert_eq!(status_of(result), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn force_sync_swallows_transient_failure() {
        let (state, notes) = test_state("");
        register_escrow(State(state.clone()), Json(register_request("0xa")))
            .await
            .unwrap();
        notes.fail_account("0xa");

        let result = force_sync(State(state), Path("0xa".to_string())).await;
        assert_eq!(status_of(result), StatusCode::OK);
    }

    #[tokio::test]
    async fn force_sync_refreshes_position() {
        let (state, notes) = test_state("");
        register_escrow(State(state.clone()), Json(register_request("0xa")))
            .await
            .unwrap();
        notes.push_note(Note {
            escrow_address: "0xa".into(),
            collateral_asset: "ETH".into(),
            collateral_amount: 5.0,
            debt_asset: "USDC".into(),
            debt_amount: 100.0,
            pool_id: "pool-1".into(),
            created_at_ms: 1,
        });

        let result = force_sync(State(state.clone()), Path("0xa".to_string())).await;
        assert_eq!(status_of(result), StatusCode::OK);
        assert_eq!(state.positions.get("0xa").unwrap().collateral_amount, 5.0);
    }

    #[tokio::test]
    async fn price_update_requires_api_key() {
        let (state, _notes) = test_state("sekrit");

        let body = PriceUpdateRequest {
            asset: Some("ETH".into()),
            new_price: Some(3000.0),
            timestamp: None,
        };

        let no_key =
            price_update(State(state.clone()), HeaderMap::new(), Json(body)).await;
        assert_eq!(status_of(no_key), StatusCode::UNAUTHORIZED);

        let mut wrong = HeaderMap::new();
        wrong.insert("x-api-key", "nope".parse().unwrap());
        let wrong_key = price_update(
            State(state.clone()),
            wrong,
            Json(PriceUpdateRequest {
                asset: Some("ETH".into()),
                new_price: Some(3000.0),
                timestamp: None,
            }),
        )
        .await;
        assert_eq!(status_of(wrong_key), StatusCode::UNAUTHORIZED);

        let mut good = HeaderMap::new();
        good.insert("x-api-key", "sekrit".parse().unwrap());
        let accepted = price_update(
            State(state.clone()),
            good,
            Json(PriceUpdateRequest {
                asset: Some("ETH".into()),
                new_price: Some(3000.0),
                timestamp: None,
            }),
        )
        .await;
        assert_eq!(status_of(accepted), StatusCode::OK);
        assert_eq!(state.prices.get("ETH").unwrap().price, 3000.0);
    }

    #[tokio::test]
    async fn price_update_validates_body() {
        let (state, _notes) = test_state("");

        let missing_asset = price_update(
            State(state.clone()),
            HeaderMap::new(),
            Json(PriceUpdateRequest { asset: None, new_price: Some(1.0), timestamp: None }),
        )
        .await;
        assert_eq!(status_of(missing_asset), StatusCode::BAD_REQUEST);

        let bad_price = price_update(
            State(state),
            HeaderMap::new(),
            Json(PriceUpdateRequest {
                asset: Some("ETH".into()),
                new_price: Some(-5.0),
                timestamp: None,
            }),
        )
        .await;
        assert_eq!(status_of(bad_price), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let (state, _notes) = test_state("");
        register_escrow(State(state.clone()), Json(register_request("0xa")))
            .await
            .unwrap();

        let response = health(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
