use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use ledger_core::{AmountResponse, Blockchain, ChainResponse, Transaction, TransactionRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<Blockchain>,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

fn message(status: StatusCode, text: &str) -> (StatusCode, Json<Message>) {
    (
        status,
        Json(Message {
            message: text.to_string(),
        }),
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<Transaction>,
    pub length: usize,
}

#[derive(Deserialize)]
struct AmountQuery {
    blockchain_address: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/chain", get(chain))
        .route(
            "/transactions",
            get(transactions)
                .post(create_transaction)
                .put(relay_transaction)
                .delete(clear_transactions),
        )
        .route("/mine", get(mine))
        .route("/consensus", put(consensus))
        .route("/amount", get(amount))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn chain(State(state): State<AppState>) -> Json<ChainResponse> {
    Json(ChainResponse {
        chain: state.chain.chain().as_ref().clone(),
    })
}

async fn transactions(State(state): State<AppState>) -> Json<TransactionsResponse> {
    let transactions = state.chain.transactions().await;
    Json(TransactionsResponse {
        length: transactions.len(),
        transactions,
    })
}

/// Client submission: admit and relay to peers.
async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<TransactionRequest>,
) -> (StatusCode, Json<Message>) {
    if state.chain.submit_transaction(&request).await {
        message(StatusCode::CREATED, "success")
    } else {
        message(StatusCode::BAD_REQUEST, "fail")
    }
}

/// Peer relay: admit only.
async fn relay_transaction(
    State(state): State<AppState>,
    Json(request): Json<TransactionRequest>,
) -> (StatusCode, Json<Message>) {
    if state.chain.receive_transaction(&request).await {
        message(StatusCode::OK, "success")
    } else {
        message(StatusCode::BAD_REQUEST, "fail")
    }
}

async fn clear_transactions(State(state): State<AppState>) -> (StatusCode, Json<Message>) {
    state.chain.clear_transactions().await;
    message(StatusCode::OK, "success")
}

async fn mine(State(state): State<AppState>) -> (StatusCode, Json<Message>) {
    match state.chain.mine().await {
        Some(_) => message(StatusCode::OK, "success"),
        None => message(StatusCode::BAD_REQUEST, "fail"),
    }
}

/// Fire-and-forget for the caller: resolution runs in the background.
async fn consensus(State(state): State<AppState>) -> (StatusCode, Json<Message>) {
    let chain = state.chain.clone();
    tokio::spawn(async move {
        let replaced = chain.resolve_conflicts().await;
        info!(replaced, "consensus requested by peer");
    });
    message(StatusCode::OK, "success")
}

async fn amount(
    State(state): State<AppState>,
    Query(query): Query<AmountQuery>,
) -> Json<AmountResponse> {
    Json(AmountResponse {
        amount: state.chain.amount(&query.blockchain_address),
    })
}
