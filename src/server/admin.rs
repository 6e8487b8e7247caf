//! HTTP admin surface
//!
//! Read-only JSON views of relay state plus an SSE feed of relay events.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio_stream::wrappers::BroadcastStream;

use crate::notify::EventHub;
use crate::relay::{HealthStatus, Relay};
use crate::stats::RelayStatsSnapshot;
use crate::store::DataPoint;

/// Shared state behind every admin route
#[derive(Clone)]
pub struct AdminState {
    relay: Arc<Relay>,
    events: Arc<EventHub>,
    shutdown: watch::Receiver<bool>,
}

impl AdminState {
    pub fn new(relay: Arc<Relay>, events: Arc<EventHub>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            relay,
            events,
            shutdown,
        }
    }
}

/// Build the admin router
pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/latest", get(latest))
        .route("/producers", get(producers))
        .route("/history", get(history))
        .route("/history/{producer_id}", get(producer_history))
        .route("/events", get(events))
        .with_state(state)
}

async fn health(State(state): State<AdminState>) -> Json<HealthStatus> {
    Json(state.relay.health())
}

async fn stats(State(state): State<AdminState>) -> Json<RelayStatsSnapshot> {
    Json(state.relay.stats().snapshot())
}

async fn latest(State(state): State<AdminState>) -> Json<HashMap<String, Decimal>> {
    Json(state.relay.latest_snapshot())
}

async fn producers(State(state): State<AdminState>) -> Json<Vec<String>> {
    let mut ids = state.relay.presence().producers();
    ids.sort_unstable();
    Json(ids)
}

async fn history(State(state): State<AdminState>) -> Json<HashMap<String, Vec<DataPoint>>> {
    Json(state.relay.history_snapshot())
}

async fn producer_history(
    State(state): State<AdminState>,
    Path(producer_id): Path<String>,
) -> Result<Json<Vec<DataPoint>>, StatusCode> {
    state
        .relay
        .store()
        .series(&producer_id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn events(
    State(state): State<AdminState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut shutdown = state.shutdown.clone();
    let stop = async move {
        let _ = shutdown.wait_for(|stopped| *stopped).await;
    };

    // Lagged subscribers skip what they missed
    let stream = BroadcastStream::new(state.events.subscribe())
        .filter_map(|msg| {
            futures_util::future::ready(msg.ok().map(|event| {
                let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".into());
                Ok(Event::default().data(data))
            }))
        })
        .take_until(stop);

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::notify::EventSink;
    use crate::registry::RegistryConfig;
    use crate::store::StoreConfig;

    fn state() -> (AdminState, watch::Sender<bool>) {
        let events = Arc::new(EventHub::new());
        let sink: Arc<dyn EventSink> = events.clone();
        let relay = Arc::new(Relay::with_config(
            RegistryConfig::default(),
            StoreConfig::default(),
            sink,
        ));
        let (tx, rx) = watch::channel(false);
        (AdminState::new(relay, events, rx), tx)
    }

    #[tokio::test]
    async fn test_health_body() {
        let (state, _tx) = state();
        let _conn = state.relay.registry().open("a");

        let Json(body) = health(State(state.clone())).await;
        assert_eq!(body.status, "healthy");
        assert_eq!(body.connected_peer_count, 1);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["server_instance_id"], state.relay.instance_id());
    }

    #[tokio::test]
    async fn test_latest_and_history() {
        let (state, _tx) = state();
        let store = state.relay.store();
        store.update("p1", Decimal::from_str("0.1").unwrap()).unwrap();
        store.update("p1", Decimal::from_str("0.2").unwrap()).unwrap();

        let Json(latest_body) = latest(State(state.clone())).await;
        assert_eq!(latest_body["p1"], Decimal::from_str("0.2").unwrap());

        let Json(history_body) = history(State(state.clone())).await;
        assert_eq!(history_body["p1"].len(), 2);

        // Decimals serialize as strings
        let json = serde_json::to_value(&latest_body).unwrap();
        assert_eq!(json["p1"], "0.2");
    }

    #[tokio::test]
    async fn test_producers_sorted() {
        let (state, _tx) = state();
        let Json(empty) = producers(State(state.clone())).await;
        assert!(empty.is_empty());

        let (conn, _rx) = state.relay.registry().open("a");
        state.relay.presence().observe_first_message("zeta", conn);
        state.relay.presence().observe_first_message("alpha", conn);

        let Json(ids) = producers(State(state)).await;
        assert_eq!(ids, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[tokio::test]
    async fn test_producer_history_not_found() {
        let (state, _tx) = state();

        let result = producer_history(State(state.clone()), Path("ghost".to_string())).await;
        assert_eq!(result.err(), Some(StatusCode::NOT_FOUND));

        state.relay.store().update("p1", Decimal::ONE).unwrap();
        let Json(points) = producer_history(State(state), Path("p1".to_string()))
            .await
            .unwrap();
        assert_eq!(points.len(), 1);
    }

    #[tokio::test]
    async fn test_events_subscribes() {
        let (state, _tx) = state();
        assert_eq!(state.events.subscriber_count(), 0);

        let _sse = events(State(state.clone())).await;
        assert_eq!(state.events.subscriber_count(), 1);
    }
}
