//! Axum REST API handlers: the beneficiary, verifier and donor gateways.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use relief_engine::queries::{
    donations_for_donor, funding_progress, incidents_by_status, incidents_for_actor,
    status_counts, status_counts_for_actor, total_donated_by_donor, total_funded, StatusCounts,
};
use relief_engine::{
    Amount, Donation, Incident, IncidentId, IncidentStatus, IncidentStore, MemoryStore,
    NewIncident, ReliefEngine, Severity,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db;
use crate::errors::{GatewayError, Result};
use crate::records::EventRecord;

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<ReliefEngine<MemoryStore>>,
    pub pool: SqlitePool,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/dashboard", get(dashboard))
        .route("/incidents", get(list_incidents).post(submit_incident))
        .route("/incidents/:id", get(get_incident))
        .route("/incidents/:id/verify", post(verify_incident))
        .route("/incidents/:id/donations", post(donate))
        .route("/incidents/:id/release", post(release_funds))
        .route("/incidents/:id/events", get(get_incident_events))
        .route("/donations", get(list_donations))
        .route("/donors/:id/donations", get(get_donor_donations))
        .route("/beneficiaries/:id/summary", get(get_beneficiary_summary))
        .route("/events", get(get_all_events))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitIncidentRequest {
    pub beneficiary_id: String,
    pub beneficiary_name: String,
    pub location: String,
    pub cause: String,
    pub description: String,
    pub severity: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub amount_needed: Amount,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub verifier_id: String,
    pub verifier_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DonateRequest {
    pub donor_id: String,
    pub donor_name: String,
    pub amount: Amount,
}

#[derive(Debug, Default, Deserialize)]
pub struct IncidentFilter {
    pub status: Option<String>,
    pub beneficiary: Option<String>,
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct IncidentView {
    #[serde(flatten)]
    pub incident: Incident,
    pub progress: f64,
}

impl From<Incident> for IncidentView {
    fn from(incident: Incident) -> Self {
        let progress = funding_progress(&incident);
        Self { incident, progress }
    }
}

#[derive(Serialize)]
pub struct IncidentsResponse {
    pub count: usize,
    pub incidents: Vec<IncidentView>,
}

#[derive(Serialize)]
pub struct DonationResponse {
    pub donation: Donation,
    pub incident: IncidentView,
}

#[derive(Serialize)]
pub struct DonationsResponse {
    pub count: usize,
    pub donations: Vec<Donation>,
}

#[derive(Serialize)]
pub struct DonorDonationsResponse {
    pub donor_id: String,
    pub count: usize,
    pub total: Amount,
    pub donations: Vec<Donation>,
}

#[derive(Serialize)]
pub struct BeneficiarySummaryResponse {
    pub beneficiary_id: String,
    pub counts: StatusCounts,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub counts: StatusCounts,
    pub total_funded: Amount,
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub incident_id: String,
    pub count: usize,
    pub events: Vec<EventRecord>,
}

#[derive(Serialize)]
pub struct AllEventsResponse {
    pub count: usize,
    pub events: Vec<EventRecord>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            GatewayError::Engine(e) => {
                let status = match e {
                    relief_engine::Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    relief_engine::Error::NotFound(_) => StatusCode::NOT_FOUND,
                    relief_engine::Error::InvalidState { .. } => StatusCode::CONFLICT,
                };
                (status, Some(e.code()))
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                code,
            }),
        )
            .into_response()
    }
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /dashboard`
///
/// Per-status incident counts across all beneficiaries, for verifiers.
pub async fn dashboard(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let store = state.engine.store();
    Json(DashboardResponse {
        counts: status_counts(store),
        total_funded: total_funded(store),
    })
}

/// `POST /incidents`
///
/// Beneficiary gateway: report a new incident.
pub async fn submit_incident(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<SubmitIncidentRequest>,
) -> Result<impl IntoResponse> {
    let severity: Severity = req.severity.parse()?;
    let incident = state.engine.submit_incident(NewIncident {
        beneficiary_id: req.beneficiary_id,
        beneficiary_name: req.beneficiary_name,
        location: req.location,
        cause: req.cause,
        description: req.description,
        severity,
        image_url: req.image_url.filter(|url| !url.trim().is_empty()),
        amount_needed: req.amount_needed,
    })?;
    Ok((StatusCode::CREATED, Json(IncidentView::from(incident))))
}

/// `GET /incidents?status=verified&beneficiary=ben-1`
///
/// Both filters are optional and combine with AND.
pub async fn list_incidents(
    State(state): State<Arc<ApiState>>,
    Query(filter): Query<IncidentFilter>,
) -> Result<impl IntoResponse> {
    let store = state.engine.store();
    let status = filter
        .status
        .as_deref()
        .map(str::parse::<IncidentStatus>)
        .transpose()?;

    let incidents = match (status, filter.beneficiary.as_deref()) {
        (Some(status), Some(actor)) => incidents_for_actor(store, actor)
            .into_iter()
            .filter(|i| i.status == status)
            .collect(),
        (Some(status), None) => incidents_by_status(store, status),
        (None, Some(actor)) => incidents_for_actor(store, actor),
        (None, None) => store.list_incidents(),
    };

    let incidents: Vec<IncidentView> = incidents.into_iter().map(IncidentView::from).collect();
    Ok(Json(IncidentsResponse {
        count: incidents.len(),
        incidents,
    }))
}

/// `GET /incidents/:id`
pub async fn get_incident(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = IncidentId::new(id);
    let incident = state
        .engine
        .store()
        .find_incident_by_id(&id)
        .ok_or(relief_engine::Error::NotFound(id))?;
    Ok(Json(IncidentView::from(incident)))
}

/// `POST /incidents/:id/verify`
///
/// Verifier gateway: approve a submitted incident.
pub async fn verify_incident(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse> {
    let incident =
        state
            .engine
            .verify_incident(&IncidentId::new(id), &req.verifier_id, &req.verifier_name)?;
    Ok(Json(IncidentView::from(incident)))
}

/// `POST /incidents/:id/donations`
///
/// Donor gateway: fund a verified incident.
pub async fn donate(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(req): Json<DonateRequest>,
) -> Result<impl IntoResponse> {
    let receipt = state.engine.apply_donation(
        &IncidentId::new(id),
        &req.donor_id,
        &req.donor_name,
        req.amount,
    )?;
    Ok((
        StatusCode::CREATED,
        Json(DonationResponse {
            donation: receipt.donation,
            incident: IncidentView::from(receipt.incident),
        }),
    ))
}

/// `POST /incidents/:id/release`
///
/// Verifier gateway: release the funds of a funded incident.
pub async fn release_funds(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let incident = state.engine.release_funds(&IncidentId::new(id))?;
    Ok(Json(IncidentView::from(incident)))
}

/// `GET /donations`
///
/// Every donation across all incidents, oldest first.
pub async fn list_donations(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let donations = state.engine.store().list_donations();
    Json(DonationsResponse {
        count: donations.len(),
        donations,
    })
}

/// `GET /donors/:id/donations`
pub async fn get_donor_donations(
    State(state): State<Arc<ApiState>>,
    Path(donor_id): Path<String>,
) -> impl IntoResponse {
    let store = state.engine.store();
    let donations = donations_for_donor(store, &donor_id);
    Json(DonorDonationsResponse {
        total: total_donated_by_donor(store, &donor_id),
        count: donations.len(),
        donor_id,
        donations,
    })
}

/// `GET /beneficiaries/:id/summary`
pub async fn get_beneficiary_summary(
    State(state): State<Arc<ApiState>>,
    Path(beneficiary_id): Path<String>,
) -> impl IntoResponse {
    Json(BeneficiarySummaryResponse {
        counts: status_counts_for_actor(state.engine.store(), &beneficiary_id),
        beneficiary_id,
    })
}

/// `GET /incidents/:id/events`
///
/// Returns all recorded lifecycle events for the given incident.
pub async fn get_incident_events(
    State(state): State<Arc<ApiState>>,
    Path(incident_id): Path<String>,
) -> Result<impl IntoResponse> {
    let events = db::get_events_for_incident(&state.pool, &incident_id).await?;
    Ok(Json(EventsResponse {
        count: events.len(),
        incident_id,
        events,
    }))
}

/// `GET /events`
///
/// Returns all recorded lifecycle events across all incidents.
pub async fn get_all_events(State(state): State<Arc<ApiState>>) -> Result<impl IntoResponse> {
    let events = db::get_all_events(&state.pool).await?;
    Ok(Json(AllEventsResponse {
        count: events.len(),
        events,
    }))
}
