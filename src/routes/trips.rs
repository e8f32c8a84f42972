use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use lettre::Address;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    dates::deserialize_coerced,
    error::AppError,
    extract::{ApiJson, ApiPath},
    models::{participant::ParticipantFilter, trip::NewTrip},
    state::AppState,
    store,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips", get(trips_list).post(create_trip))
        .route("/trips/:trip_id", get(trip_detail))
        .route("/trips/:trip_id/confirm", get(confirm_trip))
}

#[derive(Debug, Deserialize)]
pub struct CreateTripRequest {
    destination: String,
    #[serde(deserialize_with = "deserialize_coerced")]
    starts_at: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_coerced")]
    ends_at: DateTime<Utc>,
    owner_name: String,
    owner_email: String,
    emails_to_invite: Vec<String>,
}

impl CreateTripRequest {
    fn validate(self) -> Result<NewTrip, AppError> {
        if self.destination.chars().count() < 4 {
            return Err(AppError::InvalidInput(
                "destination must be at least 4 characters long".into(),
            ));
        }
        let owner_email = parse_email("owner_email", &self.owner_email)?;
        let emails_to_invite = self
            .emails_to_invite
            .iter()
            .enumerate()
            .map(|(idx, email)| parse_email(&format!("emails_to_invite[{idx}]"), email))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NewTrip {
            destination: self.destination,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            owner_name: self.owner_name,
            owner_email,
            emails_to_invite,
        })
    }
}

fn parse_email(field: &str, raw: &str) -> Result<String, AppError> {
    raw.parse::<Address>()
        .map(|address| address.to_string())
        .map_err(|_| AppError::InvalidInput(format!("{field} must be a valid email address")))
}

#[derive(Debug, Serialize)]
pub struct CreateTripResponse {
    #[serde(rename = "tripId")]
    trip_id: Uuid,
}

async fn create_trip(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateTripRequest>,
) -> Result<Json<CreateTripResponse>, AppError> {
    let new_trip = request.validate()?;
    new_trip.check_schedule(Utc::now())?;

    let created = store::create_trip(&state.db, &new_trip).await?;
    info!(
        trip_id = %created.trip.id,
        invitees = created.invitees.len(),
        "trip created"
    );

    state
        .notifier
        .trip_created(&created.trip, &created.owner)
        .await
        .log("trip_created", created.trip.id);

    Ok(Json(CreateTripResponse {
        trip_id: created.trip.id,
    }))
}

async fn confirm_trip(
    State(state): State<AppState>,
    ApiPath(trip_id): ApiPath<Uuid>,
) -> Result<Redirect, AppError> {
    let (trip, invitees) =
        store::find_trip_with_participants(&state.db, trip_id, ParticipantFilter::InviteesOnly)
            .await?
            .ok_or(AppError::NotFound("trip"))?;

    let trip_page = state.config.web_base_url.join_path(&format!("trips/{trip_id}"));
    if trip.is_confirmed || !store::confirm_trip(&state.db, trip_id).await? {
        return Ok(Redirect::to(&trip_page));
    }
    info!(%trip_id, "trip confirmed");

    state
        .notifier
        .trip_invitations(&trip, &invitees)
        .await
        .log("trip_invitations", trip_id);

    Ok(Redirect::to(&state.config.web_base_url.join_path("trips")))
}

struct TripRow {
    id: Uuid,
    destination: String,
    starts_on: String,
    ends_on: String,
    is_confirmed: bool,
}

#[derive(Template)]
#[template(path = "trips/list.html")]
struct TripsListTemplate {
    trips: Vec<TripRow>,
}

async fn trips_list(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let trips = store::list_trips(&state.db)
        .await?
        .into_iter()
        .map(|trip| TripRow {
            id: trip.id,
            starts_on: state.dates.long(trip.starts_at),
            ends_on: state.dates.long(trip.ends_at),
            destination: trip.destination,
            is_confirmed: trip.is_confirmed,
        })
        .collect();
    Ok(AskamaTemplateResponse::into_response(TripsListTemplate {
        trips,
    }))
}

struct ParticipantRow {
    label: String,
    email: String,
    is_owner: bool,
    is_confirmed: bool,
}

#[derive(Template)]
#[template(path = "trips/detail.html")]
struct TripDetailTemplate {
    destination: String,
    starts_on: String,
    ends_on: String,
    is_confirmed: bool,
    participants: Vec<ParticipantRow>,
}

async fn trip_detail(
    State(state): State<AppState>,
    ApiPath(trip_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (trip, participants) =
        store::find_trip_with_participants(&state.db, trip_id, ParticipantFilter::All)
            .await?
            .ok_or(AppError::NotFound("trip"))?;

    let participants = participants
        .into_iter()
        .map(|participant| ParticipantRow {
            label: participant.name.clone().unwrap_or_else(|| "Convidado".into()),
            email: participant.email,
            is_owner: participant.is_owner,
            is_confirmed: participant.is_confirmed,
        })
        .collect();
    Ok(AskamaTemplateResponse::into_response(TripDetailTemplate {
        starts_on: state.dates.long(trip.starts_at),
        ends_on: state.dates.long(trip.ends_at),
        destination: trip.destination,
        is_confirmed: trip.is_confirmed,
        participants,
    }))
}
