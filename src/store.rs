//! Trip and participant persistence.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        participant::{Participant, ParticipantFilter},
        trip::{NewTrip, Trip},
    },
};

const TRIP_COLUMNS: &str = "id, destination, starts_at, ends_at, is_confirmed, created_at";
const PARTICIPANT_COLUMNS: &str = "id, trip_id, name, email, is_owner, is_confirmed, created_at";

#[derive(Debug, Clone)]
pub struct CreatedTrip {
    pub trip: Trip,
    pub owner: Participant,
    pub invitees: Vec<Participant>,
}

/// Inserts the trip, its confirmed owner and one unconfirmed participant per
/// invited address in a single transaction.
pub async fn create_trip(db: &DbPool, new_trip: &NewTrip) -> Result<CreatedTrip, AppError> {
    let now = Utc::now();
    let trip = Trip {
        id: Uuid::new_v4(),
        destination: new_trip.destination.clone(),
        starts_at: new_trip.starts_at,
        ends_at: new_trip.ends_at,
        is_confirmed: false,
        created_at: now,
    };
    let owner = Participant {
        id: Uuid::new_v4(),
        trip_id: trip.id,
        name: Some(new_trip.owner_name.clone()),
        email: new_trip.owner_email.clone(),
        is_owner: true,
        is_confirmed: true,
        created_at: now,
    };
    let invitees: Vec<Participant> = new_trip
        .emails_to_invite
        .iter()
        .map(|email| Participant {
            id: Uuid::new_v4(),
            trip_id: trip.id,
            name: None,
            email: email.clone(),
            is_owner: false,
            is_confirmed: false,
            created_at: now,
        })
        .collect();

    let mut tx = db.begin().await?;
    sqlx::query(
        r#"INSERT INTO trips (id, destination, starts_at, ends_at, is_confirmed, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(trip.id)
    .bind(&trip.destination)
    .bind(trip.starts_at)
    .bind(trip.ends_at)
    .bind(trip.is_confirmed)
    .bind(trip.created_at)
    .execute(&mut *tx)
    .await?;

    for participant in std::iter::once(&owner).chain(invitees.iter()) {
        sqlx::query(
            r#"INSERT INTO participants (id, trip_id, name, email, is_owner, is_confirmed, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(participant.id)
        .bind(participant.trip_id)
        .bind(&participant.name)
        .bind(&participant.email)
        .bind(participant.is_owner)
        .bind(participant.is_confirmed)
        .bind(participant.created_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(CreatedTrip {
        trip,
        owner,
        invitees,
    })
}

pub async fn find_trip(db: &DbPool, trip_id: Uuid) -> Result<Option<Trip>, AppError> {
    let trip = sqlx::query_as::<_, Trip>(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?"))
        .bind(trip_id)
        .fetch_optional(db)
        .await?;
    Ok(trip)
}

pub async fn find_trip_with_participants(
    db: &DbPool,
    trip_id: Uuid,
    filter: ParticipantFilter,
) -> Result<Option<(Trip, Vec<Participant>)>, AppError> {
    let Some(trip) = find_trip(db, trip_id).await? else {
        return Ok(None);
    };
    let participants = list_participants(db, trip_id, filter).await?;
    Ok(Some((trip, participants)))
}

/// Owner first, then invitees in the order they were invited.
pub async fn list_participants(
    db: &DbPool,
    trip_id: Uuid,
    filter: ParticipantFilter,
) -> Result<Vec<Participant>, AppError> {
    let condition = match filter {
        ParticipantFilter::All => "",
        ParticipantFilter::InviteesOnly => "AND is_owner = 0",
    };
    let participants = sqlx::query_as::<_, Participant>(&format!(
        "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE trip_id = ? {condition} \
         ORDER BY is_owner DESC, rowid ASC"
    ))
    .bind(trip_id)
    .fetch_all(db)
    .await?;
    Ok(participants)
}

pub async fn list_trips(db: &DbPool) -> Result<Vec<Trip>, AppError> {
    let trips = sqlx::query_as::<_, Trip>(&format!(
        "SELECT {TRIP_COLUMNS} FROM trips ORDER BY starts_at DESC"
    ))
    .fetch_all(db)
    .await?;
    Ok(trips)
}

/// Returns `true` only for the call that moved the trip from unconfirmed to confirmed.
pub async fn confirm_trip(db: &DbPool, trip_id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("UPDATE trips SET is_confirmed = 1 WHERE id = ? AND is_confirmed = 0")
        .bind(trip_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn find_participant(
    db: &DbPool,
    participant_id: Uuid,
) -> Result<Option<Participant>, AppError> {
    let participant = sqlx::query_as::<_, Participant>(&format!(
        "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE id = ?"
    ))
    .bind(participant_id)
    .fetch_optional(db)
    .await?;
    Ok(participant)
}

/// Returns `true` only for the call that moved the participant to confirmed.
pub async fn confirm_participant(db: &DbPool, participant_id: Uuid) -> Result<bool, AppError> {
    let result =
        sqlx::query("UPDATE participants SET is_confirmed = 1 WHERE id = ? AND is_confirmed = 0")
            .bind(participant_id)
            .execute(db)
            .await?;
    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;
    use crate::db::{init_pool, migrate};

    async fn test_pool() -> (DbPool, TempDir) {
        let root = TempDir::new().expect("temp dir");
        let url = format!("sqlite://{}", root.path().join("store.sqlite").display());
        let pool = init_pool(&url).await.expect("pool");
        migrate(&pool).await.expect("migrations");
        (pool, root)
    }

    fn paris(invite: &[&str]) -> NewTrip {
        let now = Utc::now();
        NewTrip {
            destination: "Paris trip".into(),
            starts_at: now + Duration::days(1),
            ends_at: now + Duration::days(5),
            owner_name: "Ana".into(),
            owner_email: "ana@x.com".into(),
            emails_to_invite: invite.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn creates_trip_with_owner_and_invitees() {
        let (db, _root) = test_pool().await;
        let created = create_trip(&db, &paris(&["bob@x.com", "cris@x.com"]))
            .await
            .expect("create");

        let (trip, all) = find_trip_with_participants(&db, created.trip.id, ParticipantFilter::All)
            .await
            .expect("query")
            .expect("trip exists");
        assert!(!trip.is_confirmed);
        assert_eq!(all.len(), 3);
        assert!(all[0].is_owner && all[0].is_confirmed);
        assert_eq!(all[0].name.as_deref(), Some("Ana"));
        assert!(all[1..].iter().all(|p| !p.is_owner && !p.is_confirmed && p.name.is_none()));

        assert_eq!(all.iter().filter(|p| p.is_owner).count(), 1);
        let invitees = list_participants(&db, trip.id, ParticipantFilter::InviteesOnly)
            .await
            .expect("invitees");
        let emails: Vec<_> = invitees.iter().map(|p| p.email.as_str()).collect();
        assert_eq!(emails, ["bob@x.com", "cris@x.com"]);
    }

    #[tokio::test]
    async fn confirmation_transitions_once() {
        let (db, _root) = test_pool().await;
        let created = create_trip(&db, &paris(&[])).await.expect("create");

        assert!(confirm_trip(&db, created.trip.id).await.expect("first"));
        assert!(!confirm_trip(&db, created.trip.id).await.expect("second"));
        assert!(!confirm_trip(&db, Uuid::new_v4()).await.expect("unknown"));

        let trip = find_trip(&db, created.trip.id).await.expect("query").expect("trip");
        assert!(trip.is_confirmed);
    }

    #[tokio::test]
    async fn confirming_participant_leaves_others_untouched() {
        let (db, _root) = test_pool().await;
        let created = create_trip(&db, &paris(&["bob@x.com", "cris@x.com"]))
            .await
            .expect("create");
        let bob = &created.invitees[0];

        assert!(confirm_participant(&db, bob.id).await.expect("confirm"));
        assert!(!confirm_participant(&db, bob.id).await.expect("again"));

        let all = list_participants(&db, created.trip.id, ParticipantFilter::All)
            .await
            .expect("participants");
        for participant in all {
            let expected = participant.is_owner || participant.id == bob.id;
            assert_eq!(participant.is_confirmed, expected, "{}", participant.email);
        }
        assert!(find_participant(&db, Uuid::new_v4()).await.expect("query").is_none());
    }
}
