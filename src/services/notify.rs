//! Trip mail: rendering, confirmation links and per-recipient fan-out.

use std::sync::Arc;

use askama::Template;
use futures::future::join_all;
use lettre::{message::Mailbox, Address};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::BaseUrl,
    dates::DateFormatter,
    models::{participant::Participant, trip::Trip},
    services::mail::{DeliveryReceipt, MailError, Mailer, OutgoingMail},
};

#[derive(Template)]
#[template(path = "mail/trip_created.html")]
struct TripCreatedMail<'a> {
    owner_name: &'a str,
    destination: &'a str,
    starts_on: String,
    ends_on: String,
    confirmation_link: String,
}

#[derive(Template)]
#[template(path = "mail/trip_invitation.html")]
struct TripInvitationMail<'a> {
    destination: &'a str,
    starts_on: String,
    ends_on: String,
    confirmation_link: String,
}

#[derive(Debug)]
pub struct DeliveryOutcome {
    pub participant_id: Uuid,
    pub recipient: String,
    pub result: Result<DeliveryReceipt, MailError>,
}

/// One outcome per recipient of a fan-out.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn log(&self, kind: &'static str, trip_id: Uuid) {
        if self.failed() == 0 {
            info!(%trip_id, kind, delivered = self.delivered(), "mail fan-out finished");
        } else {
            let failed: Vec<String> = self
                .failures()
                .map(|o| format!("{} ({})", o.recipient, o.participant_id))
                .collect();
            warn!(
                %trip_id,
                kind,
                delivered = self.delivered(),
                failed = ?failed,
                "mail fan-out finished with failures"
            );
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    sender: Mailbox,
    dates: DateFormatter,
    links: BaseUrl,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        sender: Mailbox,
        dates: DateFormatter,
        links: BaseUrl,
    ) -> Self {
        Self {
            mailer,
            sender,
            dates,
            links,
        }
    }

    pub fn trip_confirmation_link(&self, trip_id: Uuid) -> String {
        self.links.join_path(&format!("trips/{trip_id}/confirm"))
    }

    pub fn participant_confirmation_link(&self, participant_id: Uuid) -> String {
        self.links
            .join_path(&format!("participants/{participant_id}/confirm"))
    }

    /// Asks the owner to confirm the trip they just created.
    pub async fn trip_created(&self, trip: &Trip, owner: &Participant) -> DeliveryReport {
        let html = TripCreatedMail {
            owner_name: owner.display_name(),
            destination: &trip.destination,
            starts_on: self.dates.numeric(trip.starts_at),
            ends_on: self.dates.numeric(trip.ends_at),
            confirmation_link: self.trip_confirmation_link(trip.id),
        }
        .render();
        let outcome = self.deliver(owner, subject_for(trip), html).await;
        DeliveryReport {
            outcomes: vec![outcome],
        }
    }

    /// Sends every invitee their own confirmation link. All sends run
    /// concurrently and each one settles independently of the others.
    pub async fn trip_invitations(&self, trip: &Trip, invitees: &[Participant]) -> DeliveryReport {
        let starts_on = self.dates.long(trip.starts_at);
        let ends_on = self.dates.long(trip.ends_at);
        let sends = invitees.iter().map(|invitee| {
            let html = TripInvitationMail {
                destination: &trip.destination,
                starts_on: starts_on.clone(),
                ends_on: ends_on.clone(),
                confirmation_link: self.participant_confirmation_link(invitee.id),
            }
            .render();
            self.deliver(invitee, subject_for(trip), html)
        });
        DeliveryReport {
            outcomes: join_all(sends).await,
        }
    }

    async fn deliver(
        &self,
        to: &Participant,
        subject: String,
        html: Result<String, askama::Error>,
    ) -> DeliveryOutcome {
        let result = self.try_deliver(to, subject, html).await;
        match &result {
            Ok(receipt) => info!(
                participant_id = %to.id,
                to = %to.email,
                message_id = %receipt.message_id,
                detail = %receipt.detail,
                "mail delivered"
            ),
            Err(err) => warn!(
                participant_id = %to.id,
                to = %to.email,
                error = %err,
                "mail delivery failed"
            ),
        }
        DeliveryOutcome {
            participant_id: to.id,
            recipient: to.email.clone(),
            result,
        }
    }

    async fn try_deliver(
        &self,
        to: &Participant,
        subject: String,
        html: Result<String, askama::Error>,
    ) -> Result<DeliveryReceipt, MailError> {
        let html = html.map_err(|err| MailError::Render(err.to_string()))?;
        let address: Address = to
            .email
            .parse()
            .map_err(|err| MailError::Address(format!("{err}")))?;
        let mail = OutgoingMail {
            from: self.sender.clone(),
            to: Mailbox::new(to.name.clone(), address),
            subject,
            html,
        };
        self.mailer.send(mail).await
    }
}

fn subject_for(trip: &Trip) -> String {
    format!("Confirme sua viagem para {}", trip.destination)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, Locale, Utc};

    use super::*;

    #[derive(Default)]
    struct FlakyMailer {
        reject: Vec<String>,
        sent: Mutex<Vec<OutgoingMail>>,
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn send(&self, mail: OutgoingMail) -> Result<DeliveryReceipt, MailError> {
            if self.reject.contains(&mail.to.email.to_string()) {
                return Err(MailError::Transport("mailbox unavailable".into()));
            }
            self.sent.lock().unwrap().push(mail);
            Ok(DeliveryReceipt {
                message_id: "<test@plann.er>".into(),
                detail: "250 OK".into(),
            })
        }
    }

    fn notifier(mailer: Arc<FlakyMailer>) -> Notifier {
        Notifier::new(
            mailer,
            Mailbox::new(Some("Equipe plann.er".into()), "oi@plann.er".parse().unwrap()),
            DateFormatter::new(Locale::pt_BR),
            BaseUrl::parse("API_BASE_URL", "http://localhost:3333").unwrap(),
        )
    }

    fn trip() -> Trip {
        let now = Utc::now();
        Trip {
            id: Uuid::new_v4(),
            destination: "Paris trip".into(),
            starts_at: now + Duration::days(1),
            ends_at: now + Duration::days(5),
            is_confirmed: true,
            created_at: now,
        }
    }

    fn participant(trip: &Trip, name: Option<&str>, email: &str, is_owner: bool) -> Participant {
        Participant {
            id: Uuid::new_v4(),
            trip_id: trip.id,
            name: name.map(str::to_string),
            email: email.into(),
            is_owner,
            is_confirmed: is_owner,
            created_at: trip.created_at,
        }
    }

    #[tokio::test]
    async fn owner_mail_carries_trip_link() {
        let mailer = Arc::new(FlakyMailer::default());
        let trip = trip();
        let owner = participant(&trip, Some("Ana"), "ana@x.com", true);

        let report = notifier(mailer.clone()).trip_created(&trip, &owner).await;
        assert_eq!(report.delivered(), 1);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent[0].to.name.as_deref(), Some("Ana"));
        assert_eq!(sent[0].subject, "Confirme sua viagem para Paris trip");
        assert!(sent[0]
            .html
            .contains(&format!("http://localhost:3333/trips/{}/confirm", trip.id)));
        assert!(sent[0].html.contains(&trip.starts_at.format("%d/%m/%Y").to_string()));
    }

    #[tokio::test]
    async fn one_rejection_does_not_stop_the_others() {
        let mailer = Arc::new(FlakyMailer {
            reject: vec!["bob@x.com".into()],
            ..Default::default()
        });
        let trip = trip();
        let invitees = vec![
            participant(&trip, None, "bob@x.com", false),
            participant(&trip, None, "cris@x.com", false),
            participant(&trip, None, "not an address", false),
        ];

        let report = notifier(mailer.clone())
            .trip_invitations(&trip, &invitees)
            .await;
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.delivered(), 1);
        assert_eq!(report.failed(), 2);
        let failed_ids: Vec<Uuid> = report.failures().map(|o| o.participant_id).collect();
        assert_eq!(failed_ids, vec![invitees[0].id, invitees[2].id]);
        assert!(matches!(
            report.outcomes[0].result,
            Err(MailError::Transport(_))
        ));
        assert!(matches!(report.outcomes[2].result, Err(MailError::Address(_))));

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0]
            .html
            .contains(&format!("/participants/{}/confirm", invitees[1].id)));
    }
}
