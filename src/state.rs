use std::sync::Arc;

use crate::{
    config::AppConfig,
    dates::DateFormatter,
    db::DbPool,
    services::{mail::Mailer, notify::Notifier},
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub dates: DateFormatter,
    pub notifier: Notifier,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool, mailer: Arc<dyn Mailer>) -> Self {
        let dates = DateFormatter::new(config.mail.locale);
        let notifier = Notifier::new(
            mailer,
            config.mail.sender.clone(),
            dates,
            config.api_base_url.clone(),
        );
        Self {
            config,
            db,
            dates,
            notifier,
        }
    }
}
