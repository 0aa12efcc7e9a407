//! Application state containing the database and shared resources

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::infrastructure::config::Config;
use crate::infrastructure::mailer::{build_mailer, Mailer};
use crate::infrastructure::storage::MediaStorage;
use crate::modules::integrations::payment_gateway::{HttpPaymentGateway, PaymentGateway};
use crate::services::chat_hub::ChatHub;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    pub config: Arc<Config>,
    pub mailer: Arc<dyn Mailer>,
    pub storage: Arc<MediaStorage>,
    pub gateway: Arc<dyn PaymentGateway>,
    /// Live messaging groups
    pub hub: ChatHub,
}

impl AppState {
    /// Create a new AppState with production collaborators derived from `config`
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let mailer = build_mailer(&config);
        let storage = Arc::new(MediaStorage::new(
            config.media_root.clone(),
            &config.public_base_url,
        ));
        let gateway = Arc::new(HttpPaymentGateway::new(
            &config.payment.gateway_url,
            &config.payment.secret_key,
        ));

        Self {
            db,
            config: Arc::new(config),
            mailer,
            storage,
            gateway,
            hub: ChatHub::new(),
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl AsRef<DatabaseConnection> for AppState {
    fn as_ref(&self) -> &DatabaseConnection {
        &self.db
    }
}

// Lets handlers that only need the database extract `State<DatabaseConnection>`
impl axum::extract::FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
