use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// `false` for plaintext relays such as a local mail catcher
    pub starttls: bool,
}

#[derive(Clone, Debug)]
pub struct PaymentConfig {
    pub gateway_url: String,
    pub secret_key: String,
    pub webhook_secret: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Maximum age of a signed webhook timestamp
    pub signature_tolerance_secs: i64,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub media_root: PathBuf,
    pub public_base_url: String,
    pub smtp: Option<SmtpConfig>,
    pub email_from: String,
    pub contact_inbox: String,
    pub payment: PaymentConfig,
    pub seed_demo: bool,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://societyhub.db?mode=rwc".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
            media_root: PathBuf::from("media"),
            public_base_url: String::new(),
            smtp: None,
            email_from: "SocietyHub <no-reply@societyhub.local>".to_string(),
            contact_inbox: "secretariat@societyhub.local".to_string(),
            payment: PaymentConfig {
                gateway_url: "https://api.payments.invalid".to_string(),
                secret_key: String::new(),
                webhook_secret: String::new(),
                success_url: "http://localhost:3000/membership/success".to_string(),
                cancel_url: "http://localhost:3000/membership/cancelled".to_string(),
                signature_tolerance_secs: 300,
            },
            seed_demo: false,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let smtp = env::var("SMTP_HOST").ok().map(|host| SmtpConfig {
            host,
            port: env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(587),
            username: env::var("SMTP_USERNAME").ok(),
            password: env::var("SMTP_PASSWORD").ok(),
            starttls: env::var("SMTP_STARTTLS")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        });

        let payment = PaymentConfig {
            gateway_url: env::var("PAYMENT_GATEWAY_URL").unwrap_or(defaults.payment.gateway_url),
            secret_key: env::var("PAYMENT_SECRET_KEY").unwrap_or_default(),
            webhook_secret: env::var("PAYMENT_WEBHOOK_SECRET").unwrap_or_default(),
            success_url: env::var("PAYMENT_SUCCESS_URL").unwrap_or(defaults.payment.success_url),
            cancel_url: env::var("PAYMENT_CANCEL_URL").unwrap_or(defaults.payment.cancel_url),
            signature_tolerance_secs: defaults.payment.signature_tolerance_secs,
        };

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            media_root: env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_root),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            smtp,
            email_from: env::var("EMAIL_FROM").unwrap_or(defaults.email_from),
            contact_inbox: env::var("CONTACT_INBOX").unwrap_or(defaults.contact_inbox),
            payment,
            seed_demo: env::var("SEED_DEMO").is_ok(),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        }
    }
}
