use serial_test::serial;
use societyhub::config::Config;

const VARS: &[&str] = &[
    "PORT",
    "CORS_ALLOWED_ORIGINS",
    "PUBLIC_BASE_URL",
    "SMTP_HOST",
    "SMTP_PORT",
    "SMTP_STARTTLS",
    "CONTACT_INBOX",
    "PAYMENT_WEBHOOK_SECRET",
    "SEED_DEMO",
];

fn clear() {
    for var in VARS {
        // SAFETY: every test touching the environment runs under #[serial]
        unsafe { std::env::remove_var(var) };
    }
}

fn set(var: &str, value: &str) {
    // SAFETY: see `clear`
    unsafe { std::env::set_var(var, value) };
}

#[test]
#[serial]
fn test_defaults_without_environment() {
    clear();
    let config = Config::from_env();
    let defaults = Config::default();

    assert_eq!(config.port, defaults.port);
    assert!(config.cors_allowed_origins.is_empty());
    assert!(config.smtp.is_none());
    assert!(!config.seed_demo);
    assert_eq!(config.payment.signature_tolerance_secs, 300);
}

#[test]
#[serial]
fn test_environment_overrides() {
    clear();
    set("PORT", "9090");
    set("CORS_ALLOWED_ORIGINS", "https://a.example.org, ,https://b.example.org");
    set("PUBLIC_BASE_URL", "https://api.example.org/");
    set("SMTP_HOST", "smtp.example.org");
    set("SMTP_STARTTLS", "false");
    set("CONTACT_INBOX", "office@example.org");
    set("PAYMENT_WEBHOOK_SECRET", "whsec_env");
    set("SEED_DEMO", "1");

    let config = Config::from_env();
    clear();

    assert_eq!(config.port, 9090);
    assert_eq!(
        config.cors_allowed_origins,
        vec!["https://a.example.org", "https://b.example.org"]
    );
    assert_eq!(config.public_base_url, "https://api.example.org");
    let smtp = config.smtp.expect("smtp configured");
    assert_eq!(smtp.host, "smtp.example.org");
    assert_eq!(smtp.port, 587);
    assert!(!smtp.starttls);
    assert_eq!(config.contact_inbox, "office@example.org");
    assert_eq!(config.payment.webhook_secret, "whsec_env");
    assert!(config.seed_demo);
}

#[test]
#[serial]
fn test_unparseable_port_falls_back() {
    clear();
    set("PORT", "eighty");
    let config = Config::from_env();
    clear();
    assert_eq!(config.port, Config::default().port);
}
