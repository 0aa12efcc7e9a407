pub mod abstracts;
pub mod auth;
pub mod conferences;
pub mod ebooklets;
pub mod error;
pub mod health;
pub mod journal_watch;
pub mod messaging;
pub mod payments;
pub mod response;
pub mod subscriptions;
pub mod upload;
pub mod ws;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::infrastructure::AppState;

/// Largest accepted request body; per-kind upload ceilings are enforced after reading.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .nest("/abstracts", abstract_routes())
        .nest("/conferences", conference_routes())
        .nest("/ebooklets", ebooklet_routes())
        .nest("/journal-watch", journal_watch_routes())
        .nest("/messaging", messaging_routes())
        .route("/ws/conversations/:id", get(ws::connect))
        .nest("/payments", payment_routes())
        // Newsletter and contact form
        .route("/newsletter/subscribe", post(subscriptions::subscribe))
        .route("/newsletter/unsubscribe", post(subscriptions::unsubscribe))
        .route("/newsletter/subscribers", get(subscriptions::list_subscribers))
        .route(
            "/newsletter/subscribers/:id",
            axum::routing::delete(subscriptions::delete_subscriber),
        )
        .route(
            "/contact",
            post(subscriptions::create_contact).get(subscriptions::list_contacts),
        )
        .route(
            "/contact/:id",
            get(subscriptions::retrieve_contact).delete(subscriptions::delete_contact),
        )
        .route(
            "/contact/:id/status",
            post(subscriptions::update_contact_status),
        )
        .route("/subscriptions/analytics", get(subscriptions::analytics))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

fn abstract_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(abstracts::list).post(abstracts::create))
        .route("/analytics", get(abstracts::analytics))
        .route(
            "/:id",
            get(abstracts::retrieve)
                .put(abstracts::update)
                .patch(abstracts::partial_update)
                .delete(abstracts::destroy),
        )
        .route("/:id/submit", post(abstracts::submit))
        .route("/:id/status", post(abstracts::change_status))
        .route("/:id/upload", post(abstracts::upload))
        .route(
            "/:id/reviews",
            get(abstracts::list_reviews).post(abstracts::create_review),
        )
}

fn conference_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(conferences::list).post(conferences::create))
        .route("/analytics", get(conferences::analytics))
        .route(
            "/:id",
            get(conferences::retrieve)
                .put(conferences::update)
                .patch(conferences::partial_update)
                .delete(conferences::destroy),
        )
        .route("/:id/toggle-featured", post(conferences::toggle_featured))
        .route("/:id/banner", post(conferences::upload_banner))
        .route(
            "/:id/register",
            post(conferences::register).delete(conferences::unregister),
        )
        .route("/:id/registrations", get(conferences::registrations))
}

fn ebooklet_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(ebooklets::list).post(ebooklets::create))
        .route("/analytics", get(ebooklets::analytics))
        .route(
            "/:id",
            get(ebooklets::retrieve)
                .put(ebooklets::update)
                .patch(ebooklets::partial_update)
                .delete(ebooklets::destroy),
        )
        .route("/:id/toggle-featured", post(ebooklets::toggle_featured))
        .route("/:id/upload", post(ebooklets::upload))
        .route("/:id/cover", post(ebooklets::upload_cover))
        .route("/:id/download", post(ebooklets::download))
}

fn journal_watch_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(journal_watch::list).post(journal_watch::create))
        .route("/analytics", get(journal_watch::analytics))
        .route(
            "/:id",
            get(journal_watch::retrieve)
                .put(journal_watch::update)
                .patch(journal_watch::partial_update)
                .delete(journal_watch::destroy),
        )
        .route("/:id/toggle-featured", post(journal_watch::toggle_featured))
}

fn messaging_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations",
            get(messaging::list_conversations).post(messaging::create_conversation),
        )
        .route("/conversations/:id", get(messaging::retrieve_conversation))
        .route(
            "/conversations/:id/participants",
            post(messaging::add_participant),
        )
        .route(
            "/conversations/:id/participants/:user_id",
            axum::routing::delete(messaging::remove_participant),
        )
        .route(
            "/conversations/:id/messages",
            get(messaging::list_messages).post(messaging::send_message),
        )
        .route("/conversations/:id/read", post(messaging::mark_read))
        .route(
            "/messages/:id",
            axum::routing::patch(messaging::edit_message).delete(messaging::delete_message),
        )
        .route("/messages/:id/reactions", post(messaging::toggle_reaction))
        .route("/unread-count", get(messaging::unread_count))
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(payments::list))
        .route(
            "/plans",
            get(payments::list_plans).post(payments::create_plan),
        )
        .route(
            "/plans/:id",
            get(payments::retrieve_plan)
                .put(payments::update_plan)
                .patch(payments::partial_update_plan)
                .delete(payments::delete_plan),
        )
        .route("/checkout", post(payments::checkout))
        .route("/webhook", post(payments::webhook))
        .route("/membership", get(payments::membership))
        .route("/analytics", get(payments::analytics))
        .route("/:id", get(payments::retrieve))
}
