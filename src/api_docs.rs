use crate::api;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::auth::register,
        api::auth::login,
        api::auth::me,
        api::abstracts::list,
        api::conferences::list,
        api::ebooklets::list,
        api::journal_watch::list,
        api::messaging::list_conversations,
        api::payments::list_plans,
        api::payments::checkout,
        api::payments::webhook,
        api::subscriptions::subscribe,
        api::subscriptions::create_contact,
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "societyhub", description = "SocietyHub association API")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
