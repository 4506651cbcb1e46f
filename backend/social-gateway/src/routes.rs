//! HTTP routing: GraphQL over HTTP and WebSocket, REST image endpoints,
//! health and schema introspection

use actix_web::{web, HttpRequest, HttpResponse};
use async_graphql::http::GraphiQLSource;
use async_graphql_actix_web::{GraphQLRequest, GraphQLResponse, GraphQLSubscription};

use crate::auth::{bearer_token, BearerToken};
use crate::error::AppError;
use crate::rest_api::{self, rest_error};
use crate::schema::AppSchema;
use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
pub struct RouteOptions {
    pub playground: bool,
    pub json_limit_bytes: usize,
}

async fn graphql_handler(
    schema: web::Data<AppSchema>,
    http_req: HttpRequest,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = req.into_inner();
    if let Some(token) = bearer_token(http_req.headers()) {
        request = request.data(BearerToken(token));
    }

    schema.execute(request).await.into()
}

async fn graphql_subscription_handler(
    schema: web::Data<AppSchema>,
    req: HttpRequest,
    payload: web::Payload,
) -> actix_web::Result<HttpResponse> {
    GraphQLSubscription::new(schema.as_ref().clone()).start(&req, payload)
}

async fn health_handler() -> &'static str {
    "ok"
}

/// SDL for client code generation
async fn schema_handler(schema: web::Data<AppSchema>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain")
        .body(schema.sdl())
}

async fn playground_handler() -> HttpResponse {
    HttpResponse::Ok().content_type("text/html").body(
        GraphiQLSource::build()
            .endpoint("/graphql")
            .subscription_endpoint("/graphql")
            .finish(),
    )
}

pub fn configure(
    cfg: &mut web::ServiceConfig,
    state: AppState,
    schema: AppSchema,
    options: RouteOptions,
) {
    let json_config = web::JsonConfig::default()
        .limit(options.json_limit_bytes)
        .error_handler(|err, _req| rest_error(&AppError::Validation(err.to_string())));

    cfg.app_data(json_config)
        .app_data(web::Data::new(state.clone()))
        .app_data(web::Data::new(schema))
        .route("/graphql", web::post().to(graphql_handler))
        .route("/graphql", web::get().to(graphql_subscription_handler))
        .route("/graphql/schema", web::get().to(schema_handler))
        .route("/health", web::get().to(health_handler));

    if options.playground {
        cfg.route("/playground", web::get().to(playground_handler));
    }

    rest_api::configure(cfg, &state);
}
