//! services/api/src/bin/api.rs

use api_lib::{
    adapters::db::DbAdapter,
    config::Config,
    error::ApiError,
    web::{
        cancel_booking_handler, complete_slot_handler, create_offer_handler,
        create_reschedule_handler, delete_offer_handler, escalate_dispute_handler,
        finalize_slot_handler, get_booking_handler, get_schedule_handler, list_bookings_handler,
        raise_dispute_handler, resolve_dispute_handler, respond_reschedule_handler,
        rest::ApiDoc, state::AppState, update_offer_handler,
    },
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter
        .run_migrations()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!("Database migrations complete.");

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        store: db_adapter,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {e}")))?,
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    let api_router = Router::new()
        .route("/tutors/{tutor_id}/schedule", get(get_schedule_handler))
        .route("/bookings", get(list_bookings_handler))
        .route("/bookings/{booking_id}", get(get_booking_handler))
        .route("/bookings/{booking_id}/cancel", post(cancel_booking_handler))
        .route("/offers", post(create_offer_handler))
        .route(
            "/offers/{offer_id}",
            put(update_offer_handler).delete(delete_offer_handler),
        )
        .route("/slots/{slot_id}/complete", post(complete_slot_handler))
        .route("/slots/{slot_id}/finalize", post(finalize_slot_handler))
        .route("/slots/{slot_id}/reschedule", post(create_reschedule_handler))
        .route("/slots/{slot_id}/disputes", post(raise_dispute_handler))
        .route("/reschedules/{request_id}/respond", post(respond_reschedule_handler))
        .route("/disputes/{dispute_id}/escalate", post(escalate_dispute_handler))
        .route("/disputes/{dispute_id}/resolve", post(resolve_dispute_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete
    // application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
