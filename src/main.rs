#![warn(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::single_match_else, clippy::missing_errors_doc)]

use crate::{
    config::RuntimeConfiguration,
    routes::{
        api::{delete_student, get_students, post_student, put_student},
        index::get_index_route,
        students::{
            get_students_page, internal_get_clear_notifications, internal_get_close_form,
            internal_get_student_form, internal_get_student_table, internal_post_delete_student,
            internal_post_refresh, internal_post_reset, internal_post_save_student,
        },
    },
    session_store::RosterSessionStore,
    state::SiswaState,
};
use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tower_sessions::{Expiry, SessionManagerLayer, cookie::time::Duration};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[macro_use]
extern crate tracing;

mod config;
mod data;
mod envelope;
mod error;
mod maud_conveniences;
mod proxy;
mod roster;
mod routes;
mod session_store;
mod state;
mod upstream;

///student records are small, anything bigger than this is not a student
const MAX_BODY_BYTES: usize = 64 * 1024;
const EXPIRED_SESSION_SWEEP: std::time::Duration = std::time::Duration::from_secs(60);

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    warn!("signal received, starting graceful shutdown");
}

fn app(state: SiswaState, session_store: RosterSessionStore) -> Router {
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(Duration::days(5)));

    Router::new()
        .route("/", get(get_index_route))
        .route(
            "/api/students",
            get(get_students)
                .post(post_student)
                .put(put_student)
                .delete(delete_student),
        )
        .route("/students", get(get_students_page))
        .route("/internal/students/table", get(internal_get_student_table))
        .route("/internal/students/refresh", post(internal_post_refresh))
        .route("/internal/students/reset", post(internal_post_reset))
        .route("/internal/students/form", get(internal_get_student_form))
        .route("/internal/students/form/cancel", get(internal_get_close_form))
        .route("/internal/students/save", post(internal_post_save_student))
        .route("/internal/students/delete", post(internal_post_delete_student))
        .route(
            "/internal/notifications/clear",
            get(internal_get_clear_notifications),
        )
        .layer(session_layer)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let dotenv_result = dotenvy::dotenv();

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish(),
    )
    .expect("unable to set tracing subscriber");

    info!("`tracing` online");
    if let Err(e) = dotenv_result {
        warn!(?e, "No .env file loaded, using the process environment only");
    }

    let config = RuntimeConfiguration::new().expect("unable to create config");
    let state = SiswaState::new(config.clone()).expect("unable to create state");
    info!(upstream = %config.upstream_config().base_url(), "Proxying students");

    let session_store = RosterSessionStore::new(config.max_sessions());
    tokio::spawn(
        session_store
            .clone()
            .delete_expired_every(EXPIRED_SESSION_SWEEP),
    );

    let server_ip = config.server_ip();
    let listener = TcpListener::bind(server_ip)
        .await
        .expect("unable to listen on server ip");

    info!(?server_ip, "Listening");
    axum::serve(listener, app(state, session_store))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("unable to serve app");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::testing::ScriptedTransport;
    use std::sync::Arc;

    #[test]
    fn router_builds_without_conflicting_routes() {
        let state = SiswaState::with_transport(
            Arc::new(ScriptedTransport::new()),
            config::testing::config(),
        );

        let _ = app(state, RosterSessionStore::new(8));
    }
}
