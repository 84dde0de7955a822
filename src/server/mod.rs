//! # HTTP Server
//!
//! axum routes over a shared `Browser`:
//!
//! | Route | Response |
//! |-------|----------|
//! | `/kb/item?id=` | item document |
//! | `/kb/related_items?id=` | related-items document |
//! | `/kb/query?q=` | search matches |
//! | `{prefix}get_all_node_data?node=` | `kgtk_object_collection`, `{}` if unknown |
//! | `{prefix}get_node_*?node=` | raw frame as TSV |
//! | `{prefix}get_configuration` | effective configuration |
//!
//! Every engine call runs on the blocking pool.

mod api;

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::Method;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub use api::ApiError;

use crate::{Browser, NodeFrameQuery, QueryEngine, Result};

/// Build the router for `browser`.
pub fn router<E: QueryEngine>(browser: Arc<Browser<E>>) -> Router {
    let prefix = browser.config().server.service_prefix.clone();

    let mut router = Router::new()
        .route("/kb/item", get(api::item::<E>))
        .route("/kb/related_items", get(api::related_items::<E>))
        .route("/kb/query", get(api::query::<E>))
        .route(&format!("{prefix}get_all_node_data"), get(api::all_node_data::<E>))
        .route(&format!("{prefix}get_configuration"), get(api::configuration::<E>));

    for which in NodeFrameQuery::ALL {
        router = router.route(
            &format!("{prefix}{}", which.route()),
            get(move |state: State<Arc<Browser<E>>>, params: Query<api::Params>| {
                api::node_frame(state, params, which)
            }),
        );
    }

    if browser.config().server.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::OPTIONS]),
        );
    }

    router.with_state(browser).layer(TraceLayer::new_for_http())
}

/// Serve until Ctrl-C.
pub async fn serve<E: QueryEngine>(browser: Arc<Browser<E>>) -> Result<()> {
    let addr = browser.config().listen_addr()?;
    let prefix = browser.config().server.service_prefix.clone();
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, %prefix, "kgtk browser listening");

    axum::serve(listener, router(browser).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => error!(?err, "failed to listen for shutdown signal"),
    }
}
