//! HTTP gateway: route registration, middleware stack and the listener.
//!
//! Authentication-domain routes are nested under the configured base path
//! and always reachable; everything else falls through to the proxy gate.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Method, Request},
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

use crate::auth::AuthService;
use crate::config::{Config, CorsConfig};
use crate::notify::Notifier;
use crate::store::UserStore;
use crate::token::TokenCodec;
use crate::totp::TotpManager;

pub mod handlers;
pub mod proxy;

/// Shared per-process state, built once at startup and injected as an
/// extension.
pub struct AppState {
    pub config: Config,
    pub auth: AuthService,
    pub users: Arc<dyn UserStore>,
    pub totp: Option<TotpManager>,
    pub codec: TokenCodec,
    pub client: reqwest::Client,
    pub notifier: Arc<dyn Notifier>,
}

/// Build the full application router: auth routes under the base path,
/// proxy gate as the fallback, middleware stack on top.
///
/// # Errors
/// Returns an error for an invalid CORS configuration.
pub fn router(state: Arc<AppState>) -> Result<Router> {
    let features = &state.config.features;

    let mut auth_routes = Router::new()
        .route("/login", post(handlers::session::login))
        .route("/renew", post(handlers::session::renew))
        .route("/logout", post(handlers::session::logout))
        .route("/ping", get(handlers::session::ping))
        .route("/confirm/:token", post(handlers::account::confirm));

    if features.signup {
        auth_routes = auth_routes.route("/signup", post(handlers::account::signup));
    }
    if features.change_password {
        auth_routes = auth_routes.route("/setpw", post(handlers::account::change_password));
    }
    if features.change_email {
        auth_routes = auth_routes.route("/changeemail", post(handlers::account::change_email));
    }
    if features.forgot_password {
        auth_routes =
            auth_routes.route("/initpwreset", post(handlers::account::init_forgot_password));
    }
    if features.delete_account {
        auth_routes = auth_routes.route("/delete", post(handlers::account::delete_account));
    }
    if state.totp.is_some() {
        auth_routes = auth_routes
            .route("/otp/init", post(handlers::otp::init))
            .route("/otp/confirm", post(handlers::otp::confirm))
            .route("/otp/disable", post(handlers::otp::disable));
    }

    let base = state.config.api_path.trim_end_matches('/').to_string();
    let app = if base.is_empty() {
        auth_routes
    } else {
        Router::new().nest(&base, auth_routes)
    };

    let mut app = app.fallback(proxy::forward).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(state.clone())),
    );

    if state.config.cors.enabled {
        app = app.layer(cors_layer(&state.config.cors)?);
    }

    Ok(app)
}

/// Bind the listener and serve until the task is cancelled.
///
/// # Errors
/// Returns an error if binding or serving fails.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let port = state.config.port;
    let app = router(state)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;
    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn cors_layer(config: &CorsConfig) -> Result<CorsLayer> {
    let mut layer = CorsLayer::new().allow_methods([Method::GET, Method::POST]);

    layer = if config.origin == "*" {
        layer.allow_origin(Any)
    } else {
        let origin = HeaderValue::from_str(&config.origin)
            .with_context(|| format!("invalid CORS origin: {}", config.origin))?;
        layer.allow_origin(AllowOrigin::exact(origin))
    };

    layer = if config.headers == "*" {
        layer.allow_headers(Any)
    } else {
        let names = config
            .headers
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                name.parse::<HeaderName>()
                    .with_context(|| format!("invalid CORS header name: {name}"))
            })
            .collect::<Result<Vec<_>>>()?;
        layer.allow_headers(names)
    };

    Ok(layer)
}
