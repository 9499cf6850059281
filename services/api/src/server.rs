use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryProfileRepository};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use headstart::config::{AppConfig, IdentityConfig};
use headstart::error::AppError;
use headstart::identity::{
    AuthService, CognitoIdentityProvider, IdentityProvider, LocalIdentityProvider,
    SessionVerifier, VerifyRedirect,
};
use headstart::profiles::{FilesystemPhotoStorage, ProfileService};
use headstart::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let provider = identity_provider(&config.identity);
    let repository = Arc::new(InMemoryProfileRepository::default());
    let storage = Arc::new(FilesystemPhotoStorage::new(
        config.photos.directory.clone(),
        config.photos.public_url.clone(),
    ));
    let profile_service = Arc::new(
        ProfileService::new(repository.clone(), storage.clone())
            .with_empty_needs(config.dashboard.empty_needs),
    );
    let auth_service = Arc::new(AuthService::new(provider.clone(), repository));
    let redirect = VerifyRedirect {
        frontend_url: config.server.frontend_url.clone(),
        production: config.environment.is_production(),
    };

    let app = with_service_routes(profile_service, auth_service, redirect, storage)
        .layer(Extension(SessionVerifier::new(provider)))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        photos = %config.photos.directory.display(),
        "headstart api ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

fn identity_provider(config: &IdentityConfig) -> Arc<dyn IdentityProvider> {
    match config {
        IdentityConfig::Local { jwt_secret } => {
            warn!("using the in-process identity provider; confirmation codes are logged");
            Arc::new(LocalIdentityProvider::new(jwt_secret))
        }
        IdentityConfig::Cognito(cognito) => {
            info!(
                region = %cognito.region,
                user_pool = %cognito.user_pool_id,
                "using cognito identity provider"
            );
            Arc::new(CognitoIdentityProvider::new(cognito))
        }
    }
}
