use std::{net::SocketAddr, process, sync::Arc, time::Duration};

use menuqr::{
    application::{
        access::PlanGate,
        auth::AuthService,
        catalog::CatalogService,
        error::AppError,
        health::{DatabaseProbe, HealthService, MemoryProbe},
        menus::MenuService,
        promotions::PromotionService,
        public_menu::PublicMenuService,
        qr::QrService,
        realtime::{Broadcaster, DisabledBroadcaster},
        repos::{
            CategoriesRepo, MenusRepo, ProductsRepo, PromotionsRepo, UsersRepo, ViewsRepo,
        },
        side_effects::{DispatchMode, SideEffects},
        uploads::{ImageHost, UploadService},
        views::ViewService,
    },
    cache::{LocalMenuCache, MenuCache, RedisMenuCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AppState, RateLimiter},
        realtime::PusherBroadcaster,
        system::SysinfoMemoryProbe,
        telemetry,
        uploads::CloudinaryClient,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings).await?;
    info!(target = "menuqr::migrate", "Migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let cache = init_cache(&settings).await;
    let broadcaster = init_broadcaster(&settings)?;
    let image_host = init_image_host(&settings)?;

    let state = build_app_state(&settings, repositories, cache, broadcaster, image_host)?;

    let limiter = state.rate_limiter.clone();
    let prune_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            limiter.prune();
        }
    });

    let result = serve_http(&settings, state).await;

    prune_handle.abort();
    let _ = prune_handle.await;

    result
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

/// Redis when configured and reachable, otherwise the in-process store.
async fn init_cache(settings: &config::Settings) -> Arc<dyn MenuCache> {
    let local_capacity = settings.cache.local_capacity.get();

    let Some(url) = settings.cache.redis_url.as_deref() else {
        info!(
            target = "menuqr::cache",
            capacity = local_capacity,
            "Redis not configured; using in-process cache"
        );
        return Arc::new(LocalMenuCache::new(local_capacity));
    };

    match RedisMenuCache::connect(url).await {
        Ok(cache) => {
            info!(target = "menuqr::cache", "Connected to Redis");
            Arc::new(cache)
        }
        Err(err) => {
            warn!(
                target = "menuqr::cache",
                error = %err,
                "Redis unavailable; falling back to in-process cache"
            );
            Arc::new(LocalMenuCache::new(local_capacity))
        }
    }
}

fn init_broadcaster(settings: &config::Settings) -> Result<Arc<dyn Broadcaster>, AppError> {
    match settings.realtime.clone() {
        Some(pusher) => Ok(Arc::new(PusherBroadcaster::new(pusher)?)),
        None => {
            info!(
                target = "menuqr::realtime",
                "Pusher not configured; broadcasts are disabled"
            );
            Ok(Arc::new(DisabledBroadcaster))
        }
    }
}

fn init_image_host(
    settings: &config::Settings,
) -> Result<Option<Arc<dyn ImageHost>>, AppError> {
    match settings.uploads.cloudinary.clone() {
        Some(cloudinary) => Ok(Some(Arc::new(CloudinaryClient::new(cloudinary)?))),
        None => {
            info!(
                target = "menuqr::uploads",
                "Cloudinary not configured; uploads are disabled"
            );
            Ok(None)
        }
    }
}

fn build_app_state(
    settings: &config::Settings,
    repositories: Arc<PostgresRepositories>,
    cache: Arc<dyn MenuCache>,
    broadcaster: Arc<dyn Broadcaster>,
    image_host: Option<Arc<dyn ImageHost>>,
) -> Result<AppState, AppError> {
    let jwt_secret = settings
        .auth
        .jwt_secret
        .as_deref()
        .ok_or_else(|| InfraError::configuration("auth.jwt_secret is not configured"))
        .map_err(AppError::from)?;

    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let menus_repo: Arc<dyn MenusRepo> = repositories.clone();
    let categories_repo: Arc<dyn CategoriesRepo> = repositories.clone();
    let products_repo: Arc<dyn ProductsRepo> = repositories.clone();
    let promotions_repo: Arc<dyn PromotionsRepo> = repositories.clone();
    let views_repo: Arc<dyn ViewsRepo> = repositories.clone();
    let database_probe: Arc<dyn DatabaseProbe> = repositories.clone();
    let memory_probe: Arc<dyn MemoryProbe> = Arc::new(SysinfoMemoryProbe::new());

    let effects = SideEffects::new(cache, broadcaster, DispatchMode::Background);
    let plans = PlanGate::new(users_repo.clone());

    let menus = MenuService::new(
        menus_repo.clone(),
        plans.clone(),
        effects.clone(),
        settings.cache.public_menu_ttl,
    );
    let catalog = CatalogService::new(
        categories_repo,
        products_repo,
        plans.clone(),
        menus.clone(),
    );
    let promotions = PromotionService::new(promotions_repo, plans.clone(), menus.clone());
    let views = ViewService::new(
        menus_repo.clone(),
        views_repo,
        plans,
        effects.clone(),
        settings.cache.stats_ttl,
    );
    let public_menus =
        PublicMenuService::new(menus_repo, effects, settings.cache.public_menu_ttl);

    let max_upload_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::validation("uploads.max_request_bytes exceeds usize"))?;

    Ok(AppState {
        auth: Arc::new(AuthService::new(
            users_repo,
            jwt_secret,
            settings.auth.token_ttl,
            settings.auth.bcrypt_cost,
        )),
        menus: Arc::new(menus),
        catalog: Arc::new(catalog),
        promotions: Arc::new(promotions),
        views: Arc::new(views),
        public_menus: Arc::new(public_menus),
        qr: Arc::new(QrService::new(settings.server.public_base_url.clone())),
        uploads: Arc::new(UploadService::new(
            image_host,
            settings.uploads.root_folder.clone(),
            max_upload_bytes,
        )),
        health: Arc::new(HealthService::new(
            database_probe,
            memory_probe,
            settings.health.memory_warning_percent,
        )),
        rate_limiter: Arc::new(RateLimiter::new(
            Duration::from_secs(u64::from(settings.rate_limit.window_seconds.get())),
            settings.rate_limit.max_requests.get(),
        )),
    })
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "menuqr::http",
        addr = %settings.server.addr,
        "Listening"
    );

    let grace = settings.server.graceful_shutdown;
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    let server = tokio::spawn(async move { server.await });
    tokio::pin!(server);

    tokio::select! {
        joined = &mut server => {
            return joined
                .map_err(|err| AppError::unexpected(format!("server task failed: {err}")))?
                .map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        _ = shutdown_signal() => {}
    }

    match tokio::time::timeout(grace, &mut server).await {
        Ok(joined) => joined
            .map_err(|err| AppError::unexpected(format!("server task failed: {err}")))?
            .map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(
                target = "menuqr::http",
                grace_seconds = grace.as_secs(),
                "Graceful shutdown timed out; aborting open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "menuqr::http", error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "menuqr::http", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(target = "menuqr::http", "Shutdown signal received");
}
