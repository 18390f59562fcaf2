use actix_web::{middleware, web, App, HttpServer};
use chat_tracker_service::{
    build_cors, configure, db::MIGRATOR, logging, metrics, sse, Broadcaster, Config,
    SERVICE_NAME,
};
use db_pool::{create_pool, DbConfig};
use std::io;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = Config::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    logging::init_tracing();
    info!(env = %config.app.env, "Starting {}", SERVICE_NAME);

    let db_config = DbConfig::from_env(SERVICE_NAME).map_err(|e| {
        error!("Database configuration error: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;
    db_config.log_config();

    let pool = match create_pool(db_config).await {
        Ok(pool) => {
            info!("Successfully connected to database");
            pool
        }
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "Database connection failed",
            ));
        }
    };

    if config.run_migrations {
        MIGRATOR.run(&pool).await.map_err(|e| {
            error!(error = %e, "Database migrations failed");
            io::Error::new(io::ErrorKind::Other, e.to_string())
        })?;
        info!("Database migrations applied");
    }

    let broadcaster = Broadcaster::new();
    let heartbeat = config
        .sse
        .heartbeat_interval()
        .map(|period| sse::spawn_heartbeat(broadcaster.clone(), period));
    if heartbeat.is_none() {
        info!("SSE heartbeat disabled");
    }

    let pool_data = web::Data::new(pool.clone());
    let broadcaster_data = web::Data::new(broadcaster.clone());
    let cors_config = config.cors.clone();
    let bind_address = config.app.bind_address();

    info!("Starting HTTP server on {}:{}", bind_address.0, bind_address.1);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(pool_data.clone())
            .app_data(broadcaster_data.clone())
            .wrap(build_cors(&cors_config))
            .wrap(metrics::MetricsMiddleware)
            .wrap(TracingLogger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure)
    })
    .on_connect(sse::watch_peer)
    .bind(bind_address)?
    .disable_signals()
    .run();

    let handle = server.handle();
    let shutdown_broadcaster = broadcaster.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Shutdown signal received");
        // Ending the SSE streams first lets graceful stop drain them
        shutdown_broadcaster.shutdown();
        handle.stop(true).await;
    });

    let result = server.await;

    broadcaster.shutdown();
    if let Some(task) = heartbeat {
        task.abort();
    }
    pool.close().await;
    info!("{} stopped", SERVICE_NAME);

    result
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
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
}
