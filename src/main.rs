use std::{future::IntoFuture, process, sync::Arc};

use leafline::{
    application::{
        display::DisplaySurface,
        error::AppError,
        generated_image::{ImageSession, ImageWorkflow},
        health::HealthProbe,
    },
    config,
    domain::{health::HealthVerdict, product::ProductImageRequest},
    infra::{
        error::InfraError,
        gateway::FunctionsGateway,
        http::{self, HealthState, ImageState, RouterState},
        partner::HttpPartnerApi,
        storage::PublicObjectStore,
        telemetry,
    },
};
use serde::Serialize;
use tokio::sync::watch;
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
        config::Command::Health(_) => run_health(settings).await,
        config::Command::Image(args) => run_image(settings, *args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let router_state = RouterState {
        health: HealthState {
            probe: Arc::new(build_health_probe(&settings)?),
        },
        images: ImageState {
            workflow: Arc::new(build_image_workflow(&settings)?),
            auto_generate: settings.images.auto_generate,
        },
    };
    let router = http::build_router(router_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "leafline::serve",
        addr = %settings.server.addr,
        auto_generate = settings.images.auto_generate,
        "listening"
    );

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(target = "leafline::serve", error = %err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!(target = "leafline::serve", "shutdown requested, draining connections");
            let _ = stop_tx.send(true);
        })
        .into_future();

    let grace = settings.server.graceful_shutdown;
    let drain_deadline = async move {
        if stop_rx.wait_for(|stopping| *stopping).await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = drain_deadline => {
            warn!(
                target = "leafline::serve",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

async fn run_health(settings: config::Settings) -> Result<(), AppError> {
    let probe = build_health_probe(&settings)?;
    let report = probe
        .run()
        .await
        .map_err(|err| AppError::unexpected(format!("health probe failed: {err}")))?;

    print_json(&report)?;

    if report.status == HealthVerdict::Unhealthy {
        return Err(AppError::unexpected(format!(
            "partner API is {}",
            report.status
        )));
    }
    Ok(())
}

async fn run_image(settings: config::Settings, args: config::ImageArgs) -> Result<(), AppError> {
    let request = ProductImageRequest::new(args.product_id, args.name, args.original_url);
    request.validate()?;

    let workflow = Arc::new(build_image_workflow(&settings)?);
    let session = ImageSession::new(workflow, request, settings.images.auto_generate);
    session.load().await;
    if args.generate && session.state().image_url.is_none() {
        session.generate().await;
    }

    let state = session.state();
    let request = session.request();
    let surface = DisplaySurface::new();
    let view = surface.render(&request, &state);
    if let Some(url) = surface.loaded_generated_url(&state) {
        info!(
            target = "leafline::images",
            product_id = %request.product_id,
            url,
            "generated image available"
        );
    }
    print_json(&view)?;

    match state.error {
        Some(message) => Err(AppError::unexpected(format!(
            "image generation failed: {message}"
        ))),
        None => Ok(()),
    }
}

fn build_health_probe(settings: &config::Settings) -> Result<HealthProbe, AppError> {
    let api = HttpPartnerApi::new(&settings.partner.api_url)?;
    Ok(
        HealthProbe::new(Arc::new(api), settings.partner.credentials.clone())
            .with_timeout(settings.partner.timeout),
    )
}

fn build_image_workflow(settings: &config::Settings) -> Result<ImageWorkflow, AppError> {
    let storage_url = settings
        .storage
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("storage.url is not set"))?;
    let gateway_url = settings.gateway.url.as_ref().unwrap_or(storage_url);

    let store = PublicObjectStore::new(
        storage_url,
        &settings.storage.bucket,
        settings.storage.probe_timeout,
    )?;
    let gateway = FunctionsGateway::new(
        gateway_url,
        &settings.gateway.function,
        settings.gateway.token.clone(),
        settings.gateway.timeout,
    )?;
    info!(
        target = "leafline::images",
        bucket = %settings.storage.bucket,
        endpoint = gateway.endpoint(),
        "image workflow configured"
    );

    Ok(ImageWorkflow::new(Arc::new(store), Arc::new(gateway)))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
