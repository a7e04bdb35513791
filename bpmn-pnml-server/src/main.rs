use std::sync::Arc;

use bpmn_pnml_core::TransformError;
use bpmn_pnml_server::{app, HttpTokenGate, DEFAULT_CHECK_TOKEN_URL};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // std-XML emission is the only supported mode; the variable must be set
    // explicitly so deployments cannot rely on an accidental default.
    if std::env::var("FORCE_STD_XML").is_err() {
        return Err(TransformError::MissingEnvironmentVariable("FORCE_STD_XML".into()).into());
    }

    let token_url =
        std::env::var("CHECK_TOKEN_URL").unwrap_or_else(|_| DEFAULT_CHECK_TOKEN_URL.to_owned());
    let router = app(Arc::new(HttpTokenGate::new(token_url)));

    let addr = "0.0.0.0:8080";
    tracing::info!("bpmn-pnml transformer listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
