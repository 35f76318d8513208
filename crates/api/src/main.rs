use anyhow::Context;

use groupvault_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    groupvault_observability::init(config.log_format);

    let app = groupvault_api::app::build_app(config.policy.clone())
        .context("failed to build application")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        quorum = %config.policy.quorum_fraction,
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
