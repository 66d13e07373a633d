use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use story_api_rest::{AppState, router};
use story_core::config::{
    flag_from_env_value, opening_lines_from_env_value, setting_from_env_value,
};
use story_core::{
    CoreConfig, DEFAULT_STORY_DATA_DIR, EventRelay, NamePolicy, RelayFailurePolicy, Separator,
    StoryService, StoryStore, SystemClock,
};

/// Main entry point for the story service
///
/// Opens the story store and the UDP relay, then serves the REST API until Ctrl-C.
///
/// # Environment Variables
/// - `PORT`: HTTP listen port on all interfaces (default: 3000)
/// - `RELAY_HOST`: visualisation consumer host, falling back to `TD_HOST` (default: "127.0.0.1")
/// - `RELAY_PORT`: visualisation consumer UDP port, falling back to `TD_PORT` (default: 7000)
/// - `STORY_DATA_DIR`: directory for story documents and author ledgers (default: "story_data")
/// - `STORY_NAME_POLICY`: "enforced" or "advisory" (default: "enforced")
/// - `STORY_SEPARATOR`: "space" or "comma-newline" (default: "space")
/// - `STORY_RELAY_FAILURE`: "warn" or "fail" (default: "warn")
/// - `STORY_RELAY_INCLUDE_STORY`: include the full story in notifications (default: true)
/// - `STORY_OPENING_LINES_FILE`: file with seven opening lines, Sunday first (optional)
///
/// # Returns
/// * `Ok(())` - If the server starts and shuts down cleanly
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("story_run=info".parse()?)
                .add_directive("story_core=info".parse()?)
                .add_directive("story_api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let rest_addr = SocketAddr::from(([0, 0, 0, 0], port));

    let relay_host =
        env_with_fallback("RELAY_HOST", "TD_HOST").unwrap_or_else(|| "127.0.0.1".into());
    let relay_port: u16 = env_with_fallback("RELAY_PORT", "TD_PORT")
        .unwrap_or_else(|| "7000".into())
        .parse()?;
    let relay_target = tokio::net::lookup_host((relay_host.as_str(), relay_port))
        .await?
        .next()
        .ok_or_else(|| anyhow::anyhow!("relay host did not resolve: {}", relay_host))?;

    let story_data_dir =
        std::env::var("STORY_DATA_DIR").unwrap_or_else(|_| DEFAULT_STORY_DATA_DIR.into());

    let cfg = Arc::new(
        CoreConfig::new(PathBuf::from(story_data_dir))?
            .with_name_policy(setting_from_env_value::<NamePolicy>(
                std::env::var("STORY_NAME_POLICY").ok(),
            )?)
            .with_separator(setting_from_env_value::<Separator>(
                std::env::var("STORY_SEPARATOR").ok(),
            )?)
            .with_relay_failure_policy(setting_from_env_value::<RelayFailurePolicy>(
                std::env::var("STORY_RELAY_FAILURE").ok(),
            )?)
            .with_relay_include_story(flag_from_env_value(
                std::env::var("STORY_RELAY_INCLUDE_STORY").ok(),
                true,
            )?)
            .with_opening_lines(opening_lines_from_env_value(
                std::env::var("STORY_OPENING_LINES_FILE").ok(),
            )?),
    );

    let store = Arc::new(StoryStore::open(cfg.clone())?);
    let relay = Arc::new(EventRelay::bind(relay_target, cfg.relay_include_story()).await?);

    tracing::info!("++ Starting story REST on {}", rest_addr);
    tracing::info!("++ Relaying contributions to udp://{}", relay_target);
    tracing::info!(
        "++ Story is being saved to: {} (separator: {}, names: {:?}, relay failures: {:?})",
        cfg.story_data_dir().display(),
        cfg.separator(),
        cfg.name_policy(),
        cfg.relay_failure_policy()
    );

    let story_service = StoryService::new(cfg, store, relay, Arc::new(SystemClock));
    let app = router(AppState { story_service });

    let listener = tokio::net::TcpListener::bind(rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("-- Story service stopped");
    Ok(())
}

/// Reads `name`, or `legacy` when `name` is unset or blank.
fn env_with_fallback(name: &str, legacy: &str) -> Option<String> {
    first_non_blank(std::env::var(name).ok(), std::env::var(legacy).ok())
}

fn first_non_blank(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    [primary, fallback]
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_non_blank_prefers_primary_then_legacy() {
        assert_eq!(
            first_non_blank(Some("relay.local".into()), Some("td.local".into())),
            Some("relay.local".into())
        );
        assert_eq!(
            first_non_blank(None, Some("td.local".into())),
            Some("td.local".into())
        );
        assert_eq!(
            first_non_blank(Some("  ".into()), Some("7001".into())),
            Some("7001".into())
        );
        assert_eq!(first_non_blank(None, Some(String::new())), None);
    }
}
