use authguard::db::AUTH_TABLE;
use authguard::{Config, MySqlBackend, SchemaGuardian};
use mimalloc::MiMalloc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        loglevel = %cfg.loglevel,
        on_nonconformance = ?cfg.on_nonconformance,
        "starting schema bootstrap"
    );

    let backend = MySqlBackend::connect(&cfg.database_url).await?;
    let guardian = SchemaGuardian::new(backend, cfg.on_nonconformance);

    if guardian.ensure_table().await? {
        info!(table = AUTH_TABLE, "table ready");
        Ok(())
    } else {
        error!(
            table = AUTH_TABLE,
            "table still does not conform after repair; inspect it manually"
        );
        Err(format!("`{AUTH_TABLE}` does not conform after repair").into())
    }
}
