mod config;
mod http;

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use api::{
    schema::{AppSchema, DEMO_ADMIN_EMAIL, DEMO_USER_EMAIL, build_schema, seed_demo},
    session::SessionRegistry,
};
use clap::{Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use migration::{Migrator, MigratorTrait};
use platform_db::DatabaseSettings;
use platform_obs::ObsConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::AppConfig;
use crate::http::{AppState, RouterOptions, app_router, shutdown_signal};

#[derive(Parser, Debug)]
#[command(name = "overtime-server", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run HTTP server
    Serve {
        #[arg(long, env = "BIND", default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
    },
    /// Apply or roll back migrations
    Migrate {
        #[arg(value_enum, default_value_t = MigrateAction::Up)]
        action: MigrateAction,
    },
    /// Seed demo accounts, employees and overtime records
    Seed,
    /// Print GraphQL SDL
    PrintSchema,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MigrateAction {
    Up,
    Down,
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    platform_obs::init_tracing(ObsConfig::from_env())?;
    let outcome = run(Cli::parse()).await;
    platform_obs::shutdown_tracing();
    outcome
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::from_env()?;
    let settings = DatabaseSettings::from_env();
    let db = Arc::new(
        platform_db::connect(&settings)
            .await
            .context("failed to connect to database")?,
    );
    let auth = Arc::new(config.auth.clone());
    let sessions = SessionRegistry::new(auth.inactivity_timeout);

    match cli.cmd {
        Cmd::Migrate { action } => {
            match action {
                MigrateAction::Up => Migrator::up(db.as_ref(), None).await?,
                MigrateAction::Down => Migrator::down(db.as_ref(), None).await?,
                MigrateAction::Reset => Migrator::reset(db.as_ref()).await?,
            }
            info!(?action, "migrations applied");
            Ok(())
        }
        Cmd::Seed => {
            Migrator::up(db.as_ref(), None).await?;
            let seeded = seed_demo(db.as_ref())
                .await
                .context("seed data failed")?;
            info!(
                employees = seeded.employees.len(),
                records = seeded.records.len(),
                admin = DEMO_ADMIN_EMAIL,
                user = DEMO_USER_EMAIL,
                "demo data seeded"
            );
            Ok(())
        }
        Cmd::PrintSchema => {
            let AppSchema(schema) = build_schema(db, auth, sessions, config.graph);
            println!("{}", schema.sdl());
            Ok(())
        }
        Cmd::Serve { bind } => {
            Migrator::up(db.as_ref(), None)
                .await
                .context("failed to apply migrations")?;
            let AppSchema(schema) =
                build_schema(db.clone(), auth.clone(), sessions.clone(), config.graph);
            let state = AppState {
                schema,
                db,
                auth,
                sessions,
            };
            let options = RouterOptions {
                graphiql: config.graphiql,
                cors_origins: config.cors_origins,
            };
            let app = app_router(state, &options);

            let listener = TcpListener::bind(bind)
                .await
                .with_context(|| format!("failed to bind {bind}"))?;
            info!("listening on http://{}", bind);
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .await?;
            Ok(())
        }
    }
}
