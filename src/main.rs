use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portal::models::auth_app::{generate_token, parse_ip_list, IpListInput, NewAuthApp};
use portal::models::upstream_token::mask;
use portal::models::user::{hash_password, NewStaffUser};
use portal::proxy::upstream::JtbClient;
use portal::session::SessionStore;
use portal::store::memory::MemoryStore;
use portal::store::postgres::PgStore;
use portal::store::PortalStore;
use portal::{cli, config, jobs, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    // OTLP export only when a collector is configured.
    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "sbir-portal"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "portal=debug,sbir_portal=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        Some(cli::Commands::App { command }) => {
            let db = connect_db(&cfg).await?;
            handle_app_command(&db, command).await
        }
        Some(cli::Commands::User { command }) => {
            let db = connect_db(&cfg).await?;
            handle_user_command(&db, command).await
        }
        Some(cli::Commands::Jtb { command }) => handle_jtb_command(&cfg, command).await,
        None => run_server(cfg, None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: Option<u16>) -> anyhow::Result<()> {
    let store: Arc<dyn PortalStore> = match cfg.database_url.as_deref() {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let db = PgStore::connect(url).await?;
            tracing::info!("Running migrations...");
            db.migrate().await?;
            Arc::new(db)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store (data is lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    let redis = match cfg.redis_url.as_deref() {
        Some(url) => {
            tracing::info!("Connecting to Redis...");
            let client = redis::Client::open(url)?;
            Some(redis::aio::ConnectionManager::new(client).await?)
        }
        None => None,
    };
    let sessions = SessionStore::new(cfg.session_ttl_secs, redis);
    let jtb = JtbClient::new(&cfg.jtb)?;
    let port = port.unwrap_or(cfg.port);

    let state = Arc::new(AppState {
        store,
        sessions: sessions.clone(),
        jtb,
        config: cfg,
    });
    let app = portal::app_router(state);

    jobs::session_sweep::spawn(sessions);
    tracing::info!("Background session sweep started (every 60s)");

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("SBIR portal listening on {}", addr);
    // Peer addresses feed the Access Gate's IP whitelist check.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn connect_db(cfg: &config::Config) -> anyhow::Result<PgStore> {
    let url = cfg
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set for this command")?;
    let db = PgStore::connect(url).await?;
    db.migrate().await?;
    Ok(db)
}

async fn handle_app_command(db: &PgStore, cmd: cli::AppCommands) -> anyhow::Result<()> {
    match cmd {
        cli::AppCommands::Create {
            name,
            ips,
            description,
        } => {
            let whitelisted_ips = parse_ip_list(IpListInput::List(ips))
                .map_err(|bad| anyhow::anyhow!("'{}' is not a valid IP address", bad))?;
            let app = db
                .insert_auth_app(&NewAuthApp {
                    app_name: name,
                    token: generate_token(),
                    whitelisted_ips,
                    description,
                })
                .await?;
            println!("App created successfully!");
            println!("ID:    {}", app.id);
            println!("Token: {}", app.token);
            println!("IPs:   {}", app.whitelisted_ips.join(", "));
        }
        cli::AppCommands::List => {
            let apps = db.list_auth_apps().await?;
            println!(
                "{:<6} {:<30} {:<8} {:<10} {:<30}",
                "ID", "NAME", "ACTIVE", "REQUESTS", "IPS"
            );
            for app in apps {
                println!(
                    "{:<6} {:<30} {:<8} {:<10} {:<30}",
                    app.id,
                    app.app_name,
                    app.status,
                    app.request_count,
                    app.whitelisted_ips.join(",")
                );
            }
        }
        cli::AppCommands::Toggle { id } => match db.toggle_auth_app_status(id).await? {
            Some(active) => println!("App {} is now {}", id, if active { "active" } else { "inactive" }),
            None => anyhow::bail!("app {} not found", id),
        },
        cli::AppCommands::Delete { id } => {
            if !db.delete_auth_app(id).await? {
                anyhow::bail!("app {} not found", id);
            }
            println!("App {} deleted", id);
        }
    }
    Ok(())
}

async fn handle_user_command(db: &PgStore, cmd: cli::UserCommands) -> anyhow::Result<()> {
    match cmd {
        cli::UserCommands::Create {
            name,
            email,
            password,
        } => {
            if password.len() < 8 {
                anyhow::bail!("password must be at least 8 characters");
            }
            let id = db
                .upsert_user(&NewStaffUser {
                    name,
                    email: email.trim().to_string(),
                    password_hash: hash_password(&password)?,
                })
                .await?;
            println!("Staff account {} saved (id {})", email.trim(), id);
        }
    }
    Ok(())
}

async fn handle_jtb_command(cfg: &config::Config, cmd: cli::JtbCommands) -> anyhow::Result<()> {
    match cmd {
        cli::JtbCommands::Token => {
            let client = JtbClient::new(&cfg.jtb)?;
            match client.request_token().await {
                Some(token) => println!("Token received: {}", mask(&token)),
                None => anyhow::bail!("the registry did not issue a token; check JTB_EMAIL / JTB_PASSWORD"),
            }
        }
    }
    Ok(())
}
