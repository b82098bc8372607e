#[macro_use]
extern crate tracing;

mod api;
mod error;
mod models;

use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use clap::Parser;
use credits::{CreditService, RailsConfig};
use models::Storage;
use redis::Client as RedisClient;
use sqlx::{
    any::Any as SqlxAny,
    migrate::MigrateDatabase,
    postgres::PgPoolOptions,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::level_filters::LevelFilter;
use wallet::WalletApi;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Command {
    /// Service port
    #[arg(long, env = "PORT", default_value_t = 9000)]
    port: u16,

    /// Database URL
    #[arg(long, env = "DATABASE_URL")]
    database: String,

    /// Redis URL
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis: String,

    /// Apikey for auth
    #[arg(long, env = "APIKEY")]
    apikey: String,

    /// Wallet/payment provider API base
    #[arg(
        long,
        env = "WALLET_API_URL",
        default_value = "https://alpha-wallet.agentlayer.xyz/api"
    )]
    wallet_api: String,

    /// Outbound credential for the EVM rail
    #[arg(long, env = "AGENT_WALLET_KEY_EVM", default_value = "")]
    wallet_key_evm: String,

    /// Outbound credential for the XRP rail
    #[arg(long, env = "AGENT_WALLET_KEY_XRP", default_value = "")]
    wallet_key_xrp: String,

    /// Rails configure file path
    #[arg(long, env = "RAILS_CONFIG", default_value = "config.toml")]
    rails_config: String,
}

pub struct AppState {
    service: CreditService<Storage, WalletApi>,
    redis: RedisClient,
    apikey: String,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .init();
    sqlx::any::install_default_drivers();

    let args = Command::parse();
    let rails_str = std::fs::read_to_string(&args.rails_config).unwrap();
    let rails_config: RailsConfig = toml::from_str(&rails_str).unwrap();

    // setup database & init
    let _ = SqlxAny::create_database(&args.database).await;
    let db = match PgPoolOptions::new()
        .max_connections(5)
        .connect(&args.database)
        .await
    {
        Ok(pool) => {
            info!("✅ Connection to the database is successful!");
            pool
        }
        Err(err) => {
            error!("🔥 Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    sqlx::migrate!().run(&db).await.expect("Migrations failed");

    // setup redis connection
    let redis = match RedisClient::open(args.redis.clone()) {
        Ok(client) => {
            // try connect to check
            let _ = client.get_multiplexed_async_connection().await.unwrap();
            info!("✅ Redis connection established!");
            client
        }
        Err(err) => {
            error!("🔥 Failed to connect to Redis: {:?}", err);
            std::process::exit(1);
        }
    };

    let gateway = WalletApi::new(&args.wallet_api, &args.wallet_key_evm, &args.wallet_key_xrp);
    let service = CreditService::new(Storage { db }, gateway, rails_config).unwrap();

    let app_state = Arc::new(AppState {
        service,
        redis,
        apikey: args.apikey,
    });

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/callback/payment/{rail}", post(api::payment_callback))
        .route("/purchases/propose", post(api::propose_purchase))
        .route("/purchases/confirm", post(api::confirm_purchase))
        .route("/purchases/{id}", get(api::get_purchase))
        .route("/credits/{user}", get(api::get_credits))
        .route("/credits/{user}/spend", post(api::spend_credits))
        .route("/methods/{user}", get(api::list_methods))
        .with_state(app_state)
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(&addr).await.unwrap();
    info!("🚀 Server is running on 0.0.0.0:{}", args.port);

    axum::serve(listener, router).await.unwrap()
}
