use std::sync::Arc;

use guest_assist::classify::ClassifyClient;
use guest_assist::config::Config;
use guest_assist::delivery::{
    DeliveryRouter, EmailDelivery, EmailDeliveryConfig, LogDelivery, SmsDeliveryConfig,
    WebhookSmsDelivery,
};
use guest_assist::http::api_routes;
use guest_assist::intake::{CallIntake, MessageIntake};
use guest_assist::llm::create_provider;
use guest_assist::model::Channel;
use guest_assist::store::{Database, LibSqlBackend};
use guest_assist::tasks::spawn_overdue_sweep;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    eprintln!("🏨 Guest Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   API: http://{}/api", config.bind_addr);

    // ── LLM provider & classifier ───────────────────────────────────────
    let llm = create_provider(&config.llm)?;
    let classifier = Arc::new(ClassifyClient::new(llm, config.classify_timeout));

    // ── Database ────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&config.db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", config.db_path, e);
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.db_path);

    // ── Delivery providers ──────────────────────────────────────────────
    let mut delivery = DeliveryRouter::new(Arc::clone(&db));
    let mut active_channels: Vec<&str> = Vec::new();

    if let Some(sms_config) = SmsDeliveryConfig::from_env() {
        delivery.register(Arc::new(WebhookSmsDelivery::new(
            Channel::Sms,
            sms_config.clone(),
        )));
        delivery.register(Arc::new(WebhookSmsDelivery::new(
            Channel::Whatsapp,
            sms_config,
        )));
        active_channels.push("sms");
        active_channels.push("whatsapp");
    }
    if let Some(email_config) = EmailDeliveryConfig::from_env() {
        delivery.register(Arc::new(EmailDelivery::new(email_config)));
        active_channels.push("email");
    }
    // Chat widget renders straight from the database.
    delivery.register(Arc::new(LogDelivery::new(Channel::WebChat)));
    active_channels.push("web_chat");
    eprintln!("   Delivery: {}", active_channels.join(", "));

    // ── Pipelines ───────────────────────────────────────────────────────
    let delivery = Arc::new(delivery);
    let messages = Arc::new(MessageIntake::new(
        Arc::clone(&db),
        Arc::clone(&classifier),
        Arc::clone(&delivery),
    ));
    let calls = Arc::new(CallIntake::new(Arc::clone(&db), classifier));

    // ── Overdue sweep ───────────────────────────────────────────────────
    let _sweep_handle = spawn_overdue_sweep(Arc::clone(&db), config.sweep_interval);
    eprintln!(
        "   Overdue sweep: every {}s",
        config.sweep_interval.as_secs()
    );

    // ── HTTP server ─────────────────────────────────────────────────────
    let app = api_routes(db, messages, calls);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "HTTP server started");
    axum::serve(listener, app).await?;

    Ok(())
}
