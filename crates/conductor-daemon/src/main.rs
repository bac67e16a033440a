use std::sync::Arc;

use conductor_assembler::{AeadDecryptor, Decryptor};
use conductor_config::ConductorConfig;
use conductor_llm::{ClaudeCliClient, LlmClient};
use conductor_repo::{InMemoryRepository, Repository};
use conductor_worker::{ConversationWorker, TaskWorker};
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conductor_daemon=info,conductor_worker=info".into()),
        )
        .init();

    // explicit path > CONDUCTOR_CONFIG env > ~/.conductor/conductor.toml
    let config_path = std::env::var("CONDUCTOR_CONFIG").ok();
    let config = ConductorConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        ConductorConfig::default()
    });

    // The repository is an abstract port; the in-memory implementation
    // stands in until a SQL-backed `Repository` is wired up here.
    let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());

    let claude_command =
        std::env::var("CONDUCTOR_CLAUDE_COMMAND").unwrap_or_else(|_| "claude".to_string());
    let llm: Arc<dyn LlmClient> = Arc::new(ClaudeCliClient::new(claude_command));

    let decryptor: Arc<dyn Decryptor> = Arc::new(load_decryptor());

    // The skill registry is pluggable, externally-supplied data; this
    // deployment starts with none configured.
    let skill_registry: Arc<[conductor_core::Skill]> = Arc::from(Vec::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let conversation_worker = ConversationWorker::new(
        repo.clone(),
        llm.clone(),
        skill_registry.clone(),
        decryptor.clone(),
        config.worker.clone(),
    );
    let task_worker = TaskWorker::new(
        repo.clone(),
        llm.clone(),
        skill_registry.clone(),
        decryptor.clone(),
        config.worker.clone(),
    );

    let conversation_handle = tokio::spawn(conversation_worker.run(shutdown_rx.clone()));
    let task_handle = tokio::spawn(task_worker.run(shutdown_rx));

    info!("conductor daemon started");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = tokio::join!(conversation_handle, task_handle);
    info!("conductor daemon stopped");
    Ok(())
}

/// Loads the process-wide AES-256-GCM key from `CONDUCTOR_ENCRYPTION_KEY`
/// (64 hex characters). Falls back to a freshly generated key with a
/// warning — fine for a single run with no persisted integrations, but
/// any ciphertext encrypted under a previous key becomes undecryptable.
fn load_decryptor() -> AeadDecryptor {
    match std::env::var("CONDUCTOR_ENCRYPTION_KEY") {
        Ok(hex_key) => match hex::decode(hex_key.trim()) {
            Ok(bytes) if bytes.len() == 32 => {
                let mut key = [0u8; 32];
                key.copy_from_slice(&bytes);
                AeadDecryptor::new(&key)
            }
            _ => {
                warn!("CONDUCTOR_ENCRYPTION_KEY is not 64 hex characters; generating an ephemeral key");
                AeadDecryptor::new(&random_key())
            }
        },
        Err(_) => {
            warn!("CONDUCTOR_ENCRYPTION_KEY not set; generating an ephemeral key for this run");
            AeadDecryptor::new(&random_key())
        }
    }
}

fn random_key() -> [u8; 32] {
    use ring::rand::{SecureRandom, SystemRandom};
    let mut key = [0u8; 32];
    SystemRandom::new()
        .fill(&mut key)
        .expect("system RNG must be available");
    key
}
