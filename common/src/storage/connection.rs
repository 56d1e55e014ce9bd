//! The Connection Manager: a single logical session to the storage engine
//! with auto-reconnect, idle heartbeats, and a monotonic `lastActive`
//! timestamp, so a dropped transport mid-session doesn't require a
//! process restart to recover from.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use surrealdb::engine::any::{connect, Any};
use surrealdb::opt::auth::{Database, Root};
use surrealdb::{Notification, Surreal};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tracing::{error, info, warn};

use crate::config::AuthScope;
use crate::error::MemoryError;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const HEARTBEAT_IDLE_THRESHOLD: Duration = Duration::from_secs(5);
const RECONNECT_INITIAL_DELAY_MS: u64 = 1_000;
const RECONNECT_MAX_DELAY_MS: u64 = 30_000;
const RECONNECT_MAX_ATTEMPTS: usize = 10;

/// Credentials and addressing the manager needs to (re)establish a session.
#[derive(Clone, Debug)]
pub struct ConnectionSettings {
    pub address: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub auth_scope: AuthScope,
}

/// A single logical session to the storage engine.
///
/// Safe to share behind an `Arc` across every concurrent task issuing
/// queries: the underlying `Surreal<Any>` client multiplexes
/// requests itself, `last_active` is a lock-free atomic, and reconnection
/// is serialized by an `RwLock` so concurrent callers see either the old
/// healthy session or wait for the new one, never a half-initialized one.
pub struct ConnectionManager {
    client: RwLock<Surreal<Any>>,
    settings: ConnectionSettings,
    last_active: AtomicI64,
    heartbeat: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    is_memory: bool,
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.heartbeat.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

impl ConnectionManager {
    /// Opens a new session, signs in at the configured scope, and selects
    /// the namespace/database, then starts the manager's own heartbeat task.
    pub async fn connect(settings: ConnectionSettings) -> Result<Arc<Self>, MemoryError> {
        let is_memory = settings.address.starts_with("mem:");
        let client = Self::open_session(&settings).await?;

        let manager = Arc::new(Self {
            client: RwLock::new(client),
            last_active: AtomicI64::new(now_millis()),
            heartbeat: tokio::sync::Mutex::new(None),
            is_memory,
            settings,
        });

        // Heartbeat keeps the socket alive across long external operations
        // (LLM calls, ingestion) without contending with normal traffic.
        // Held as a weak reference so the task never keeps the manager alive.
        let weak = Arc::downgrade(&manager);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
            loop {
                interval.tick().await;
                let Some(manager) = weak.upgrade() else {
                    return;
                };
                manager.heartbeat_tick().await;
            }
        });
        *manager.heartbeat.lock().await = Some(handle);

        Ok(manager)
    }

    async fn open_session(settings: &ConnectionSettings) -> Result<Surreal<Any>, MemoryError> {
        let db = connect(&settings.address)
            .await
            .map_err(MemoryError::from)?;

        match settings.auth_scope {
            AuthScope::Root => {
                db.signin(Root {
                    username: &settings.username,
                    password: &settings.password,
                })
                .await
                .map_err(MemoryError::from)?;
            }
            AuthScope::Database => {
                db.signin(Database {
                    namespace: &settings.namespace,
                    database: &settings.database,
                    username: &settings.username,
                    password: &settings.password,
                })
                .await
                .map_err(MemoryError::from)?;
            }
        }

        db.use_ns(&settings.namespace)
            .use_db(&settings.database)
            .await
            .map_err(MemoryError::from)?;

        Ok(db)
    }

    async fn heartbeat_tick(&self) {
        let idle_for = now_millis().saturating_sub(self.last_active.load(Ordering::Relaxed));
        if idle_for < HEARTBEAT_IDLE_THRESHOLD.as_millis() as i64 {
            return;
        }

        let result = tokio::time::timeout(Duration::from_secs(5), async {
            self.client.read().await.query("RETURN 1").await
        })
        .await;

        match result {
            Ok(Ok(_)) => self.touch(),
            Ok(Err(err)) => warn!(error = %err, "heartbeat query failed"),
            Err(_) => warn!("heartbeat query timed out"),
        }
    }

    fn touch(&self) {
        self.last_active.store(now_millis(), Ordering::Relaxed);
    }

    /// Runs a statement (possibly multi-statement) against the session,
    /// reconnecting with backoff first if the session is known to be down.
    pub async fn query(&self, statement: impl Into<String>) -> Result<surrealdb::Response, MemoryError> {
        let statement = statement.into();
        self.touch();

        let client = self.client.read().await;
        match client.query(statement.clone()).await {
            Ok(response) => Ok(response),
            Err(err) => {
                drop(client);
                warn!(error = %err, "query failed, attempting reconnect");
                self.reconnect().await?;
                self.touch();
                self.client
                    .read()
                    .await
                    .query(statement)
                    .await
                    .map_err(MemoryError::from)
            }
        }
    }

    /// Direct access to the underlying client for query builders that need
    /// typed bind/select/create helpers beyond raw `query`.
    pub async fn client(&self) -> tokio::sync::RwLockReadGuard<'_, Surreal<Any>> {
        self.touch();
        self.client.read().await
    }

    /// Non-blocking status probe ( `Healthy()`).
    pub async fn healthy(&self) -> bool {
        if self.is_memory {
            return true;
        }
        tokio::time::timeout(Duration::from_secs(2), async {
            self.client.read().await.query("RETURN 1").await
        })
        .await
        .is_ok_and(|r| r.is_ok())
    }

    /// Reopens the underlying socket with exponential backoff (1s → 30s,
    /// 10 attempts), re-authenticating and re-selecting the namespace and
    /// database before the session is exposed as healthy again.
    async fn reconnect(&self) -> Result<(), MemoryError> {
        if self.is_memory {
            // The `mem://` engine has no transport to lose; nothing to do.
            return Ok(());
        }

        let strategy = ExponentialBackoff::from_millis(RECONNECT_INITIAL_DELAY_MS)
            .max_delay(Duration::from_millis(RECONNECT_MAX_DELAY_MS))
            .take(RECONNECT_MAX_ATTEMPTS);

        let settings = self.settings.clone();
        let new_client = Retry::spawn(strategy, || {
            let settings = settings.clone();
            async move { Self::open_session(&settings).await }
        })
        .await?;

        *self.client.write().await = new_client;
        info!("storage session reconnected");
        Ok(())
    }

    /// Listens for change notifications on a table, used by the ingest job
    /// worker loop to pick up newly created jobs without polling.
    pub async fn listen<T>(
        &self,
        table: &str,
    ) -> Result<impl futures::Stream<Item = Result<Notification<T>, surrealdb::Error>>, MemoryError>
    where
        T: for<'de> serde::Deserialize<'de> + std::marker::Unpin,
    {
        self.touch();
        self.client
            .read()
            .await
            .select(table)
            .live()
            .await
            .map_err(MemoryError::from)
    }

    /// Graceful shutdown. The underlying client has a known race on
    /// explicit close; callers are encouraged to let process exit close
    /// the socket instead of invoking this outside of tests.
    pub async fn close(&self) {
        if let Some(handle) = self.heartbeat.lock().await.take() {
            handle.abort();
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
