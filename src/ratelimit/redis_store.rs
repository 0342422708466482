//! Redis-backed counter store.

use async_trait::async_trait;
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info, trace};

use super::store::{CounterStore, StoreError};

/// A counter store shared by every service instance through Redis.
///
/// The connection manager reconnects on its own; a failed command is
/// returned to the caller and never retried here.
#[derive(Clone)]
pub struct RedisCounterStore<C = ConnectionManager> {
    conn: C,
}

impl RedisCounterStore {
    /// Connect to the Redis server at `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to Redis counter store");
        Ok(Self::with_connection(conn))
    }
}

impl<C> RedisCounterStore<C>
where
    C: ConnectionLike + Clone + Send + Sync,
{
    /// Use an already established connection.
    pub fn with_connection(conn: C) -> Self {
        Self { conn }
    }
}

/// Window length as sent with `PEXPIRE`.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// Build the MULTI/EXEC transaction for one increment.
///
/// `PEXPIRE .. NX` leaves an existing TTL untouched, so only the request
/// that creates the counter starts the window.
fn increment_pipeline(key: &str, ttl: Duration) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .incr(key, 1u64)
        .cmd("PEXPIRE")
        .arg(key)
        .arg(ttl_millis(ttl))
        .arg("NX")
        .ignore();
    pipe
}

#[async_trait]
impl<C> CounterStore for RedisCounterStore<C>
where
    C: ConnectionLike + Clone + Send + Sync,
{
    async fn get_count(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let count: Option<u64> = conn.get(key).await?;
        trace!(key = %key, count = ?count, "Read counter");
        Ok(count.unwrap_or(0))
    }

    async fn increment_and_expire(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let (count,): (u64,) = increment_pipeline(key, ttl).query_async(&mut conn).await?;
        debug!(key = %key, count = count, ttl_ms = ttl_millis(ttl), "Incremented counter");
        Ok(count)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::{ErrorKind, RedisError, Value};
    use redis_test::{MockCmd, MockRedisConnection};

    fn mock_store(commands: Vec<MockCmd>) -> RedisCounterStore<MockRedisConnection> {
        RedisCounterStore::with_connection(MockRedisConnection::new(commands))
    }

    fn get_cmd(key: &str) -> redis::Cmd {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        cmd
    }

    /// Replies to MULTI, the two queued commands, then EXEC.
    fn transaction_replies(exec: Value) -> Vec<Value> {
        vec![
            Value::Okay,
            Value::SimpleString("QUEUED".to_string()),
            Value::SimpleString("QUEUED".to_string()),
            exec,
        ]
    }

    fn packed(args: &[&str]) -> Vec<u8> {
        let mut cmd = redis::cmd(args[0]);
        for arg in &args[1..] {
            cmd.arg(*arg);
        }
        cmd.get_packed_command()
    }

    #[test]
    fn test_increment_pipeline_is_a_transaction() {
        let pipe = increment_pipeline("ip:203.0.113.5", Duration::from_secs(60));

        let mut expected = packed(&["MULTI"]);
        expected.extend(packed(&["INCRBY", "ip:203.0.113.5", "1"]));
        expected.extend(packed(&["PEXPIRE", "ip:203.0.113.5", "60000", "NX"]));
        expected.extend(packed(&["EXEC"]));

        assert_eq!(pipe.get_packed_pipeline(), expected);
    }

    #[test]
    fn test_sub_second_window_keeps_millisecond_precision() {
        let pipe = increment_pipeline("k", Duration::from_millis(1500));
        let packed = String::from_utf8(pipe.get_packed_pipeline()).unwrap();
        assert!(packed.contains("1500"));
    }

    #[tokio::test]
    async fn test_absent_key_counts_zero() {
        let store = mock_store(vec![MockCmd::new(get_cmd("ip:a"), Ok(Value::Nil))]);
        assert_eq!(store.get_count("ip:a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_existing_key_is_parsed() {
        let store = mock_store(vec![MockCmd::new(
            get_cmd("ip:a"),
            Ok(Value::BulkString(b"7".to_vec())),
        )]);
        assert_eq!(store.get_count("ip:a").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_read_failure_is_returned() {
        let store = mock_store(vec![MockCmd::new(
            get_cmd("ip:a"),
            Err::<Value, _>(RedisError::from((ErrorKind::IoError, "client is closed"))),
        )]);

        let err = store.get_count("ip:a").await.unwrap_err();
        assert!(matches!(err, StoreError::Redis(e) if e.kind() == ErrorKind::IoError));
    }

    #[tokio::test]
    async fn test_increment_returns_new_count() {
        let window = Duration::from_secs(60);
        let store = mock_store(vec![MockCmd::with_values(
            increment_pipeline("ip:a", window),
            Ok(transaction_replies(Value::Array(vec![
                Value::Int(3),
                Value::Int(1),
            ]))),
        )]);

        assert_eq!(store.increment_and_expire("ip:a", window).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_increment_failure_is_returned() {
        let window = Duration::from_secs(60);
        let store = mock_store(vec![MockCmd::with_values(
            increment_pipeline("ip:a", window),
            Err::<Vec<Value>, _>(RedisError::from((
                ErrorKind::ExecAbortError,
                "transaction discarded",
            ))),
        )]);

        assert!(matches!(
            store.increment_and_expire("ip:a", window).await,
            Err(StoreError::Redis(_))
        ));
    }

    #[tokio::test]
    async fn test_ping() {
        let store = mock_store(vec![MockCmd::new(
            redis::cmd("PING"),
            Ok(Value::SimpleString("PONG".to_string())),
        )]);
        store.ping().await.unwrap();

        let down = mock_store(vec![MockCmd::new(
            redis::cmd("PING"),
            Err::<Value, _>(RedisError::from((ErrorKind::IoError, "client is closed"))),
        )]);
        assert!(down.ping().await.is_err());
    }

    #[test]
    fn test_ttl_millis_saturates() {
        assert_eq!(ttl_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(ttl_millis(Duration::MAX), u64::MAX);
    }

    // Requires a local Redis 7+; run with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn test_against_live_redis() {
        let store = RedisCounterStore::connect("redis://127.0.0.1:6379")
            .await
            .unwrap();
        let key = format!("test:{}", uuid::Uuid::new_v4());

        assert_eq!(store.get_count(&key).await.unwrap(), 0);
        assert_eq!(
            store
                .increment_and_expire(&key, Duration::from_secs(5))
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .increment_and_expire(&key, Duration::from_secs(5))
                .await
                .unwrap(),
            2
        );
        assert_eq!(store.get_count(&key).await.unwrap(), 2);
        store.ping().await.unwrap();
    }
}
