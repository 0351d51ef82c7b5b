use anyhow::Result;
use futures::StreamExt;
use sqlx::{postgres::PgListener, PgConnection, PgPool};
use tokio::sync::mpsc;
use tracing::{error, span, warn, Instrument, Level};

pub trait NotifyPayload: Sized {
    fn decode_payload(payload: &str) -> Result<Self, String>;
    fn encode_payload(&self) -> Result<String, String>;
}

#[derive(Clone)]
pub struct TypedChannel<T> {
    pub channel_name: String,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> TypedChannel<T> {
    pub fn new(channel_name: &str) -> Self {
        Self {
            channel_name: channel_name.to_string(),
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: NotifyPayload> TypedChannel<T> {
    /// Queues `data` on the channel. Inside a transaction the notification
    /// is only delivered on commit.
    pub async fn publish(&self, conn: &mut PgConnection, data: &T) -> Result<(), sqlx::Error> {
        let payload = data.encode_payload().map_err(sqlx::Error::Protocol)?;
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(&self.channel_name)
            .bind(&payload)
            .execute(conn)
            .await?;
        Ok(())
    }
}

pub struct PgNotifier<T> {
    notifications: mpsc::UnboundedReceiver<T>,
}

impl<T: NotifyPayload + Send + 'static> PgNotifier<T> {
    pub async fn new(pool: &PgPool, channel: TypedChannel<T>) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut listener = PgListener::connect_with(pool).await?;
        listener.listen(&channel.channel_name).await?;

        let channel_name = channel.channel_name;
        let listener_span = span!(Level::INFO, "pg_listener", channel = %channel_name);

        tokio::spawn(
            async move {
                let mut stream = listener.into_stream();
                while let Some(message) = stream.next().await {
                    let payload = match message {
                        Ok(notification) => T::decode_payload(notification.payload()),
                        Err(e) => {
                            error!(error = %e, "Error receiving notification");
                            continue;
                        }
                    };
                    match payload {
                        Ok(data) => {
                            if tx.send(data).is_err() {
                                warn!("Subscriber dropped, stopping listener");
                                break;
                            }
                        }
                        Err(e) => error!(error = %e, "Dropping undecodable payload"),
                    }
                }
            }
            .instrument(listener_span),
        );
        Ok(Self { notifications: rx })
    }

    pub fn subscribe(self) -> mpsc::UnboundedReceiver<T> {
        self.notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app_config, db::DB};
    use std::{str::FromStr, time::Duration};

    #[derive(Debug, Clone, PartialEq)]
    struct WrappedInt(i32);

    impl NotifyPayload for WrappedInt {
        fn decode_payload(payload: &str) -> Result<Self, String> {
            let data =
                FromStr::from_str(payload).map_err(|x: std::num::ParseIntError| x.to_string())?;
            Ok(WrappedInt(data))
        }

        fn encode_payload(&self) -> Result<String, String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    #[ignore = "requires postgres instance"]
    async fn test_sqlx_notify() -> Result<()> {
        app_config::init_console_subscriber();
        let pool = DB::new_from_environment().await?.pool;

        let channel = TypedChannel::<WrappedInt>::new("test_numbers");
        let mut subscriber = PgNotifier::new(&pool, channel.clone()).await?.subscribe();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut conn = pool.acquire().await?;
        for i in 1..=3 {
            channel.publish(&mut *conn, &WrappedInt(i)).await?;
        }

        let mut received = Vec::new();
        for _ in 0..3 {
            match tokio::time::timeout(Duration::from_secs(2), subscriber.recv()).await {
                Ok(Some(n)) => received.push(n),
                _ => break,
            }
        }
        assert_eq!(received, vec![WrappedInt(1), WrappedInt(2), WrappedInt(3)]);
        Ok(())
    }
}
