use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

/// Exponential backoff used while waiting for the first successful ping.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Attempts made before the first connection is given up.
    pub const STARTUP: RetryPolicy = RetryPolicy {
        max_attempts: 10,
        initial_delay: Duration::from_millis(250),
        max_delay: Duration::from_secs(5),
    };

    /// Attempts made by a supervisor-driven reconnect.
    pub const RECONNECT: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(250),
        max_delay: Duration::from_secs(2),
    };

    fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_delay)
    }
}

/// Build a client and ping the database until it answers or the policy gives up.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
    policy: RetryPolicy,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut attempts = 0;
    let mut delay = policy.initial_delay;

    loop {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => return Ok((client, database)),
            Err(source) => {
                attempts += 1;
                if attempts >= policy.max_attempts {
                    return Err(MongoDaoError::InitialPing { attempts, source });
                }
                debug!(attempts, database = database_name, "MongoDB not reachable yet; retrying");
                sleep(delay).await;
                delay = policy.next_delay(delay);
            }
        }
    }
}
