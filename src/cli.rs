use clap::Args;
use course_client::ClientError;
use std::time::Duration;
use tracing::warn;

/// Connection flags shared by the client binaries.
#[derive(Debug, Clone, Args)]
pub struct ClientArgs {
    /// Server endpoint, e.g. http://localhost:50051
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Deadline applied to every call, in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
}

impl ClientArgs {
    /// Flags win over the configured values.
    pub fn apply(self, base: &course_config::Client) -> course_config::Client {
        course_config::Client {
            endpoint: self.endpoint.unwrap_or_else(|| base.endpoint.clone()),
            timeout_ms: self.timeout_ms.or(base.timeout_ms),
        }
    }
}

pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// A hit deadline is reported and swallowed; any other failure ends the
/// process with an error.
pub fn finish(result: Result<(), ClientError>) -> anyhow::Result<()> {
    match result {
        Err(ClientError::Timeout) => {
            warn!("Timeout was hit: deadline was exceeded");
            Ok(())
        }
        other => Ok(other?),
    }
}
