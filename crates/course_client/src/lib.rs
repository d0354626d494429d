//! Drivers for every call shape of the greet, calculator and blog services.
//!
//! Each client carries an optional deadline. It is sent to the server as
//! `grpc-timeout` and also bounds the whole call locally, so a slow server
//! surfaces as [`ClientError::Timeout`].

mod blog;
mod calculator;
mod greet;

pub use blog::{BlogClient, SEED_BLOGS};
pub use calculator::CalculatorClient;
pub use greet::GreetClient;

use std::{future::Future, time::Duration};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Code, Request, Status};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Could not connect: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Timeout was hit: deadline was exceeded")]
    Timeout,

    #[error("rpc failed with {}: {}", .0.code(), .0.message())]
    Status(#[from] Status),

    #[error("server response carried no blog")]
    MissingBlog,
}

impl ClientError {
    pub fn code(&self) -> Option<Code> {
        match self {
            ClientError::Status(status) => Some(status.code()),
            ClientError::Timeout => Some(Code::DeadlineExceeded),
            _ => None,
        }
    }
}

type Result<T> = std::result::Result<T, ClientError>;

fn request<T>(message: T, timeout: Option<Duration>) -> Request<T> {
    let mut request = Request::new(message);
    if let Some(timeout) = timeout {
        request.set_timeout(timeout);
    }
    request
}

/// Runs `call`, cut short after `timeout` when one is set.
async fn bounded<T, F>(timeout: Option<Duration>, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, Status>>,
{
    let Some(timeout) = timeout else {
        return Ok(call.await?);
    };

    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(status)) if matches!(status.code(), Code::DeadlineExceeded | Code::Cancelled) => {
            Err(ClientError::Timeout)
        }
        Ok(Err(status)) => Err(status.into()),
        Err(_) => Err(ClientError::Timeout),
    }
}

/// Streams `items`, sleeping `pause` between consecutive items.
fn paced<T: Send + 'static>(items: Vec<T>, pause: Duration) -> ReceiverStream<T> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(pause).await;
            }
            if tx.send(item).await.is_err() {
                break;
            }
        }
    });
    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[test]
    fn request_carries_timeout_header() {
        let with = request((), Some(Duration::from_secs(5)));
        let without = request((), None);

        assert!(with.metadata().get("grpc-timeout").is_some());
        assert!(without.metadata().get("grpc-timeout").is_none());
    }

    #[tokio::test]
    async fn bounded_passes_through_without_timeout() {
        let value = bounded(None, async { Ok::<_, Status>(7) }).await.unwrap();

        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_times_out_slow_calls() {
        let err = bounded(Some(Duration::from_secs(1)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, Status>(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ClientError::Timeout));
        assert_eq!(err.code(), Some(Code::DeadlineExceeded));
    }

    #[tokio::test]
    async fn bounded_maps_server_deadline_to_timeout() {
        let err = bounded(Some(Duration::from_secs(1)), async {
            Err::<(), _>(Status::deadline_exceeded("too slow"))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ClientError::Timeout));
    }

    #[tokio::test]
    async fn bounded_keeps_other_statuses() {
        let err = bounded(Some(Duration::from_secs(1)), async {
            Err::<(), _>(Status::invalid_argument("negative"))
        })
        .await
        .unwrap_err();

        assert_eq!(err.code(), Some(Code::InvalidArgument));
    }

    #[tokio::test(start_paused = true)]
    async fn paced_yields_everything_in_order() {
        let items: Vec<i32> = paced(vec![1, 2, 3], Duration::from_secs(1))
            .collect()
            .await;

        assert_eq!(items, vec![1, 2, 3]);
    }
}
