use course_proto::greet::{
    greet_service_server::GreetService, GreetEveryoneRequest, GreetEveryoneResponse,
    GreetManyTimesRequest, GreetManyTimesResponse, GreetRequest, GreetResponse,
    GreetWithDeadlineRequest, GreetWithDeadlineResponse, Greeting, LongGreetRequest,
    LongGreetResponse,
};
use std::time::Duration;
use tokio::{sync::mpsc, time::Instant};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{metadata::MetadataMap, Request, Response, Status, Streaming};
use tracing::{debug, info, warn};

const GREET_MANY_TIMES: usize = 10;
const DEADLINE_WORK_STEPS: usize = 3;
const STREAM_BUFFER: usize = 16;
const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

#[derive(Debug, Clone)]
pub struct GreetServiceImpl {
    step: Duration,
}

impl GreetServiceImpl {
    /// `step` spaces the server stream and paces the slow unary call.
    pub fn new(step: Duration) -> Self {
        Self { step }
    }
}

impl Default for GreetServiceImpl {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

fn first_name(greeting: Option<Greeting>) -> String {
    greeting.map(|greeting| greeting.first_name).unwrap_or_default()
}

/// Parses a `grpc-timeout` value: at most 8 digits followed by one of
/// `H M S m u n`.
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if !value.is_ascii() || value.len() < 2 || value.len() > 9 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    let duration = match unit {
        "H" => Duration::from_secs(amount * 60 * 60),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(duration)
}

fn request_deadline(metadata: &MetadataMap, received_at: Instant) -> Option<Instant> {
    let value = metadata.get(GRPC_TIMEOUT_HEADER)?.to_str().ok()?;
    parse_grpc_timeout(value).map(|timeout| received_at + timeout)
}

#[tonic::async_trait]
impl GreetService for GreetServiceImpl {
    type GreetManyTimesStream = ReceiverStream<Result<GreetManyTimesResponse, Status>>;
    type GreetEveryoneStream = ReceiverStream<Result<GreetEveryoneResponse, Status>>;

    async fn greet(
        &self,
        request: Request<GreetRequest>,
    ) -> Result<Response<GreetResponse>, Status> {
        let first_name = first_name(request.into_inner().greeting);
        info!(%first_name, "Greet was invoked");

        Ok(Response::new(GreetResponse {
            result: format!("Hello {first_name}"),
        }))
    }

    async fn greet_many_times(
        &self,
        request: Request<GreetManyTimesRequest>,
    ) -> Result<Response<Self::GreetManyTimesStream>, Status> {
        let first_name = first_name(request.into_inner().greeting);
        info!(%first_name, "GreetManyTimes was invoked");

        let step = self.step;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            for i in 0..GREET_MANY_TIMES {
                let response = GreetManyTimesResponse {
                    result: format!("Hello {first_name} number {i}"),
                };
                if tx.send(Ok(response)).await.is_err() {
                    debug!("client dropped the greeting stream");
                    return;
                }
                tokio::time::sleep(step).await;
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn long_greet(
        &self,
        request: Request<Streaming<LongGreetRequest>>,
    ) -> Result<Response<LongGreetResponse>, Status> {
        info!("LongGreet was invoked");
        let mut stream = request.into_inner();
        let mut result = String::new();

        while let Some(LongGreetRequest { greeting }) = stream.message().await? {
            result.push_str(&format!("Hello {}! ", first_name(greeting)));
        }

        Ok(Response::new(LongGreetResponse { result }))
    }

    async fn greet_everyone(
        &self,
        request: Request<Streaming<GreetEveryoneRequest>>,
    ) -> Result<Response<Self::GreetEveryoneStream>, Status> {
        info!("GreetEveryone was invoked");
        let mut inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        tokio::spawn(async move {
            loop {
                match inbound.message().await {
                    Ok(Some(GreetEveryoneRequest { greeting })) => {
                        let response = GreetEveryoneResponse {
                            result: format!("Hello {}! ", first_name(greeting)),
                        };
                        if tx.send(Ok(response)).await.is_err() {
                            debug!("client dropped the greeting stream");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(status) => {
                        warn!(%status, "error while reading greeting stream");
                        let _ = tx.send(Err(status)).await;
                        break;
                    }
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn greet_with_deadline(
        &self,
        request: Request<GreetWithDeadlineRequest>,
    ) -> Result<Response<GreetWithDeadlineResponse>, Status> {
        let deadline = request_deadline(request.metadata(), Instant::now());
        let first_name = first_name(request.into_inner().greeting);
        info!(%first_name, ?deadline, "GreetWithDeadline was invoked");

        for _ in 0..DEADLINE_WORK_STEPS {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                info!("the client canceled the request");
                return Err(Status::cancelled("the client canceled the request"));
            }
            tokio::time::sleep(self.step).await;
        }

        Ok(Response::new(GreetWithDeadlineResponse {
            result: format!("Hello {first_name}"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;
    use tonic::Code;

    fn greeting(first_name: &str) -> Option<Greeting> {
        Some(Greeting {
            first_name: first_name.to_string(),
            last_name: "Villegas".to_string(),
        })
    }

    #[test]
    fn parses_timeout_units() {
        assert_eq!(parse_grpc_timeout("1H"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_grpc_timeout("2M"), Some(Duration::from_secs(120)));
        assert_eq!(parse_grpc_timeout("5S"), Some(Duration::from_secs(5)));
        assert_eq!(parse_grpc_timeout("250m"), Some(Duration::from_millis(250)));
        assert_eq!(parse_grpc_timeout("7u"), Some(Duration::from_micros(7)));
        assert_eq!(
            parse_grpc_timeout("99999999n"),
            Some(Duration::from_nanos(99_999_999))
        );
    }

    #[test]
    fn rejects_malformed_timeouts() {
        assert_eq!(parse_grpc_timeout(""), None);
        assert_eq!(parse_grpc_timeout("S"), None);
        assert_eq!(parse_grpc_timeout("10x"), None);
        assert_eq!(parse_grpc_timeout("-1S"), None);
        assert_eq!(parse_grpc_timeout("+5S"), None);
        assert_eq!(parse_grpc_timeout(" 5S"), None);
        assert_eq!(parse_grpc_timeout("123456789S"), None);
    }

    #[tokio::test]
    async fn greet_says_hello() {
        let response = GreetServiceImpl::default()
            .greet(Request::new(GreetRequest {
                greeting: greeting("Luis"),
            }))
            .await
            .unwrap();

        assert_eq!(response.into_inner().result, "Hello Luis");
    }

    #[tokio::test(start_paused = true)]
    async fn greet_many_times_streams_ten_greetings() {
        let response = GreetServiceImpl::default()
            .greet_many_times(Request::new(GreetManyTimesRequest {
                greeting: greeting("Luis"),
            }))
            .await
            .unwrap();

        let results: Vec<String> = response
            .into_inner()
            .map(|item| item.unwrap().result)
            .collect()
            .await;

        assert_eq!(results.len(), GREET_MANY_TIMES);
        assert_eq!(results[0], "Hello Luis number 0");
        assert_eq!(results[9], "Hello Luis number 9");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_greeting_completes_without_deadline() {
        let response = GreetServiceImpl::default()
            .greet_with_deadline(Request::new(GreetWithDeadlineRequest {
                greeting: greeting("Luis"),
            }))
            .await
            .unwrap();

        assert_eq!(response.into_inner().result, "Hello Luis");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_greeting_completes_within_deadline() {
        let mut request = Request::new(GreetWithDeadlineRequest {
            greeting: greeting("Luis"),
        });
        request.set_timeout(Duration::from_secs(5));

        let response = GreetServiceImpl::default()
            .greet_with_deadline(request)
            .await
            .unwrap();

        assert_eq!(response.into_inner().result, "Hello Luis");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_greeting_gives_up_after_deadline() {
        let mut request = Request::new(GreetWithDeadlineRequest {
            greeting: greeting("Luis"),
        });
        request.set_timeout(Duration::from_millis(1500));

        let status = GreetServiceImpl::default()
            .greet_with_deadline(request)
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::Cancelled);
    }
}
