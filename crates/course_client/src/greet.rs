use super::{bounded, paced, request, Result};
use course_proto::greet::{
    greet_service_client::GreetServiceClient, GreetEveryoneRequest, GreetManyTimesRequest,
    GreetRequest, GreetWithDeadlineRequest, Greeting, LongGreetRequest,
};
use std::time::Duration;
use tonic::{transport::Channel, Status};
use tracing::info;

pub struct GreetClient {
    client: GreetServiceClient<Channel>,
    timeout: Option<Duration>,
}

fn greeting(first_name: &str, last_name: &str) -> Option<Greeting> {
    Some(Greeting {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
    })
}

impl GreetClient {
    pub async fn connect(config: course_config::Client) -> Result<Self> {
        let client = GreetServiceClient::connect(config.endpoint.clone()).await?;
        Ok(Self {
            client,
            timeout: config.timeout(),
        })
    }

    pub async fn greet(&mut self, first_name: &str, last_name: &str) -> Result<String> {
        let timeout = self.timeout;
        let client = &mut self.client;
        let message = GreetRequest {
            greeting: greeting(first_name, last_name),
        };

        let result = bounded(timeout, async {
            let response = client.greet(request(message, timeout)).await?;
            Ok::<_, Status>(response.into_inner().result)
        })
        .await?;

        info!(%result, "Response from Greet");
        Ok(result)
    }

    pub async fn greet_many_times(
        &mut self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Vec<String>> {
        let timeout = self.timeout;
        let client = &mut self.client;
        let message = GreetManyTimesRequest {
            greeting: greeting(first_name, last_name),
        };

        bounded(timeout, async {
            let mut stream = client
                .greet_many_times(request(message, timeout))
                .await?
                .into_inner();

            let mut results = Vec::new();
            while let Some(response) = stream.message().await? {
                info!(result = %response.result, "Response from GreetManyTimes");
                results.push(response.result);
            }
            Ok::<_, Status>(results)
        })
        .await
    }

    /// Streams one greeting per name, `pause` apart, and returns the single
    /// combined reply.
    pub async fn long_greet(&mut self, first_names: &[&str], pause: Duration) -> Result<String> {
        let timeout = self.timeout;
        let client = &mut self.client;
        let outbound = paced(
            first_names
                .iter()
                .map(|first_name| LongGreetRequest {
                    greeting: greeting(first_name, ""),
                })
                .collect(),
            pause,
        );

        let result = bounded(timeout, async {
            let response = client.long_greet(request(outbound, timeout)).await?;
            Ok::<_, Status>(response.into_inner().result)
        })
        .await?;

        info!(%result, "LongGreet Response");
        Ok(result)
    }

    /// Streams one greeting per name, `pause` apart, collecting every reply.
    pub async fn greet_everyone(
        &mut self,
        first_names: &[&str],
        pause: Duration,
    ) -> Result<Vec<String>> {
        let timeout = self.timeout;
        let client = &mut self.client;
        let outbound = paced(
            first_names
                .iter()
                .map(|first_name| GreetEveryoneRequest {
                    greeting: greeting(first_name, ""),
                })
                .collect(),
            pause,
        );

        bounded(timeout, async {
            let mut inbound = client
                .greet_everyone(request(outbound, timeout))
                .await?
                .into_inner();

            let mut results = Vec::new();
            while let Some(response) = inbound.message().await? {
                info!(result = %response.result, "Message received");
                results.push(response.result);
            }
            Ok::<_, Status>(results)
        })
        .await
    }

    /// Calls the slow greeting with an explicit deadline, ignoring the
    /// client-wide one.
    pub async fn greet_with_deadline(
        &mut self,
        first_name: &str,
        last_name: &str,
        timeout: Duration,
    ) -> Result<String> {
        let client = &mut self.client;
        let message = GreetWithDeadlineRequest {
            greeting: greeting(first_name, last_name),
        };

        let result = bounded(Some(timeout), async {
            let response = client
                .greet_with_deadline(request(message, Some(timeout)))
                .await?;
            Ok::<_, Status>(response.into_inner().result)
        })
        .await?;

        info!(%result, "Response from GreetWithDeadline");
        Ok(result)
    }
}
