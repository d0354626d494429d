use super::{bounded, paced, request, ClientError, Result};
use course_proto::calculator::{
    calculator_service_client::CalculatorServiceClient, ComputeAverageRequest,
    DecompositeNumberRequest, FindMaximumRequest, SquareRootRequest, SumRequest,
};
use std::time::Duration;
use tonic::{transport::Channel, Code, Status};
use tracing::info;

pub struct CalculatorClient {
    client: CalculatorServiceClient<Channel>,
    timeout: Option<Duration>,
}

impl CalculatorClient {
    pub async fn connect(config: course_config::Client) -> Result<Self> {
        let client = CalculatorServiceClient::connect(config.endpoint.clone()).await?;
        Ok(Self {
            client,
            timeout: config.timeout(),
        })
    }

    pub async fn sum(&mut self, num1: i32, num2: i32) -> Result<i32> {
        let timeout = self.timeout;
        let client = &mut self.client;
        let result = bounded(timeout, async {
            let response = client
                .sum(request(SumRequest { num1, num2 }, timeout))
                .await?;
            Ok::<_, Status>(response.into_inner().result)
        })
        .await?;

        info!(num1, num2, result, "Sum response");
        Ok(result)
    }

    pub async fn decomposite_number(&mut self, number: i64) -> Result<Vec<i64>> {
        let timeout = self.timeout;
        let client = &mut self.client;
        bounded(timeout, async {
            let mut stream = client
                .decomposite_number(request(DecompositeNumberRequest { number }, timeout))
                .await?
                .into_inner();

            let mut factors = Vec::new();
            while let Some(response) = stream.message().await? {
                info!(prime_factor = response.prime_factor, "DecompositeNumber response");
                factors.push(response.prime_factor);
            }
            Ok::<_, Status>(factors)
        })
        .await
    }

    /// Sends `numbers` one at a time, `pause` apart, and returns their average.
    pub async fn compute_average(&mut self, numbers: Vec<i64>, pause: Duration) -> Result<f64> {
        let timeout = self.timeout;
        let client = &mut self.client;
        let outbound = paced(
            numbers
                .into_iter()
                .map(|number| ComputeAverageRequest { number })
                .collect(),
            pause,
        );

        let average = bounded(timeout, async {
            let response = client.compute_average(request(outbound, timeout)).await?;
            Ok::<_, Status>(response.into_inner().average)
        })
        .await?;

        info!(average, "ComputeAverage response");
        Ok(average)
    }

    /// Sends `numbers` one at a time, `pause` apart, collecting every new
    /// maximum the server reports.
    pub async fn find_maximum(
        &mut self,
        numbers: Vec<i32>,
        pause: Duration,
    ) -> Result<Vec<i32>> {
        let timeout = self.timeout;
        let client = &mut self.client;
        let outbound = paced(
            numbers
                .into_iter()
                .map(|number| FindMaximumRequest { number })
                .collect(),
            pause,
        );

        bounded(timeout, async {
            let mut inbound = client
                .find_maximum(request(outbound, timeout))
                .await?
                .into_inner();

            let mut maximums = Vec::new();
            while let Some(response) = inbound.message().await? {
                info!(max = response.max, "FindMaximum response");
                maximums.push(response.max);
            }
            Ok::<_, Status>(maximums)
        })
        .await
    }

    pub async fn square_root(&mut self, number: i32) -> Result<f64> {
        let timeout = self.timeout;
        let client = &mut self.client;
        let number_root = bounded(timeout, async {
            let response = client
                .square_root(request(SquareRootRequest { number }, timeout))
                .await?;
            Ok::<_, Status>(response.into_inner().number_root)
        })
        .await?;

        info!(number, number_root, "SquareRoot response");
        Ok(number_root)
    }

    /// Like [`Self::square_root`] but treats the server rejecting a negative
    /// number as an expected outcome, returning `None`.
    pub async fn checked_square_root(&mut self, number: i32) -> Result<Option<f64>> {
        match self.square_root(number).await {
            Ok(root) => Ok(Some(root)),
            Err(ClientError::Status(status)) if status.code() == Code::InvalidArgument => {
                info!(
                    code = ?status.code(),
                    message = status.message(),
                    "We probably sent a negative number"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
