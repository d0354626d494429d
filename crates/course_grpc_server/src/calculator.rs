use course_proto::calculator::{
    calculator_service_server::CalculatorService, ComputeAverageRequest, ComputeAverageResponse,
    DecompositeNumberRequest, DecompositeNumberResponse, FindMaximumRequest, FindMaximumResponse,
    SquareRootRequest, SquareRootResponse, SumRequest, SumResponse,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, warn};

const STREAM_BUFFER: usize = 16;

#[derive(Debug, Default)]
pub struct CalculatorServiceImpl;

/// How many candidate divisors are tried between two checks of the stop
/// condition.
const STOP_CHECK_INTERVAL: i64 = 1 << 16;

/// Prime factors of `number` in ascending order, repeated by multiplicity.
/// Yields nothing for `number <= 1`.
#[derive(Debug, Clone)]
pub struct PrimeFactors<S = fn() -> bool> {
    remaining: i64,
    divisor: i64,
    stopped: S,
}

fn never_stopped() -> bool {
    false
}

pub fn prime_factors(number: i64) -> PrimeFactors {
    PrimeFactors {
        remaining: number,
        divisor: 2,
        stopped: never_stopped as fn() -> bool,
    }
}

/// Like [`prime_factors`], but the search ends early once `stopped` returns
/// true. It is polled every `STOP_CHECK_INTERVAL` candidate divisors, so a long
/// search between two factors can still be abandoned.
pub fn prime_factors_until<S: Fn() -> bool>(number: i64, stopped: S) -> PrimeFactors<S> {
    PrimeFactors {
        remaining: number,
        divisor: 2,
        stopped,
    }
}

impl<S: Fn() -> bool> Iterator for PrimeFactors<S> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        while self.remaining > 1 {
            // nothing below sqrt(remaining) divides it, so it is prime
            let past_root = self
                .divisor
                .checked_mul(self.divisor)
                .map_or(true, |square| square > self.remaining);
            if past_root {
                let prime = self.remaining;
                self.remaining = 1;
                return Some(prime);
            }

            if self.remaining % self.divisor == 0 {
                self.remaining /= self.divisor;
                return Some(self.divisor);
            }
            self.divisor += 1;

            if self.divisor % STOP_CHECK_INTERVAL == 0 && (self.stopped)() {
                self.remaining = 1;
            }
        }
        None
    }
}

#[derive(Debug, Default)]
pub struct RunningAverage {
    sum: i128,
    count: u64,
}

impl RunningAverage {
    pub fn push(&mut self, number: i64) {
        self.sum += i128::from(number);
        self.count += 1;
    }

    /// 0.0 when nothing was pushed, rather than the NaN of `0 / 0`.
    pub fn value(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum as f64 / self.count as f64
    }
}

#[derive(Debug, Default)]
pub struct RunningMax {
    max: Option<i32>,
}

impl RunningMax {
    /// Returns the new maximum when `number` beats everything seen so far.
    /// The first number always counts as a new maximum, so a stream of only
    /// negative numbers still reports one. Starting from zero instead would
    /// report nothing for such a stream.
    pub fn push(&mut self, number: i32) -> Option<i32> {
        match self.max {
            Some(max) if number <= max => None,
            _ => {
                self.max = Some(number);
                self.max
            }
        }
    }
}

#[tonic::async_trait]
impl CalculatorService for CalculatorServiceImpl {
    type DecompositeNumberStream = ReceiverStream<Result<DecompositeNumberResponse, Status>>;
    type FindMaximumStream = ReceiverStream<Result<FindMaximumResponse, Status>>;

    async fn sum(&self, request: Request<SumRequest>) -> Result<Response<SumResponse>, Status> {
        let SumRequest { num1, num2 } = request.into_inner();
        info!(num1, num2, "Sum was invoked");

        Ok(Response::new(SumResponse {
            result: num1.wrapping_add(num2),
        }))
    }

    async fn decomposite_number(
        &self,
        request: Request<DecompositeNumberRequest>,
    ) -> Result<Response<Self::DecompositeNumberStream>, Status> {
        let number = request.into_inner().number;
        info!(number, "DecompositeNumber was invoked");

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::task::spawn_blocking(move || {
            for prime_factor in prime_factors_until(number, || tx.is_closed()) {
                if tx
                    .blocking_send(Ok(DecompositeNumberResponse { prime_factor }))
                    .is_err()
                {
                    debug!(number, "client dropped the decomposition stream");
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn compute_average(
        &self,
        request: Request<Streaming<ComputeAverageRequest>>,
    ) -> Result<Response<ComputeAverageResponse>, Status> {
        info!("ComputeAverage was invoked");
        let mut stream = request.into_inner();
        let mut average = RunningAverage::default();

        while let Some(ComputeAverageRequest { number }) = stream.message().await? {
            debug!(number, "received number to average");
            average.push(number);
        }

        Ok(Response::new(ComputeAverageResponse {
            average: average.value(),
        }))
    }

    async fn find_maximum(
        &self,
        request: Request<Streaming<FindMaximumRequest>>,
    ) -> Result<Response<Self::FindMaximumStream>, Status> {
        info!("FindMaximum was invoked");
        let mut inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        tokio::spawn(async move {
            let mut running = RunningMax::default();
            loop {
                match inbound.message().await {
                    Ok(Some(FindMaximumRequest { number })) => {
                        let Some(max) = running.push(number) else {
                            continue;
                        };
                        if tx.send(Ok(FindMaximumResponse { max })).await.is_err() {
                            debug!("client dropped the maximum stream");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(status) => {
                        warn!(%status, "error while reading maximum stream");
                        let _ = tx.send(Err(status)).await;
                        break;
                    }
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn square_root(
        &self,
        request: Request<SquareRootRequest>,
    ) -> Result<Response<SquareRootResponse>, Status> {
        let number = request.into_inner().number;
        info!(number, "SquareRoot was invoked");

        if number < 0 {
            return Err(Status::invalid_argument(format!(
                "Received a negative number: {number}"
            )));
        }

        Ok(Response::new(SquareRootResponse {
            number_root: f64::from(number).sqrt(),
        }))
    }
}
