use instasense_core::{ApifyError, CoreError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
    /// Circuit breaker failure threshold
    pub failure_threshold: u32,
    /// Circuit breaker recovery timeout (in seconds)
    pub recovery_timeout_s: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            failure_threshold: 5,
            recovery_timeout_s: 60,
        }
    }
}

impl RetryConfig {
    /// Actor runs are slow and metered, so retry less eagerly than the default.
    pub fn apify() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 60000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
            failure_threshold: 3,
            recovery_timeout_s: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Stops calling a failing service until it has had time to recover.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitBreakerState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    config: RetryConfig,
}

impl CircuitBreaker {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            failure_count: 0,
            last_failure_time: None,
            config,
        }
    }

    pub fn allow_request(&mut self) -> bool {
        match self.state {
            CircuitBreakerState::Closed => true,
            CircuitBreakerState::Open => match self.last_failure_time {
                Some(last_failure)
                    if last_failure.elapsed()
                        >= Duration::from_secs(self.config.recovery_timeout_s) =>
                {
                    debug!("Circuit breaker transitioning to half-open for recovery test");
                    self.state = CircuitBreakerState::HalfOpen;
                    true
                }
                _ => false,
            },
            CircuitBreakerState::HalfOpen => true,
        }
    }

    pub fn record_success(&mut self) {
        if self.state == CircuitBreakerState::HalfOpen {
            info!("Circuit breaker recovery successful, returning to closed state");
            self.state = CircuitBreakerState::Closed;
            self.last_failure_time = None;
        }
        self.failure_count = 0;
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.last_failure_time = Some(Instant::now());

        match self.state {
            CircuitBreakerState::Closed => {
                if self.failure_count >= self.config.failure_threshold {
                    warn!(
                        "Circuit breaker opening due to {} consecutive failures",
                        self.failure_count
                    );
                    self.state = CircuitBreakerState::Open;
                }
            }
            CircuitBreakerState::HalfOpen => {
                warn!("Circuit breaker recovery failed, returning to open state");
                self.state = CircuitBreakerState::Open;
            }
            CircuitBreakerState::Open => {}
        }
    }

    pub fn get_state(&self) -> CircuitBreakerState {
        self.state.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff
    Retry,
    /// Retry after the delay the server asked for
    RetryWithDelay(Duration),
    /// Permanent failure
    NoRetry,
}

pub fn get_retry_strategy(error: &CoreError) -> RetryStrategy {
    match error {
        CoreError::Apify(apify_error) => match apify_error {
            ApifyError::RateLimitExceeded { retry_after } => {
                RetryStrategy::RetryWithDelay(Duration::from_secs(*retry_after))
            }
            ApifyError::ServerError { .. } => RetryStrategy::Retry,
            ApifyError::RequestTimeout => RetryStrategy::Retry,
            ApifyError::InvalidToken => RetryStrategy::NoRetry,
            ApifyError::ActorNotFound { .. } => RetryStrategy::NoRetry,
            ApifyError::DatasetNotFound { .. } => RetryStrategy::NoRetry,
            ApifyError::RequestRejected { .. } => RetryStrategy::NoRetry,
            // A failed run was already billed; starting another is the caller's call.
            ApifyError::RunFailed { .. } => RetryStrategy::NoRetry,
            ApifyError::InvalidResponse { .. } => RetryStrategy::NoRetry,
        },
        CoreError::Network(reqwest_error) => {
            if reqwest_error.is_timeout() || reqwest_error.is_connect() {
                RetryStrategy::Retry
            } else {
                RetryStrategy::NoRetry
            }
        }
        _ => RetryStrategy::NoRetry,
    }
}

/// Exponential backoff with jitter, capped at `max_delay_ms`.
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let max_delay = Duration::from_millis(config.max_delay_ms);

    let exponential_delay = if attempt == 0 {
        Duration::from_millis(config.base_delay_ms)
    } else {
        let multiplier = config.backoff_multiplier.powi(attempt as i32);
        let delay_ms = (config.base_delay_ms as f64 * multiplier) as u64;
        Duration::from_millis(delay_ms.min(config.max_delay_ms))
    };

    let jitter_range = (exponential_delay.as_millis() as f64 * config.jitter_factor) as u64;
    let jitter = fastrand::u64(0..=jitter_range);

    (exponential_delay + Duration::from_millis(jitter)).min(max_delay)
}

#[derive(Debug, Clone, Default)]
pub struct RetryMetrics {
    pub total_retries: u64,
    pub successful_retries: u64,
    pub failed_retries: u64,
    pub circuit_breaker_trips: u64,
}

/// Wraps fallible async operations with retry and circuit breaking.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    circuit_breaker: Arc<Mutex<CircuitBreaker>>,
    metrics: Arc<Mutex<RetryMetrics>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        let circuit_breaker = Arc::new(Mutex::new(CircuitBreaker::new(config.clone())));
        Self {
            config,
            circuit_breaker,
            metrics: Arc::new(Mutex::new(RetryMetrics::default())),
        }
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts
    /// run out. The last error is returned unchanged.
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        if !lock(&self.circuit_breaker).allow_request() {
            lock(&self.metrics).circuit_breaker_trips += 1;
            warn!(
                "Circuit breaker is open, blocking request for {}",
                operation_name
            );
            return Err(CoreError::Internal {
                message: "Circuit breaker is open".to_string(),
            });
        }

        let mut attempt = 0;
        let mut total_delay_ms = 0u64;

        let last_error = loop {
            if attempt > 0 {
                debug!("Retry attempt {} for {}", attempt, operation_name);
            }

            match operation().await {
                Ok(result) => {
                    lock(&self.circuit_breaker).record_success();
                    if attempt > 0 {
                        let mut metrics = lock(&self.metrics);
                        metrics.total_retries += u64::from(attempt);
                        metrics.successful_retries += 1;
                        info!(
                            "Operation {} succeeded after {} retries (total delay: {}ms)",
                            operation_name, attempt, total_delay_ms
                        );
                    }
                    return Ok(result);
                }
                Err(error) => {
                    let has_attempts_left = attempt + 1 < self.config.max_attempts;
                    let delay = match get_retry_strategy(&error) {
                        RetryStrategy::Retry if has_attempts_left => {
                            calculate_delay(attempt, &self.config)
                        }
                        RetryStrategy::RetryWithDelay(delay) if has_attempts_left => delay,
                        _ => {
                            debug!("Not retrying {}: {}", operation_name, error);
                            break error;
                        }
                    };

                    info!(
                        "Retrying {} in {:?} due to: {}",
                        operation_name, delay, error
                    );
                    total_delay_ms += delay.as_millis() as u64;
                    attempt += 1;
                    sleep(delay).await;
                }
            }
        };

        lock(&self.circuit_breaker).record_failure();
        {
            let mut metrics = lock(&self.metrics);
            metrics.total_retries += u64::from(attempt);
            metrics.failed_retries += 1;
        }

        error!(
            "Operation {} failed after {} attempts with total delay of {}ms",
            operation_name,
            attempt + 1,
            total_delay_ms
        );
        Err(last_error)
    }

    pub fn get_metrics(&self) -> RetryMetrics {
        lock(&self.metrics).clone()
    }

    pub fn get_circuit_breaker_state(&self) -> CircuitBreakerState {
        lock(&self.circuit_breaker).get_state()
    }
}
