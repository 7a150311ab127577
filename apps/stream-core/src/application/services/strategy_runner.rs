//! Sequential Strategy Runner
//!
//! Drives a planned intent sequence through the order gateway, strictly
//! one slice at a time: slice *i+1* is never submitted before slice *i*'s
//! outcome is recorded. A cancellation signal is honored between slices,
//! never mid-slice.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::application::ports::{GatewayError, OrderGateway};
use crate::domain::order::OrderIntent;
use crate::domain::strategy::{
    plan_grid, plan_twap, GridParams, SliceOutcome, StrategyError, StrategyKind, StrategyRun,
    StrategyRunId, TwapParams,
};

/// What a per-slice failure does to the rest of the run.
///
/// The venue offers no atomicity across slices either way; this only
/// controls whether remaining slices are still attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and keep attempting the remaining slices.
    #[default]
    ContinueOnFailure,
    /// Record the failure and halt the run as `Aborted`.
    AbortOnFailure,
}

/// Executes TWAP and grid runs against an order gateway.
///
/// Runs for different identities may execute concurrently; each run's own
/// slices are always sequential. The runner itself never retries a slice —
/// retry policy belongs outside this core.
pub struct StrategyRunner {
    gateway: Arc<dyn OrderGateway>,
    policy: FailurePolicy,
}

impl StrategyRunner {
    /// Create a runner with the default continue-on-failure policy.
    #[must_use]
    pub fn new(gateway: Arc<dyn OrderGateway>) -> Self {
        Self {
            gateway,
            policy: FailurePolicy::default(),
        }
    }

    /// Override the failure policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Execute a TWAP run: equal market-order slices spaced by the
    /// configured interval.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::InvalidParameters`] before any slice is
    /// attempted if the preconditions are violated.
    pub async fn run_twap(
        &self,
        params: &TwapParams,
        cancel: &CancellationToken,
    ) -> Result<StrategyRun, StrategyError> {
        params.validate()?;
        let run_id = StrategyRunId::generate();
        let intents = plan_twap(run_id, params);

        tracing::info!(
            run_id = %run_id,
            symbol = %params.symbol,
            slices = params.slice_count,
            interval_ms = params.interval.as_millis(),
            quantity_per_slice = %params.quantity_per_slice(),
            "Starting TWAP run"
        );

        Ok(self
            .execute(run_id, StrategyKind::Twap, intents, Some(params.interval), cancel)
            .await)
    }

    /// Execute a grid run: limit orders at evenly spaced price levels,
    /// lowest first, with no inter-level delay.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::InvalidParameters`] before any level is
    /// attempted if the preconditions are violated.
    pub async fn run_grid(
        &self,
        params: &GridParams,
        cancel: &CancellationToken,
    ) -> Result<StrategyRun, StrategyError> {
        params.validate()?;
        let run_id = StrategyRunId::generate();
        let intents = plan_grid(run_id, params);

        tracing::info!(
            run_id = %run_id,
            symbol = %params.symbol,
            levels = params.grid_levels,
            price_step = %params.price_step(),
            "Starting grid run"
        );

        Ok(self
            .execute(run_id, StrategyKind::Grid, intents, None, cancel)
            .await)
    }

    /// Sequential execution loop shared by both strategies.
    async fn execute(
        &self,
        run_id: StrategyRunId,
        kind: StrategyKind,
        intents: Vec<OrderIntent>,
        interval: Option<Duration>,
        cancel: &CancellationToken,
    ) -> StrategyRun {
        let mut run = StrategyRun::new(run_id, kind);
        let total = intents.len();

        for (index, intent) in intents.into_iter().enumerate() {
            // Cancellation is honored between slices, never mid-slice.
            if cancel.is_cancelled() {
                tracing::info!(run_id = %run_id, completed = index, "Run cancelled");
                run.abort();
                return run;
            }

            let halt = match self.gateway.place_order(&intent).await {
                Ok(result) => {
                    tracing::info!(
                        run_id = %run_id,
                        slice = index,
                        order_id = %result.exchange_order_id,
                        "Slice placed"
                    );
                    run.record(SliceOutcome::success(intent, result));
                    false
                }
                Err(error) => {
                    tracing::warn!(run_id = %run_id, slice = index, error = %error, "Slice failed");
                    let fatal = matches!(error, GatewayError::Fatal(_));
                    run.record(SliceOutcome::failed(intent, error.to_string()));
                    fatal || self.policy == FailurePolicy::AbortOnFailure
                }
            };

            if halt {
                run.abort();
                return run;
            }

            // Scheduling delay, not retry backoff; skipped after the last slice.
            if index + 1 < total {
                if let Some(delay) = interval {
                    tokio::select! {
                        () = cancel.cancelled() => {
                            tracing::info!(run_id = %run_id, completed = index + 1, "Run cancelled");
                            run.abort();
                            return run;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        run.finish();
        tracing::info!(run_id = %run_id, status = ?run.status(), "Run finished");
        run
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderResult, OrderSide, OrderStatus};
    use crate::domain::strategy::RunStatus;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    mockall::mock! {
        Gateway {}

        #[async_trait]
        impl OrderGateway for Gateway {
            async fn place_order(&self, intent: &OrderIntent)
                -> Result<OrderResult, GatewayError>;
        }
    }

    /// Gateway double returning a scripted result per slice index.
    struct ScriptedGateway {
        script: Mutex<Vec<Result<OrderResult, GatewayError>>>,
        calls: Mutex<Vec<OrderIntent>>,
        on_call: Option<CancellationToken>,
    }

    impl ScriptedGateway {
        fn new(script: Vec<Result<OrderResult, GatewayError>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
                on_call: None,
            }
        }

        fn cancelling_after_first(mut self, token: CancellationToken) -> Self {
            self.on_call = Some(token);
            self
        }

        fn filled(id: &str) -> Result<OrderResult, GatewayError> {
            Ok(OrderResult {
                exchange_order_id: id.to_string(),
                status: OrderStatus::Filled,
                filled_quantity: dec!(0.001),
                avg_fill_price: Some(dec!(64000)),
            })
        }
    }

    #[async_trait]
    impl OrderGateway for ScriptedGateway {
        async fn place_order(&self, intent: &OrderIntent) -> Result<OrderResult, GatewayError> {
            self.calls.lock().push(intent.clone());
            if let Some(token) = &self.on_call {
                token.cancel();
            }
            let mut script = self.script.lock();
            if script.is_empty() {
                Self::filled("overflow")
            } else {
                script.remove(0)
            }
        }
    }

    fn twap_params() -> TwapParams {
        TwapParams {
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            total_quantity: dec!(0.003),
            slice_count: 3,
            interval: Duration::from_secs(1),
        }
    }

    fn grid_params() -> GridParams {
        GridParams {
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            lower_price: dec!(100),
            upper_price: dec!(200),
            grid_levels: 3,
            quantity_per_level: dec!(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn twap_records_all_slices_despite_one_failure() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            ScriptedGateway::filled("1"),
            Err(GatewayError::Rejected("insufficient balance".to_string())),
            ScriptedGateway::filled("3"),
        ]));
        let runner = StrategyRunner::new(gateway.clone());

        let run = runner
            .run_twap(&twap_params(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.outcomes().len(), 3);
        assert!(run.outcomes()[0].is_success());
        assert!(!run.outcomes()[1].is_success());
        assert!(run.outcomes()[2].is_success());
        assert_eq!(run.status(), RunStatus::PartiallyFailed);
        assert_eq!(gateway.calls.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn twap_completes_when_all_slices_succeed() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            ScriptedGateway::filled("1"),
            ScriptedGateway::filled("2"),
            ScriptedGateway::filled("3"),
        ]));
        let runner = StrategyRunner::new(gateway);

        let run = runner
            .run_twap(&twap_params(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.status(), RunStatus::Completed);
        for outcome in run.outcomes() {
            assert_eq!(outcome.intent.quantity, dec!(0.001));
        }
    }

    #[tokio::test]
    async fn invalid_twap_params_reject_without_gateway_call() {
        let mut gateway = MockGateway::new();
        gateway.expect_place_order().never();
        let runner = StrategyRunner::new(Arc::new(gateway));
        let params = TwapParams {
            slice_count: 0,
            ..twap_params()
        };

        let result = runner.run_twap(&params, &CancellationToken::new()).await;

        assert!(matches!(result, Err(StrategyError::InvalidParameters(_))));
    }

    #[tokio::test]
    async fn invalid_grid_params_reject_without_gateway_call() {
        let mut gateway = MockGateway::new();
        gateway.expect_place_order().never();
        let runner = StrategyRunner::new(Arc::new(gateway));
        let params = GridParams {
            lower_price: dec!(200),
            upper_price: dec!(100),
            ..grid_params()
        };

        let result = runner.run_grid(&params, &CancellationToken::new()).await;

        assert!(matches!(result, Err(StrategyError::InvalidParameters(_))));
    }

    #[tokio::test]
    async fn grid_places_levels_in_ascending_price_order() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            ScriptedGateway::filled("1"),
            ScriptedGateway::filled("2"),
            ScriptedGateway::filled("3"),
        ]));
        let runner = StrategyRunner::new(gateway.clone());

        let run = runner
            .run_grid(&grid_params(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.status(), RunStatus::Completed);
        let prices: Vec<Decimal> = gateway
            .calls
            .lock()
            .iter()
            .map(|i| i.price.unwrap())
            .collect();
        assert_eq!(prices, vec![dec!(100), dec!(150), dec!(200)]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_between_slices_aborts_and_retains_outcomes() {
        let cancel = CancellationToken::new();
        let gateway = Arc::new(
            ScriptedGateway::new(vec![ScriptedGateway::filled("1")])
                .cancelling_after_first(cancel.clone()),
        );
        let runner = StrategyRunner::new(gateway.clone());

        let run = runner.run_twap(&twap_params(), &cancel).await.unwrap();

        assert_eq!(run.status(), RunStatus::Aborted);
        assert_eq!(run.outcomes().len(), 1);
        assert_eq!(gateway.calls.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_on_failure_policy_halts_after_failed_slice() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            ScriptedGateway::filled("1"),
            Err(GatewayError::Validation("bad lot size".to_string())),
            ScriptedGateway::filled("3"),
        ]));
        let runner =
            StrategyRunner::new(gateway.clone()).with_policy(FailurePolicy::AbortOnFailure);

        let run = runner
            .run_twap(&twap_params(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.status(), RunStatus::Aborted);
        assert_eq!(run.outcomes().len(), 2);
        assert_eq!(gateway.calls.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_gateway_error_halts_even_under_continue_policy() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            ScriptedGateway::filled("1"),
            Err(GatewayError::Fatal("API key revoked".to_string())),
            ScriptedGateway::filled("3"),
        ]));
        let runner = StrategyRunner::new(gateway.clone());

        let run = runner
            .run_twap(&twap_params(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.status(), RunStatus::Aborted);
        assert_eq!(run.outcomes().len(), 2);
        assert_eq!(gateway.calls.lock().len(), 2);
    }
}
