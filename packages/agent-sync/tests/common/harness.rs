//! Test harness for driving the sync loops against in-memory doubles.
//!
//! Loops under test run with millisecond intervals so service-level tests can
//! wait on observable effects instead of stepping by hand.
//!
//! # Usage
//!
//! ```ignore
//! #[test_context(SyncHarness)]
//! #[tokio::test]
//! async fn my_test(ctx: &SyncHarness) {
//!     ctx.deps.feed.push(raw_event("A", "/exn/ipex/grant", "DA"));
//!     let mut state = ctx.load().await;
//!     ctx.step(&mut state).await;
//! }
//! ```

use std::time::Duration;

use agent_sync::domains::notifications::{FeedState, StepOutcome};
use agent_sync::kernel::test_dependencies::EventRecorder;
use agent_sync::kernel::TestDependencies;
use agent_sync::{FeedSync, SyncConfig};
use test_context::AsyncTestContext;
use tokio_util::sync::CancellationToken;

/// Route `tracing` output through the test writer. Safe to call from every test.
pub fn init_test_tracing() {
    // Run tests with: RUST_LOG=agent_sync=debug cargo test -- --nocapture
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fast_config() -> SyncConfig {
    SyncConfig {
        poll_interval: Duration::from_millis(5),
        login_poll_interval: Duration::from_millis(1),
        operation_poll_interval: Duration::from_millis(5),
        ..SyncConfig::default()
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

/// A feed sync wired to test doubles, stepped by hand.
pub struct SyncHarness {
    pub deps: TestDependencies,
    pub recorder: EventRecorder,
    pub sync: FeedSync,
    pub shutdown: CancellationToken,
}

impl AsyncTestContext for SyncHarness {
    async fn setup() -> Self {
        Self::new(TestDependencies::new())
    }

    async fn teardown(self) {
        self.shutdown.cancel();
    }
}

impl SyncHarness {
    pub fn new(deps: TestDependencies) -> Self {
        Self::with_config(deps, fast_config())
    }

    pub fn with_config(deps: TestDependencies, config: SyncConfig) -> Self {
        init_test_tracing();
        Self {
            sync: FeedSync::new(deps.deps(), config),
            deps,
            recorder: EventRecorder::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub async fn load(&self) -> FeedState {
        self.sync
            .load_state()
            .await
            .expect("cursor store should be readable")
    }

    pub async fn step(&self, state: &mut FeedState) -> StepOutcome {
        self.sync
            .step(state, &self.recorder.callback(), &self.shutdown)
            .await
    }
}
