//! Startup orchestration: migrate, then seed on first run.
//!
//! `ensure_ready` is single-flight. The running attempt is memoized as a
//! shared future inside [`InitializerState::InProgress`], so any number of
//! concurrent callers await one execution and the store is never migrated or
//! seeded twice. Failed attempts back off exponentially and are retried by
//! the next caller, up to `max_attempts`; after that the initializer gives up
//! and every call returns immediately with whatever data exists.

use anyhow::{Context, Result};
use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::keys::StorageKey;
use super::kv::KeyValueStore;
use super::migration::{CURRENT_SCHEMA_VERSION, MigrationStep, SchemaMigrator, registered_steps};
use super::repository::{Collection, Expenses, Inventory, Tasks};
use super::seed::SeedData;

const INITIALIZED_FLAG: &str = "true";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delays between consecutive attempts: `base`, `2 * base`, `4 * base`...
    /// One fewer than `max_attempts`, since the last failure is not retried.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_factor(2.0)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
            .build()
    }
}

type InitFuture = Shared<BoxFuture<'static, ()>>;

pub enum InitializerState {
    Uninitialized,
    InProgress(InitFuture),
    Ready,
    Failed { attempts: u32 },
}

/// Snapshot of [`InitializerState`] without the in-flight future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPhase {
    Uninitialized,
    InProgress,
    Ready,
    Failed { attempts: u32 },
}

impl From<&InitializerState> for InitPhase {
    fn from(state: &InitializerState) -> Self {
        match state {
            InitializerState::Uninitialized => InitPhase::Uninitialized,
            InitializerState::InProgress(_) => InitPhase::InProgress,
            InitializerState::Ready => InitPhase::Ready,
            InitializerState::Failed { attempts } => InitPhase::Failed {
                attempts: *attempts,
            },
        }
    }
}

enum Action {
    Skip,
    Join(InitFuture),
    /// Start a new attempt after this many failed ones.
    Start(u32),
}

struct Slot {
    state: InitializerState,
    /// Bumped by `reset` so a stale in-flight attempt cannot overwrite the
    /// state of a newer one.
    generation: u64,
    /// Remaining delays for the current run of attempts.
    backoff: ExponentialBackoff,
}

struct Inner {
    store: Arc<dyn KeyValueStore>,
    migrator: SchemaMigrator,
    target_version: u32,
    steps: Vec<MigrationStep>,
    seed: SeedData,
    policy: RetryPolicy,
    slot: Mutex<Slot>,
}

#[derive(Clone)]
pub struct Initializer {
    inner: Arc<Inner>,
}

impl Initializer {
    pub fn new(store: Arc<dyn KeyValueStore>, seed: SeedData, policy: RetryPolicy) -> Self {
        Self::with_migrations(
            store,
            seed,
            policy,
            CURRENT_SCHEMA_VERSION,
            registered_steps(),
        )
    }

    pub fn with_migrations(
        store: Arc<dyn KeyValueStore>,
        seed: SeedData,
        policy: RetryPolicy,
        target_version: u32,
        steps: Vec<MigrationStep>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                migrator: SchemaMigrator::new(Arc::clone(&store)),
                store,
                target_version,
                steps,
                seed,
                policy,
                slot: Mutex::new(Slot {
                    state: InitializerState::Uninitialized,
                    generation: 0,
                    backoff: policy.backoff(),
                }),
            }),
        }
    }

    pub fn seed(&self) -> &SeedData {
        &self.inner.seed
    }

    pub fn phase(&self) -> InitPhase {
        InitPhase::from(&self.inner.lock_slot().state)
    }

    /// Make sure the store is migrated and seeded. Never fails: once the
    /// retry budget is spent this resolves without doing anything.
    pub async fn ensure_ready(&self) {
        // The lock is released before awaiting; the attempt itself takes it
        // again to publish its outcome.
        let in_flight = {
            let mut slot = self.inner.lock_slot();
            let action = match &slot.state {
                InitializerState::InProgress(fut) => Action::Join(fut.clone()),
                InitializerState::Ready => Action::Skip,
                InitializerState::Failed { attempts }
                    if *attempts >= self.inner.policy.max_attempts =>
                {
                    Action::Skip
                }
                InitializerState::Failed { attempts } => Action::Start(*attempts),
                InitializerState::Uninitialized => Action::Start(0),
            };

            match action {
                Action::Skip => None,
                Action::Join(fut) => Some(fut),
                Action::Start(prior) => {
                    let fut = Arc::clone(&self.inner)
                        .run(prior, slot.generation)
                        .boxed()
                        .shared();
                    slot.state = InitializerState::InProgress(fut.clone());
                    Some(fut)
                }
            }
        };

        if let Some(fut) = in_flight {
            fut.await;
        }
    }

    /// Forget everything learned about the store so the next `ensure_ready`
    /// starts over. Used after a full reset.
    pub fn reset(&self) {
        let mut slot = self.inner.lock_slot();
        slot.generation += 1;
        slot.state = InitializerState::Uninitialized;
        slot.backoff = self.inner.policy.backoff();
        debug!("Initializer reset");
    }
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run(self: Arc<Self>, prior_attempts: u32, generation: u64) {
        let next = match self.attempt().await {
            Ok(()) => {
                debug!("Store ready");
                InitializerState::Ready
            }
            Err(e) => {
                let attempts = prior_attempts + 1;
                let delay = if attempts < self.policy.max_attempts {
                    self.next_delay(generation)
                } else {
                    None
                };
                if let Some(delay) = delay {
                    warn!(
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Initialization failed, will retry: {e:#}"
                    );
                    tokio::time::sleep(delay).await;
                } else {
                    warn!(
                        attempts,
                        "Initialization failed, giving up and continuing with existing data: {e:#}"
                    );
                }
                InitializerState::Failed { attempts }
            }
        };

        let mut slot = self.lock_slot();
        if slot.generation == generation {
            slot.state = next;
        }
    }

    /// Next backoff delay, or `None` if this run was superseded by a reset or
    /// the delays are used up.
    fn next_delay(&self, generation: u64) -> Option<Duration> {
        let mut slot = self.lock_slot();
        if slot.generation != generation {
            return None;
        }
        slot.backoff.next()
    }

    async fn attempt(&self) -> Result<()> {
        self.migrator
            .migrate_to(self.target_version, &self.steps)
            .await?;

        let flag = self
            .store
            .get(StorageKey::Initialized.as_str())
            .await
            .context("Failed to read initialized flag")?;
        if flag.as_deref() == Some(INITIALIZED_FLAG) {
            return Ok(());
        }

        info!("First run, seeding default data");
        self.write_seed::<Tasks>().await?;
        self.write_seed::<Inventory>().await?;
        self.write_seed::<Expenses>().await?;
        self.store
            .set(
                StorageKey::MonthlyBudget.as_str(),
                serde_json::to_string(&self.seed.monthly_budget)?,
            )
            .await
            .context("Failed to seed monthly budget")?;

        self.store
            .set(
                StorageKey::Initialized.as_str(),
                INITIALIZED_FLAG.to_string(),
            )
            .await
            .context("Failed to set initialized flag")
    }

    async fn write_seed<C: Collection>(&self) -> Result<()> {
        let items = C::seed(&self.seed);
        let json = serde_json::to_string(&items)?;
        self.store
            .set(C::KEY.as_str(), json)
            .await
            .with_context(|| format!("Failed to seed {}", C::KEY))?;
        debug!(key = %C::KEY, count = items.len(), "Seeded collection");
        Ok(())
    }
}
