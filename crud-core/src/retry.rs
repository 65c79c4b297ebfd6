//! Read-modify-write updates that retry on version conflicts
//!
//! [`RetryOnConflict`] fetches the current state of an object, lets a mutation edit that fresh
//! copy, and submits it guarded by the version token it was fetched with. When another writer
//! got there first the store reports a conflict, and the whole cycle starts over from a new
//! fetch, so changes made by the other writer are never overwritten with stale data.
use std::{convert::Infallible, future::Future, time::Duration};

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{BoxError, ObjectKey, ResourceStore, RetryPolicy, StoreError, UpdateError};

/// Conflict-retrying updates against a [`ResourceStore`]
///
/// ```
/// # use crud_core::{MemoryStore, ObjectKey, RetryOnConflict, RetryPolicy};
/// # use k8s_openapi::api::apps::v1::Deployment;
/// # use std::time::Duration;
/// # async fn wrapper(store: MemoryStore<Deployment>) -> Result<(), crud_core::UpdateError> {
/// let key = ObjectKey::new("default", "web");
/// let updated = RetryOnConflict::new(&store, RetryPolicy::default())
///     .timeout(Duration::from_secs(10))
///     .update(&key, |d| {
///         d.spec.get_or_insert_with(Default::default).replicas = Some(1);
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct RetryOnConflict<'a, S> {
    store: &'a S,
    policy: RetryPolicy,
    timeout: Option<Duration>,
}

impl<'a, S: ResourceStore> RetryOnConflict<'a, S> {
    /// Update objects in `store`, retrying conflicts as allowed by `policy`
    pub fn new(store: &'a S, policy: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            timeout: None,
        }
    }

    /// Give up with [`UpdateError::TimedOut`] once `timeout` has passed
    ///
    /// The timeout spans every attempt and every delay in between. A store call that is
    /// still in flight when it expires is abandoned, so a write cut off this way may or
    /// may not have been applied.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Apply `mutate` to the object at `key` and store the result
    ///
    /// `mutate` is called once per attempt, each time on a freshly fetched copy, so it
    /// must derive its edits from the object it is given and nothing else.
    ///
    /// Returns the object as accepted by the store, carrying its new version token.
    pub async fn update<F>(&self, key: &ObjectKey, mutate: F) -> Result<S::Object, UpdateError>
    where
        F: Fn(&mut S::Object),
    {
        self.try_update(key, |obj| {
            mutate(obj);
            Ok::<_, Infallible>(())
        })
        .await
    }

    /// Like [`update`](Self::update), but `mutate` may refuse the fetched state
    ///
    /// A refusal ends the update with [`UpdateError::Mutate`] and nothing is written.
    #[tracing::instrument(skip_all, fields(key = %key))]
    pub async fn try_update<F, E>(&self, key: &ObjectKey, mutate: F) -> Result<S::Object, UpdateError>
    where
        F: Fn(&mut S::Object) -> Result<(), E>,
        E: Into<BoxError>,
    {
        let started = Instant::now();
        let deadline = self.timeout.map(|timeout| started + timeout);
        let timed_out = |attempts| UpdateError::TimedOut {
            key: key.clone(),
            attempts,
            elapsed: started.elapsed(),
        };

        let mut delays = self.policy.delays();
        let mut waited = Duration::ZERO;
        let mut attempts = 0;
        loop {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(timed_out(attempts));
            }
            attempts += 1;

            debug!(attempt = attempts, "fetching current state");
            let mut object = within(deadline, self.store.fetch(key))
                .await
                .ok_or_else(|| timed_out(attempts))?
                .map_err(|source| UpdateError::Fetch {
                    key: key.clone(),
                    source,
                })?;
            mutate(&mut object).map_err(|err| UpdateError::Mutate {
                key: key.clone(),
                source: err.into(),
            })?;

            let conflict = match within(deadline, self.store.update(object))
                .await
                .ok_or_else(|| timed_out(attempts))?
            {
                Ok(updated) => {
                    debug!(attempt = attempts, "update accepted");
                    return Ok(updated);
                }
                Err(err @ StoreError::Conflict { .. }) => err,
                Err(source) => {
                    return Err(UpdateError::Update {
                        key: key.clone(),
                        source,
                    })
                }
            };

            let exhausted = |last| UpdateError::RetryBudgetExhausted {
                key: key.clone(),
                attempts,
                last,
            };
            let Some(delay) = delays.next() else {
                return Err(exhausted(conflict));
            };
            if self.policy.max_total_delay.is_some_and(|max| waited + delay > max) {
                return Err(exhausted(conflict));
            }
            warn!(attempt = attempts, ?delay, "conflicting write, retrying: {conflict}");
            within(deadline, tokio::time::sleep(delay))
                .await
                .ok_or_else(|| timed_out(attempts))?;
            waited += delay;
        }
    }
}

/// Update the object at `key` with the given `policy` and no timeout
///
/// Shorthand for [`RetryOnConflict::update`].
pub async fn retry_on_conflict<S, F>(
    store: &S,
    policy: RetryPolicy,
    key: &ObjectKey,
    mutate: F,
) -> Result<S::Object, UpdateError>
where
    S: ResourceStore,
    F: Fn(&mut S::Object),
{
    RetryOnConflict::new(store, policy).update(key, mutate).await
}

/// Run `fut` to completion, or until `deadline` passes
async fn within<T>(deadline: Option<Instant>, fut: impl Future<Output = T>) -> Option<T> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}
