// Job Broker Port (Interface)

use crate::domain::{Job, JobId, JobResult, JobState, LeaseToken, NewJob, Progress, QueueName};
use crate::error::Result;
use async_trait::async_trait;

/// Persistent job store with delayed visibility, leases and retry bookkeeping.
///
/// The broker owns the clock and ID generation for the records it keeps.
/// Writes on behalf of a running attempt are fenced by the `lease_token`
/// handed out by `dequeue`: once that lease is reclaimed or superseded they
/// fail with [`AppError::LeaseLost`](crate::error::AppError::LeaseLost).
#[async_trait]
pub trait JobBroker: Send + Sync {
    /// Store a new job (`delayed` if it has a delay, else `waiting`) and return its ID
    async fn enqueue(&self, job: NewJob) -> Result<JobId>;

    /// Find job by ID
    async fn get(&self, id: &str) -> Result<Option<Job>>;

    /// Lease the next eligible job of a queue.
    ///
    /// Delayed jobs whose `run_at` has passed become `waiting` first. The
    /// lowest priority value wins, then the earliest `run_at`, then insertion
    /// order. The returned job is `active` until `lease_ms` from now and
    /// carries a fresh `lease_token`.
    async fn dequeue(&self, queue: QueueName, lease_ms: i64) -> Result<Option<Job>>;

    /// Record advisory progress for an active job
    async fn update_progress(
        &self,
        id: &str,
        lease: LeaseToken,
        progress: &Progress,
    ) -> Result<()>;

    /// Mark an active job `completed` and apply completed-job retention
    async fn complete(&self, id: &str, lease: LeaseToken, result: &JobResult) -> Result<()>;

    /// Record a failed attempt.
    ///
    /// `retry_at = Some(t)` re-queues the job (`delayed` until `t`, or `waiting`
    /// if `t` is already due); `None` marks it terminally `failed` and applies
    /// failed-job retention.
    async fn fail(
        &self,
        id: &str,
        lease: LeaseToken,
        reason: &str,
        retry_at: Option<i64>,
    ) -> Result<()>;

    /// Remove a job still `waiting` or `delayed`. Returns whether removal occurred.
    async fn remove_pending(&self, id: &str) -> Result<bool>;

    /// Jobs of a queue in the given states, oldest first
    async fn list(&self, queue: QueueName, states: &[JobState]) -> Result<Vec<Job>>;

    /// Count jobs of a queue in one state
    async fn count(&self, queue: QueueName, state: JobState) -> Result<i64>;

    /// Return `active` jobs whose lease has expired to `waiting`
    async fn reclaim_expired_leases(&self) -> Result<Vec<JobId>>;
}

/// In-memory brokers for testing
pub mod mocks {
    use super::*;
    use crate::domain::Retention;
    use crate::error::AppError;
    use crate::port::TimeProvider;
    use std::sync::{Arc, Mutex, MutexGuard};

    struct Entry {
        seq: u64,
        job: Job,
    }

    #[derive(Default)]
    struct State {
        next_seq: u64,
        entries: Vec<Entry>,
    }

    /// Single-mutex broker with sequential numeric IDs ("1", "2", ...)
    pub struct InMemoryJobBroker {
        state: Mutex<State>,
        time_provider: Arc<dyn TimeProvider>,
    }

    impl InMemoryJobBroker {
        pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
            Self {
                state: Mutex::new(State::default()),
                time_provider,
            }
        }

        fn lock(&self) -> MutexGuard<'_, State> {
            self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }

        /// Snapshot of every stored job, oldest first
        pub fn jobs(&self) -> Vec<Job> {
            self.lock().entries.iter().map(|e| e.job.clone()).collect()
        }

        fn leased_job<'a>(
            state: &'a mut State,
            id: &str,
            lease: LeaseToken,
        ) -> Result<&'a mut Job> {
            let entry = state
                .entries
                .iter_mut()
                .find(|e| e.job.id == id)
                .ok_or_else(|| AppError::NotFound(format!("Job {}", id)))?;
            if entry.job.lease_token != lease {
                return Err(AppError::LeaseLost(format!(
                    "Job {} lease {} superseded by {}",
                    id, lease, entry.job.lease_token
                )));
            }
            if entry.job.state != JobState::Active {
                return Err(AppError::InvalidState(format!(
                    "Job {} is {}, expected active",
                    id, entry.job.state
                )));
            }
            Ok(&mut entry.job)
        }

        fn trim(state: &mut State, queue: QueueName, terminal: JobState, keep: u32) {
            let mut finished: Vec<(i64, u64)> = state
                .entries
                .iter()
                .filter(|e| e.job.queue == queue && e.job.state == terminal)
                .map(|e| (e.job.finished_at.unwrap_or(0), e.seq))
                .collect();
            finished.sort_unstable_by(|a, b| b.cmp(a));
            let evicted: Vec<u64> = finished
                .into_iter()
                .skip(keep as usize)
                .map(|(_, seq)| seq)
                .collect();
            state.entries.retain(|e| !evicted.contains(&e.seq));
        }
    }

    #[async_trait]
    impl JobBroker for InMemoryJobBroker {
        async fn enqueue(&self, job: NewJob) -> Result<JobId> {
            let now = self.time_provider.now_millis();
            let mut state = self.lock();
            state.next_seq += 1;
            let seq = state.next_seq;
            let job = Job::from_new(seq.to_string(), now, job);
            let id = job.id.clone();
            state.entries.push(Entry { seq, job });
            Ok(id)
        }

        async fn get(&self, id: &str) -> Result<Option<Job>> {
            Ok(self
                .lock()
                .entries
                .iter()
                .find(|e| e.job.id == id)
                .map(|e| e.job.clone()))
        }

        async fn dequeue(&self, queue: QueueName, lease_ms: i64) -> Result<Option<Job>> {
            let now = self.time_provider.now_millis();
            let mut state = self.lock();

            for entry in state.entries.iter_mut() {
                let job = &mut entry.job;
                if job.queue == queue && job.state == JobState::Delayed && job.run_at <= now {
                    job.state = JobState::Waiting;
                }
            }

            let next = state
                .entries
                .iter_mut()
                .filter(|e| e.job.queue == queue && e.job.state == JobState::Waiting)
                .min_by_key(|e| (e.job.options.priority, e.job.run_at, e.seq));

            Ok(next.map(|entry| {
                let job = &mut entry.job;
                job.state = JobState::Active;
                job.processed_at = Some(now);
                job.lease_expires_at = Some(now.saturating_add(lease_ms));
                job.lease_token += 1;
                job.clone()
            }))
        }

        async fn update_progress(
            &self,
            id: &str,
            lease: LeaseToken,
            progress: &Progress,
        ) -> Result<()> {
            let mut state = self.lock();
            let job = Self::leased_job(&mut state, id, lease)?;
            job.progress = Some(progress.clone());
            Ok(())
        }

        async fn complete(&self, id: &str, lease: LeaseToken, result: &JobResult) -> Result<()> {
            let now = self.time_provider.now_millis();
            let mut state = self.lock();
            let job = Self::leased_job(&mut state, id, lease)?;
            job.state = JobState::Completed;
            job.attempts_made += 1;
            job.result = Some(result.clone());
            job.finished_at = Some(now);
            job.lease_expires_at = None;
            let (queue, Retention { on_complete, .. }) = (job.queue, job.options.retention);
            Self::trim(&mut state, queue, JobState::Completed, on_complete);
            Ok(())
        }

        async fn fail(
            &self,
            id: &str,
            lease: LeaseToken,
            reason: &str,
            retry_at: Option<i64>,
        ) -> Result<()> {
            let now = self.time_provider.now_millis();
            let mut state = self.lock();
            let job = Self::leased_job(&mut state, id, lease)?;
            job.attempts_made += 1;
            job.failed_reason = Some(reason.to_string());
            job.lease_expires_at = None;

            match retry_at {
                Some(run_at) => {
                    job.run_at = run_at;
                    job.state = if run_at > now {
                        JobState::Delayed
                    } else {
                        JobState::Waiting
                    };
                }
                None => {
                    job.state = JobState::Failed;
                    job.finished_at = Some(now);
                    let (queue, Retention { on_fail, .. }) = (job.queue, job.options.retention);
                    Self::trim(&mut state, queue, JobState::Failed, on_fail);
                }
            }
            Ok(())
        }

        async fn remove_pending(&self, id: &str) -> Result<bool> {
            let mut state = self.lock();
            let before = state.entries.len();
            state
                .entries
                .retain(|e| !(e.job.id == id && e.job.state.is_cancellable()));
            Ok(state.entries.len() < before)
        }

        async fn list(&self, queue: QueueName, states: &[JobState]) -> Result<Vec<Job>> {
            Ok(self
                .lock()
                .entries
                .iter()
                .filter(|e| e.job.queue == queue && states.contains(&e.job.state))
                .map(|e| e.job.clone())
                .collect())
        }

        async fn count(&self, queue: QueueName, state: JobState) -> Result<i64> {
            Ok(self
                .lock()
                .entries
                .iter()
                .filter(|e| e.job.queue == queue && e.job.state == state)
                .count() as i64)
        }

        async fn reclaim_expired_leases(&self) -> Result<Vec<JobId>> {
            let now = self.time_provider.now_millis();
            let mut state = self.lock();
            let mut reclaimed = Vec::new();
            for entry in state.entries.iter_mut() {
                let job = &mut entry.job;
                let expired = job.lease_expires_at.is_some_and(|lease| lease <= now);
                if job.state == JobState::Active && expired {
                    job.state = JobState::Waiting;
                    job.lease_expires_at = None;
                    job.lease_token += 1;
                    reclaimed.push(job.id.clone());
                }
            }
            Ok(reclaimed)
        }
    }

    /// Broker whose every call fails (simulates a lost connection)
    pub struct FailingJobBroker {
        message: String,
    }

    impl FailingJobBroker {
        pub fn new(message: impl Into<String>) -> Self {
            Self {
                message: message.into(),
            }
        }

        fn err<T>(&self) -> Result<T> {
            Err(AppError::Database(self.message.clone()))
        }
    }

    #[async_trait]
    impl JobBroker for FailingJobBroker {
        async fn enqueue(&self, _job: NewJob) -> Result<JobId> {
            self.err()
        }

        async fn get(&self, _id: &str) -> Result<Option<Job>> {
            self.err()
        }

        async fn dequeue(&self, _queue: QueueName, _lease_ms: i64) -> Result<Option<Job>> {
            self.err()
        }

        async fn update_progress(
            &self,
            _id: &str,
            _lease: LeaseToken,
            _progress: &Progress,
        ) -> Result<()> {
            self.err()
        }

        async fn complete(&self, _id: &str, _lease: LeaseToken, _result: &JobResult) -> Result<()> {
            self.err()
        }

        async fn fail(
            &self,
            _id: &str,
            _lease: LeaseToken,
            _reason: &str,
            _retry_at: Option<i64>,
        ) -> Result<()> {
            self.err()
        }

        async fn remove_pending(&self, _id: &str) -> Result<bool> {
            self.err()
        }

        async fn list(&self, _queue: QueueName, _states: &[JobState]) -> Result<Vec<Job>> {
            self.err()
        }

        async fn count(&self, _queue: QueueName, _state: JobState) -> Result<i64> {
            self.err()
        }

        async fn reclaim_expired_leases(&self) -> Result<Vec<JobId>> {
            self.err()
        }
    }
}
