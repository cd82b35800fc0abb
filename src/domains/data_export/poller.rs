use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domains::data_export::service::DataExportService;
use crate::domains::data_export::types::ImportJob;
use crate::errors::ServiceError;

/// Returned by the apply callback to keep or stop polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

/// Latest view of a polled import, published after every request
#[derive(Debug, Clone, Default)]
pub struct PollSnapshot {
    pub job: Option<ImportJob>,
    pub polls: u32,
    pub failures: u32,
    pub last_error: Option<ServiceError>,
    pub finished: bool,
}

/// Background task polling `GET /imports/:id/status` until the job reaches a
/// terminal status, the callback says stop, or the poller is cancelled.
///
/// Failed polls are logged and counted but never end the loop. Dropping the
/// poller cancels it.
pub struct StatusPoller {
    job_id: String,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    snapshot: watch::Receiver<PollSnapshot>,
}

impl StatusPoller {
    pub fn spawn<F>(service: Arc<dyn DataExportService>, job_id: &str, interval: Duration, mut apply: F) -> Self
    where
        F: FnMut(&ImportJob) -> PollControl + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(PollSnapshot::default());
        let token = cancel.clone();
        let id = job_id.to_string();

        let handle = tokio::spawn(async move {
            let mut snapshot = PollSnapshot::default();
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    result = service.import_status(&id) => result,
                };

                snapshot.polls += 1;
                match result {
                    Ok(job) => {
                        let control = apply(&job);
                        snapshot.finished = job.status.is_terminal() || control == PollControl::Stop;
                        snapshot.job = Some(job);
                        snapshot.last_error = None;
                    }
                    Err(err) => {
                        snapshot.failures += 1;
                        warn!("Status poll {} for import {} failed: {}", snapshot.polls, id, err);
                        snapshot.last_error = Some(err);
                    }
                }
                tx.send_replace(snapshot.clone());
                if snapshot.finished {
                    break;
                }
            }
            debug!("Stopped polling import {} after {} requests", id, snapshot.polls);
        });

        Self {
            job_id: job_id.to_string(),
            cancel,
            handle: Some(handle),
            snapshot: rx,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Stops the loop. No request is started after this returns; one already
    /// in flight is abandoned and its result ignored.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.snapshot.clone()
    }

    pub fn snapshot(&self) -> PollSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Waits for the task to end
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Poller task for import {} ended abnormally: {}", self.job_id, e);
            }
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::data_export::service::MockDataExportService;
    use crate::domains::data_export::types::JobStatus;
    use crate::errors::ApiError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn job(status: JobStatus, progress: f64) -> ImportJob {
        let done: u64 = if status.is_terminal() { 10 } else { 0 };
        serde_json::from_value(serde_json::json!({
            "_id": "imp-1",
            "entityType": "clients",
            "status": status.as_str(),
            "totalRecords": 10,
            "successCount": done,
            "progress": progress
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_polls_until_terminal() {
        let mock = Arc::new(MockDataExportService::new());
        mock.push_status(Ok(job(JobStatus::Processing, 20.0)));
        mock.push_status(Ok(job(JobStatus::Processing, 60.0)));
        mock.push_status(Ok(job(JobStatus::Completed, 100.0)));

        let applied = Arc::new(AtomicU32::new(0));
        let counter = applied.clone();
        let poller = StatusPoller::spawn(mock.clone(), "imp-1", Duration::from_millis(5), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            PollControl::Continue
        });
        let rx = poller.subscribe();
        poller.join().await;

        assert_eq!(applied.load(Ordering::SeqCst), 3);
        assert_eq!(mock.status_call_count(), 3);
        let last = rx.borrow().clone();
        assert!(last.finished);
        assert_eq!(last.job.map(|j| j.status), Some(JobStatus::Completed));
    }

    #[tokio::test]
    async fn test_failed_poll_does_not_stop_loop() {
        let mock = Arc::new(MockDataExportService::new());
        mock.push_status(Err(ServiceError::Network("connection reset".into())));
        mock.push_status(Err(ServiceError::Api(ApiError::new(503, "Service Unavailable"))));
        mock.push_status(Ok(job(JobStatus::Partial, 100.0)));

        let poller = StatusPoller::spawn(mock.clone(), "imp-1", Duration::from_millis(5), |_| PollControl::Continue);
        let rx = poller.subscribe();
        poller.join().await;

        let last = rx.borrow().clone();
        assert_eq!(last.polls, 3);
        assert_eq!(last.failures, 2);
        assert!(last.last_error.is_none());
        assert!(last.finished);
    }

    #[tokio::test]
    async fn test_callback_can_stop() {
        let mock = Arc::new(MockDataExportService::new());
        mock.push_status(Ok(job(JobStatus::Processing, 10.0)));

        let poller = StatusPoller::spawn(mock.clone(), "imp-1", Duration::from_millis(5), |_| PollControl::Stop);
        poller.join().await;
        assert_eq!(mock.status_call_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_requests() {
        let mock = Arc::new(MockDataExportService::new());
        mock.push_status(Ok(job(JobStatus::Processing, 10.0)));

        let poller = StatusPoller::spawn(mock.clone(), "imp-1", Duration::from_millis(5), |_| PollControl::Continue);
        tokio::time::sleep(Duration::from_millis(30)).await;
        poller.cancel();
        assert!(poller.is_cancelled());
        poller.join().await;

        let calls = mock.status_call_count();
        assert!(calls >= 1);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(mock.status_call_count(), calls);
    }
}
