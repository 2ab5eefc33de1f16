use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// An owned, cancellable one-shot timer.
///
/// At most one job is pending at a time; scheduling a new one cancels the previous job if
/// it has not fired yet. Once the delay elapses the job is detached onto its own task, so
/// cancelling afterwards never interrupts work that already started.
#[derive(Debug)]
pub struct Debouncer {
  delay: Duration,
  handle: Option<JoinHandle<()>>,
}

impl Debouncer {
  pub fn new(delay: Duration) -> Self {
    Self { delay, handle: None }
  }

  /// Run `job` after the delay unless it is cancelled or replaced first.
  pub fn schedule<F>(&mut self, job: F)
  where
    F: Future<Output = ()> + Send + 'static,
  {
    self.cancel();
    let delay = self.delay;
    self.handle = Some(tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      tokio::spawn(job);
    }));
  }

  /// Cancel the pending job. Returns `true` if a job was still waiting to fire.
  pub fn cancel(&mut self) -> bool {
    match self.handle.take() {
      Some(handle) => {
        let pending = !handle.is_finished();
        handle.abort();
        pending
      }
      None => false,
    }
  }

  #[cfg(test)]
  pub fn is_pending(&self) -> bool {
    self.handle.as_ref().is_some_and(|h| !h.is_finished())
  }
}

impl Drop for Debouncer {
  fn drop(&mut self) {
    self.cancel();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};

  async fn settle() {
    for _ in 0..8 {
      tokio::task::yield_now().await;
    }
  }

  fn counting_job(counter: &Arc<AtomicUsize>, value: usize) -> impl Future<Output = ()> + Send + 'static {
    let counter = Arc::clone(counter);
    async move {
      counter.store(value, Ordering::SeqCst);
    }
  }

  #[tokio::test(start_paused = true)]
  async fn fires_after_delay() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut debouncer = Debouncer::new(Duration::from_millis(1000));
    debouncer.schedule(counting_job(&hits, 1));
    assert!(debouncer.is_pending());

    tokio::time::sleep(Duration::from_millis(999)).await;
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(2)).await;
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(!debouncer.is_pending());
  }

  #[tokio::test(start_paused = true)]
  async fn reschedule_replaces_pending_job() {
    let value = Arc::new(AtomicUsize::new(0));
    let mut debouncer = Debouncer::new(Duration::from_millis(1000));
    debouncer.schedule(counting_job(&value, 1));
    tokio::time::sleep(Duration::from_millis(600)).await;
    debouncer.schedule(counting_job(&value, 2));

    // The first deadline passes without the first job running.
    tokio::time::sleep(Duration::from_millis(600)).await;
    settle().await;
    assert_eq!(value.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(value.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn cancel_reports_whether_job_was_pending() {
    let value = Arc::new(AtomicUsize::new(0));
    let mut debouncer = Debouncer::new(Duration::from_millis(100));
    assert!(!debouncer.cancel());

    debouncer.schedule(counting_job(&value, 7));
    assert!(debouncer.cancel());
    tokio::time::sleep(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(value.load(Ordering::SeqCst), 0);

    debouncer.schedule(counting_job(&value, 9));
    tokio::time::sleep(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(value.load(Ordering::SeqCst), 9);
    assert!(!debouncer.cancel());
  }
}
