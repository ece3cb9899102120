//! Integration tests for the serial execution layer.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use opqueue::executor::{Job, SerialExecutor, TokioPool, WorkerPool};

fn tokio_executor() -> SerialExecutor {
    SerialExecutor::new(Arc::new(TokioPool::current().unwrap()))
}

async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

/// One OS thread per job, counting how many jobs it was handed.
#[derive(Default)]
struct ThreadPerJob {
    executed: AtomicUsize,
}

impl WorkerPool for ThreadPerJob {
    fn execute(&self, job: Job) {
        self.executed.fetch_add(1, Ordering::SeqCst);
        std::thread::spawn(job);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn jobs_run_in_submission_order() {
    let executor = tokio_executor();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..20 {
        let order = Arc::clone(&order);
        executor.submit(move || {
            std::thread::sleep(Duration::from_millis(1));
            order.lock().unwrap().push(i);
        });
    }

    assert!(wait_until(|| order.lock().unwrap().len() == 20).await);
    assert_eq!(*order.lock().unwrap(), (0..20).collect::<Vec<_>>());
    assert!(wait_until(|| !executor.is_busy()).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn jobs_never_overlap_under_concurrent_submitters() {
    let executor = tokio_executor();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicUsize::new(0));

    let submitters: Vec<_> = (0..4)
        .map(|_| {
            let executor = executor.clone();
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    let in_flight = Arc::clone(&in_flight);
                    let max_seen = Arc::clone(&max_seen);
                    let done = Arc::clone(&done);
                    executor.submit(move || {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        std::thread::yield_now();
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        done.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        })
        .collect();
    for submitter in submitters {
        submitter.join().unwrap();
    }

    assert!(wait_until(|| done.load(Ordering::SeqCst) == 100).await);
    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_job_does_not_break_the_chain() {
    let executor = tokio_executor();
    let ran = Arc::new(AtomicBool::new(false));

    executor.submit(|| panic!("job failed"));
    let flag = Arc::clone(&ran);
    executor.submit(move || flag.store(true, Ordering::SeqCst));

    assert!(wait_until(|| ran.load(Ordering::SeqCst)).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn later_jobs_wait_behind_the_running_one() {
    let executor = tokio_executor();
    let gate = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicUsize::new(0));

    let g = Arc::clone(&gate);
    let f = Arc::clone(&finished);
    executor.submit(move || {
        while !g.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(2));
        }
        f.fetch_add(1, Ordering::SeqCst);
    });
    for _ in 0..2 {
        let f = Arc::clone(&finished);
        executor.submit(move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
    }

    assert!(executor.is_busy());
    assert_eq!(executor.queued(), 2);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(finished.load(Ordering::SeqCst), 0);

    gate.store(true, Ordering::SeqCst);
    assert!(wait_until(|| finished.load(Ordering::SeqCst) == 3).await);
    assert!(wait_until(|| !executor.is_busy()).await);
    assert_eq!(executor.queued(), 0);
}

#[test]
fn pool_is_handed_one_job_at_a_time() {
    let pool = Arc::new(ThreadPerJob::default());
    let executor = SerialExecutor::new(pool.clone());
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let (tx, rx) = std::sync::mpsc::channel();

    let first = tx.clone();
    executor.submit(move || {
        release_rx.recv_timeout(Duration::from_secs(5)).ok();
        first.send(0).unwrap();
    });
    for i in 1..5 {
        let tx = tx.clone();
        executor.submit(move || tx.send(i).unwrap());
    }

    // Only the head reaches the pool; the rest wait in the executor.
    assert_eq!(pool.executed.load(Ordering::SeqCst), 1);
    assert_eq!(executor.queued(), 4);

    release_tx.send(()).unwrap();
    let received: Vec<_> = (0..5)
        .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
        .collect();
    assert_eq!(received, vec![0, 1, 2, 3, 4]);
    assert_eq!(pool.executed.load(Ordering::SeqCst), 5);
}

#[test]
fn tokio_pool_requires_a_runtime() {
    assert!(TokioPool::current().is_err());
}
