//! Threaded materializer for local files and in-memory blobs
//!
//! Requests go onto a shared job queue drained by a small pool of worker
//! threads. Results come back on a second channel and are only handed to the
//! cache when the owning thread polls, so the cache itself never leaves that
//! thread. Completion order across workers is arbitrary.

use crate::entry::Blob;
use crate::loader::{Completion, LoadError, LoadTicket, Materializer};
use crate::source::SourceHandle;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::fs;
use std::io;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct FileMaterializerConfig {
    /// Number of worker threads.
    /// Default: number of logical CPU cores, at most 4.
    pub num_workers: usize,

    /// How long an idle worker waits for a job before checking shutdown.
    /// Default: 100ms.
    pub poll_interval: Duration,
}

impl Default for FileMaterializerConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus().min(4),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl FileMaterializerConfig {
    /// Create a configuration with `num_workers` threads.
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
            ..Self::default()
        }
    }

    /// Set the idle poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

struct Job {
    ticket: LoadTicket,
    source: SourceHandle,
}

/// Reads sources on worker threads and returns [`Blob`] resources.
///
/// Blobs are ready on arrival; no decoding happens here.
pub struct FileMaterializer {
    jobs: Option<Sender<Job>>,
    results: Receiver<Completion<Blob>>,
    rejected: Vec<Completion<Blob>>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl FileMaterializer {
    /// Spawn the worker pool.
    pub fn new(config: FileMaterializerConfig) -> io::Result<Self> {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.num_workers);
        for id in 0..config.num_workers.max(1) {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let shutdown = shutdown.clone();
            let poll_interval = config.poll_interval;
            let handle = thread::Builder::new()
                .name(format!("strip-loader-{id}"))
                .spawn(move || run(jobs, results, shutdown, poll_interval))?;
            workers.push(handle);
        }

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            rejected: Vec::new(),
            workers,
            shutdown,
        })
    }

    /// Number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Stop the workers and wait for them to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.jobs.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::warn!("loader worker panicked");
            }
        }
    }
}

impl Drop for FileMaterializer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Materializer for FileMaterializer {
    type Resource = Blob;

    fn request(&mut self, ticket: LoadTicket, source: &SourceHandle) {
        let job = Job {
            ticket,
            source: source.clone(),
        };
        let sent = match &self.jobs {
            Some(jobs) => jobs.send(job).is_ok(),
            None => false,
        };
        if !sent {
            self.rejected.push(Completion::Failed {
                ticket,
                error: LoadError::Disconnected,
            });
        }
    }

    fn poll_completions(&mut self) -> Vec<Completion<Blob>> {
        let mut completions = std::mem::take(&mut self.rejected);
        completions.extend(self.results.try_iter());
        completions
    }
}

fn run(
    jobs: Receiver<Job>,
    results: Sender<Completion<Blob>>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    loop {
        if shutdown.load(Ordering::Acquire) {
            break;
        }

        let job = match jobs.recv_timeout(poll_interval) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let completion = match read_source(&job.source) {
            Ok(bytes) => Completion::Materialized {
                ticket: job.ticket,
                resource: Blob::new(bytes),
                ready: true,
            },
            Err(error) => Completion::Failed {
                ticket: job.ticket,
                error,
            },
        };

        if results.send(completion).is_err() {
            break;
        }
    }
}

fn read_source(source: &SourceHandle) -> Result<Arc<[u8]>, LoadError> {
    match source {
        SourceHandle::Path(path) => Ok(Arc::from(fs::read(path)?)),
        SourceHandle::Blob(bytes) => Ok(bytes.clone()),
    }
}

fn num_cpus() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoadScheduler;
    use crate::source::SourceList;
    use crate::window::{CacheLimits, WindowCache};
    use std::time::Instant;

    fn drain_until<F>(materializer: &mut FileMaterializer, expected: usize, mut check: F)
    where
        F: FnMut(Completion<Blob>),
    {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = 0;
        while seen < expected && Instant::now() < deadline {
            for completion in materializer.poll_completions() {
                seen += 1;
                check(completion);
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(seen, expected, "timed out waiting for completions");
    }

    #[test]
    fn test_config_defaults() {
        let config = FileMaterializerConfig::default();
        assert!(config.num_workers >= 1);
        assert!(config.num_workers <= 4);
        assert_eq!(config.poll_interval, Duration::from_millis(100));

        let config = FileMaterializerConfig::new(0).with_poll_interval(Duration::from_millis(5));
        assert_eq!(config.num_workers, 1);
        assert_eq!(config.poll_interval, Duration::from_millis(5));
    }

    #[test]
    fn test_reads_files_and_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("001.png");
        fs::write(&path, b"file-bytes").unwrap();

        let mut materializer = FileMaterializer::new(FileMaterializerConfig::new(2)).unwrap();
        materializer.request(
            LoadTicket {
                index: 0,
                generation: 0,
            },
            &SourceHandle::Path(path),
        );
        materializer.request(
            LoadTicket {
                index: 1,
                generation: 0,
            },
            &SourceHandle::Blob(Arc::from(&b"blob-bytes"[..])),
        );

        drain_until(&mut materializer, 2, |completion| match completion {
            Completion::Materialized {
                ticket,
                resource,
                ready,
            } => {
                assert!(ready);
                let expected: &[u8] = if ticket.index == 0 {
                    b"file-bytes"
                } else {
                    b"blob-bytes"
                };
                assert_eq!(resource.bytes(), expected);
            }
            other => panic!("unexpected completion: {other:?}"),
        });

        materializer.shutdown();
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut materializer = FileMaterializer::new(FileMaterializerConfig::new(1)).unwrap();
        materializer.request(
            LoadTicket {
                index: 4,
                generation: 0,
            },
            &SourceHandle::Path(dir.path().join("missing.png")),
        );

        drain_until(&mut materializer, 1, |completion| {
            assert!(matches!(
                completion,
                Completion::Failed {
                    error: LoadError::Io(_),
                    ..
                }
            ));
        });
    }

    #[test]
    fn test_feeds_load_scheduler_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for index in 0..25 {
            fs::write(dir.path().join(format!("{index:03}.jpg")), [index as u8]).unwrap();
        }
        let sources = SourceList::from_dir(dir.path()).unwrap();
        let materializer = FileMaterializer::new(FileMaterializerConfig::new(3)).unwrap();
        let mut loader = LoadScheduler::new(materializer, 10);
        let mut cache = WindowCache::new(CacheLimits::default());

        loader.load_batch(10, &sources, &cache);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut inserted = Vec::new();
        while inserted.len() < 10 && Instant::now() < deadline {
            inserted.extend(loader.pump(&mut cache).inserted);
            thread::sleep(Duration::from_millis(2));
        }

        assert_eq!(inserted, (10..20).collect::<Vec<_>>());
        assert_eq!(cache.entry(12).unwrap().resource().bytes(), &[12u8]);
    }
}
