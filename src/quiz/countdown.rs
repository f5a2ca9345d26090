use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::quiz::session::{Score, SessionError, TestSession, Tick};
use crate::quiz::Question;

/// A running test together with the task that drives its clock.
///
/// The countdown is aborted when the test is submitted by hand and when the
/// `TimedTest` is dropped, so no tick can reach a finished session.
pub struct TimedTest {
    session: Arc<Mutex<TestSession>>,
    countdown: JoinHandle<()>,
}

impl TimedTest {
    /// Starts `questions` with a clock of `duration_seconds`, ticking every `period`.
    ///
    /// `on_expired` runs once if the clock reaches zero before a manual submit.
    pub fn start<F, Fut>(
        questions: Vec<Question>,
        duration_seconds: u32,
        period: Duration,
        on_expired: F,
    ) -> Result<Self, SessionError>
    where
        F: FnOnce(Score, Vec<String>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut session = TestSession::new();
        session.start(questions, duration_seconds)?;
        let session = Arc::new(Mutex::new(session));

        let countdown = tokio::spawn(run_countdown(session.clone(), period, on_expired));
        Ok(Self { session, countdown })
    }

    pub fn session(&self) -> Arc<Mutex<TestSession>> {
        self.session.clone()
    }

    /// Submits by hand. Returns the score and the review, or `None` if the
    /// clock already ran out.
    pub async fn submit(&self) -> Option<(Score, Vec<String>)> {
        self.countdown.abort();
        let mut session = self.session.lock().await;
        let score = session.submit()?;
        Some((score, session.review()))
    }

    pub fn is_ticking(&self) -> bool {
        !self.countdown.is_finished()
    }
}

impl Drop for TimedTest {
    fn drop(&mut self) {
        self.countdown.abort();
    }
}

async fn run_countdown<F, Fut>(session: Arc<Mutex<TestSession>>, period: Duration, on_expired: F)
where
    F: FnOnce(Score, Vec<String>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut interval = tokio::time::interval(period);
    // The first tick of an interval completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        let (tick, review) = {
            let mut session = session.lock().await;
            let tick = session.tick();
            let review = match tick {
                Tick::Expired(_) => session.review(),
                _ => Vec::new(),
            };
            (tick, review)
        };

        match tick {
            Tick::Running { remaining_seconds } => {
                if remaining_seconds % 60 == 0 {
                    debug!("{} seconds left", remaining_seconds);
                }
            }
            Tick::Expired(score) => {
                info!("Countdown expired with {}/{} correct", score.correct, score.total);
                on_expired(score, review).await;
                return;
            }
            Tick::Ignored => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::session::Phase;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn questions() -> Vec<Question> {
        (1..=4)
            .map(|id| {
                Question::new(
                    id,
                    format!("q{}", id),
                    ["a".into(), "b".into(), "c".into(), "d".into()],
                    0,
                )
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_runs_callback_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let on_expired = move |score: Score, review: Vec<String>| async move {
            assert_eq!(score.total, 4);
            assert_eq!(review.len(), 4);
            counter.fetch_add(1, Ordering::SeqCst);
        };
        let test = TimedTest::start(questions(), 5, Duration::from_secs(1), on_expired).unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        let session = test.session();
        let session = session.lock().await;
        assert_eq!(session.remaining_seconds(), 0);
        assert_eq!(session.phase(), Phase::Submitted);
        assert!(!test.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_submit_cancels_countdown() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let test = TimedTest::start(questions(), 5, Duration::from_secs(1), move |_, _| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        test.session().lock().await.answer_current(0).unwrap();
        let (score, _) = test.submit().await.unwrap();
        assert_eq!(score.correct, 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(test.session().lock().await.remaining_seconds(), 3);
        assert!(test.submit().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_test_stops_the_clock() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let test = TimedTest::start(questions(), 5, Duration::from_secs(1), move |_, _| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        let session = test.session();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        drop(test);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        let session = session.lock().await;
        assert_eq!(session.remaining_seconds(), 3);
        assert_eq!(session.phase(), Phase::InProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_before_the_first_tick_never_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let test = TimedTest::start(questions(), 1, Duration::from_secs(1), move |_, _| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        let session = test.session();
        drop(test);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(session.lock().await.remaining_seconds(), 1);
    }

    #[tokio::test]
    async fn invalid_config_is_reported() {
        let result = TimedTest::start(Vec::new(), 5, Duration::from_secs(1), |_, _| async {});
        assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
    }
}
