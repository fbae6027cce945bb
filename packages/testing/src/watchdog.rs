use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Runs a test with a timeout, so a deadlocked pool fails the test instead of hanging it.
///
/// The timeout is 10 seconds, or 60 seconds under Miri where thread synchronization is
/// dramatically slower.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog is disabled and
/// the test function is executed directly, so mutation testing can detect hanging mutations.
///
/// # Panics
///
/// Panics if the test exceeds the timeout or if the test itself panics.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let answer = with_watchdog(|| 6 * 7);
/// assert_eq!(answer, 42);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let timeout = if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    };

    let (tx, rx) = mpsc::channel();

    let test_thread = thread::spawn(move || {
        // If this fails, the watchdog has already given up on us.
        let _ignored = tx.send(test_fn());
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_thread.join().expect("test thread completed normally");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test did not complete within {timeout:?}, probably deadlocked")
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_thread.join() {
            Ok(()) => panic!("test thread exited without a result"),
            Err(payload) => std::panic::resume_unwind(payload),
        },
    }
}
