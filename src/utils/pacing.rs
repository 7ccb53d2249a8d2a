use crate::core::DelayRange;
use tokio::time::{sleep, Duration};

/// Sleeps for a random duration drawn from `range`. Zero ranges return at once.
pub async fn pause(range: DelayRange) {
    let ms = range.sample();
    if ms > 0 {
        sleep(Duration::from_millis(ms)).await;
    }
}
