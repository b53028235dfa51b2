use std::time::Duration;

use chrono::{DateTime, Local, Timelike};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use crate::{externals::display::sink::DisplaySink, formatters::timestamp};

pub const CLOCK_FIELD: &str = "Summary.txtDateTime.txt";

/// How far past each second boundary the clock is written.
pub const TICK_SKEW: Duration = Duration::from_millis(50);

const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// Source of local wall-clock time.
pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Time to sleep from a given sub-second offset until just after the next
/// second boundary.
pub fn delay_until_next_tick(subsec_nanos: u32, skew: Duration) -> Duration {
    // Leap seconds report more than a second's worth of nanos.
    let into_second = subsec_nanos.min(NANOS_PER_SECOND - 1);
    Duration::from_nanos(u64::from(NANOS_PER_SECOND - into_second)) + skew
}

/// Task: Writes the local time to the summary page once a second, each write
/// landing just after the second rolls over. The delay is recomputed from
/// the clock every time round so the ticks never drift.
#[tracing::instrument(skip_all)]
pub async fn task_clock_ticker(
    token: CancellationToken,
    sink: DisplaySink,
    clock: impl WallClock,
) {
    info!("Started.");
    loop {
        let delay = delay_until_next_tick(clock.now().nanosecond(), TICK_SKEW);
        trace!("Next tick in {:?}.", delay);

        tokio::select! {
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
            _ = tokio::time::sleep(delay) => {}
        };

        sink.set_field(CLOCK_FIELD, timestamp(&clock.now())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::display_value::DisplayValue, testing::recording_sink};
    use chrono::TimeZone;
    use tokio::time::Instant;

    /// Wall clock that follows tokio's (paused) clock from a fixed start.
    struct FakeClock {
        start: DateTime<Local>,
        started_at: Instant,
    }

    impl FakeClock {
        fn starting_at(subsec_nanos: u32) -> Self {
            let start = Local
                .timestamp_opt(1_700_000_000, subsec_nanos)
                .single()
                .expect("valid start time");
            Self {
                start,
                started_at: Instant::now(),
            }
        }
    }

    impl WallClock for FakeClock {
        fn now(&self) -> DateTime<Local> {
            let elapsed = Instant::now() - self.started_at;
            self.start + chrono::Duration::from_std(elapsed).expect("elapsed fits")
        }
    }

    #[test]
    fn test_delay_until_next_tick() {
        assert_eq!(
            delay_until_next_tick(0, TICK_SKEW),
            Duration::from_millis(1050)
        );
        assert_eq!(
            delay_until_next_tick(900_000_000, TICK_SKEW),
            Duration::from_millis(150)
        );
        assert_eq!(
            delay_until_next_tick(50_000_000, TICK_SKEW),
            Duration::from_millis(1000)
        );
        assert_eq!(
            delay_until_next_tick(1_500_000_000, Duration::ZERO),
            Duration::from_nanos(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_are_a_second_apart_from_any_offset() {
        for offset_ms in [0u32, 1, 49, 50, 51, 500, 900, 999] {
            let (sink, log) = recording_sink();
            let clock = FakeClock::starting_at(offset_ms * 1_000_000);
            let token = CancellationToken::new();
            let handle = tokio::spawn(task_clock_ticker(token.clone(), sink, clock));

            tokio::time::sleep(Duration::from_millis(5500)).await;
            token.cancel();
            handle.await.expect("ticker panicked");

            let writes = log.writes();
            assert!(writes.len() >= 4, "only {} ticks", writes.len());
            for pair in writes.windows(2) {
                let gap = pair[1].at - pair[0].at;
                assert!(gap >= Duration::from_millis(950), "gap {:?}", gap);
                assert!(gap < Duration::from_millis(1150), "gap {:?}", gap);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_formatted_time_just_after_boundary() {
        let (sink, log) = recording_sink();
        let clock = FakeClock::starting_at(300_000_000);
        let expected_first = clock.start + chrono::Duration::milliseconds(750);
        let token = CancellationToken::new();
        let handle = tokio::spawn(task_clock_ticker(token.clone(), sink, clock));

        tokio::time::sleep(Duration::from_millis(1200)).await;
        token.cancel();
        handle.await.expect("ticker panicked");

        assert_eq!(
            log.values_of(CLOCK_FIELD),
            vec![DisplayValue::Text(timestamp(&expected_first))]
        );
        assert_eq!(expected_first.nanosecond(), 50_000_000);
    }
}
