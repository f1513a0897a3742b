//! Receive quality, sequence-gap loss and packets-per-second accounting
//!
//! Per-frame updates only touch counters. The derived figures (quality
//! percentage, packets per second, station miss reset) are recomputed from
//! the periodic tick, never from frame arrival.

use std::time::{Duration, SystemTime};

use serde::Serialize;

/// Signal samples kept per access point
pub const NB_PWR: usize = 5;

/// Frames needed before the fast quality refresh applies
pub const QLT_COUNT: u32 = 25;
/// Fast quality refresh interval
pub const QLT_FAST: Duration = Duration::from_millis(500);
/// Slow quality refresh interval
pub const QLT_TIME: Duration = Duration::from_secs(5);
/// Silent time after which missed frames are extrapolated
pub const QLT_SILENCE: Duration = Duration::from_millis(200);

/// Station miss counters are cleared after this much time
pub const STATION_MISSED_RESET: Duration = Duration::from_secs(10);

/// Minimum window for a packets-per-second sample
pub const RATE_WINDOW: Duration = Duration::from_secs(2);

/// Sequence jumps at or above this are treated as noise
pub const MAX_SEQUENCE_GAP: u32 = 1000;

/// Time from `earlier` to `now`, zero if the clock went backwards.
pub fn elapsed(now: SystemTime, earlier: SystemTime) -> Duration {
    now.duration_since(earlier).unwrap_or(Duration::ZERO)
}

/// Frames missed between two 12-bit sequence numbers.
///
/// Retransmissions (same number) and implausible jumps yield `None`.
pub fn sequence_gap(last: Option<u16>, seq: u16) -> Option<u32> {
    let last = last?;
    let diff = u32::from(seq.wrapping_sub(last) & 0x0FFF);
    if diff == 0 {
        return None;
    }
    let missed = diff - 1;
    (missed < MAX_SEQUENCE_GAP).then_some(missed)
}

/// Exponential moving average, `alpha` weighting the new sample.
pub fn moving_exponential_average(sample: i32, previous: i32, alpha: f32) -> i32 {
    (alpha * sample as f32 + (1.0 - alpha) * previous as f32) as i32
}

/// Signal history of an access point.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PowerStats {
    pub samples: [Option<i32>; NB_PWR],
    #[serde(skip)]
    index: usize,
    pub average: Option<i32>,
    pub best: Option<i32>,
}

impl PowerStats {
    pub fn record(&mut self, power: i32) {
        self.index = (self.index + 1) % NB_PWR;
        self.samples[self.index] = Some(power);

        let average = match self.average {
            Some(previous) => moving_exponential_average(power, previous, 0.99),
            None => power,
        };
        self.average = Some(average);
        if self.best.map_or(true, |best| average > best) {
            self.best = Some(average);
        }
    }
}

/// Captured/missed frame accounting for an access point.
#[derive(Debug, Clone, Serialize)]
pub struct RxQuality {
    pub captured: u32,
    pub missed: i64,
    pub last_seq: Option<u16>,
    /// Last computed quality, 0-100
    pub percent: u8,
    #[serde(skip)]
    first_frame: SystemTime,
    #[serde(skip)]
    last_frame: SystemTime,
    #[serde(skip)]
    timer: SystemTime,
}

impl RxQuality {
    pub fn new(now: SystemTime) -> Self {
        Self {
            captured: 0,
            missed: 0,
            last_seq: None,
            percent: 0,
            first_frame: now,
            last_frame: now,
            timer: now,
        }
    }

    /// Account one frame sent by the access point.
    pub fn record_frame(&mut self, seq: u16, now: SystemTime) {
        if self.captured == 0 && self.missed == 0 {
            self.first_frame = now;
        }
        if let Some(missed) = sequence_gap(self.last_seq, seq) {
            self.missed += i64::from(missed);
        }
        self.last_seq = Some(seq);
        self.captured += 1;
        self.last_frame = now;
    }

    /// Recompute `percent` if the refresh interval has passed. Returns true
    /// when the counters were reset.
    pub fn recompute(&mut self, now: SystemTime) -> bool {
        let since_reset = elapsed(now, self.timer);
        let due = (self.captured >= QLT_COUNT && since_reset > QLT_FAST) || since_reset > QLT_TIME;
        if !due {
            return false;
        }

        if self.captured > 1 {
            let capture_time = elapsed(self.last_frame, self.first_frame);
            let silent_time = elapsed(self.first_frame, self.timer) + elapsed(now, self.last_frame);

            // extrapolate frames lost while nothing was heard, assuming a
            // constant frame rate
            if !capture_time.is_zero() && silent_time > QLT_SILENCE {
                let ratio = silent_time.as_secs_f64() / capture_time.as_secs_f64();
                let expected = f64::from(self.captured) + self.missed as f64;
                self.missed += (ratio * expected) as i64;
            }

            let total = f64::from(self.captured) + self.missed as f64;
            let percent = if total > 0.0 {
                f64::from(self.captured) / total * 100.0
            } else {
                0.0
            };
            self.percent = percent.clamp(0.0, 100.0) as u8;
        } else {
            self.percent = 0;
        }

        self.captured = 0;
        self.missed = 0;
        self.timer = now;
        true
    }
}

/// Sequence-gap loss counter of a station.
#[derive(Debug, Clone, Serialize)]
pub struct MissedFrames {
    pub count: u32,
    pub last_seq: Option<u16>,
    #[serde(skip)]
    timer: SystemTime,
}

impl MissedFrames {
    pub fn new(now: SystemTime) -> Self {
        Self {
            count: 0,
            last_seq: None,
            timer: now,
        }
    }

    pub fn record(&mut self, seq: u16) {
        if let Some(missed) = sequence_gap(self.last_seq, seq) {
            self.count += missed;
        }
        self.last_seq = Some(seq);
    }

    /// Clear the counter after a long silence.
    pub fn expire(&mut self, now: SystemTime) {
        if elapsed(now, self.timer) > STATION_MISSED_RESET {
            self.count = 0;
            self.timer = now;
        }
    }
}

/// Windowed packets-per-second estimate over a monotonically growing total.
#[derive(Debug, Clone, Serialize)]
pub struct RateWindow {
    pub per_second: u32,
    #[serde(skip)]
    previous_total: u64,
    #[serde(skip)]
    since: SystemTime,
}

impl RateWindow {
    pub fn new(now: SystemTime) -> Self {
        Self {
            per_second: 0,
            previous_total: 0,
            since: now,
        }
    }

    pub fn update(&mut self, total: u64, now: SystemTime) {
        let pause = elapsed(now, self.since);
        if pause > RATE_WINDOW {
            let delta = total.saturating_sub(self.previous_total);
            self.per_second = (delta as f64 / pause.as_secs_f64()) as u32;
            self.previous_total = total;
            self.since = now;
        }
    }
}
