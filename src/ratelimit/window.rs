//! Bucketed sliding windows for the three quota tiers.
//!
//! Each tracked identifier owns one [`EventWindow`]: three fixed-size rings of
//! per-bucket counters (minute, hour and day). Recording, pruning and counting
//! are O(1) amortised; a window's memory never grows with traffic.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::policy::LimitType;

/// Quota tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Rolling 60 second window
    Minute,
    /// Rolling 3600 second window
    Hour,
    /// Rolling 86400 second window
    Day,
}

impl Period {
    /// Tiers in evaluation order, finest first.
    pub const ALL: [Period; 3] = [Period::Minute, Period::Hour, Period::Day];

    /// Length of this tier's window in seconds.
    pub fn window_secs(&self) -> u64 {
        match self {
            Period::Minute => 60,
            Period::Hour => 3_600,
            Period::Day => 86_400,
        }
    }

    /// Lowercase name used in reasons and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Minute => "minute",
            Period::Hour => "hour",
            Period::Day => "day",
        }
    }

    /// Bucket width and bucket count of this tier's ring.
    fn ring_shape(&self) -> (u64, usize) {
        match self {
            Period::Minute => (1, 60),
            Period::Hour => (60, 60),
            Period::Day => (900, 96),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    bucket: u64,
    count: u32,
}

/// Fixed-size ring of bucket counters covering one tier's window.
///
/// Bucket `b` holds the events recorded during `[b * resolution, (b + 1) * resolution)`.
/// An event at second `t` is inside the window ending at `now` when
/// `now - t < window`. A bucket stays live while any second it spans is still
/// inside the window, so a partially expired bucket is counted in full and the
/// ring over-counts by at most one bucket, never under-counts. `total` is the
/// sum of the live buckets as of the last [`advance`](TierRing::advance).
#[derive(Debug, Clone)]
pub struct TierRing {
    resolution: u64,
    window: u64,
    slots: Box<[Slot]>,
    latest: u64,
    tail: u64,
    total: u64,
}

impl TierRing {
    /// Create an empty ring whose window is `buckets` buckets of `resolution` seconds.
    pub fn new(resolution: u64, buckets: usize) -> Self {
        let resolution = resolution.max(1);
        let buckets = buckets.max(1);
        Self {
            resolution,
            window: resolution * buckets as u64,
            // One extra slot holds the partially expired oldest bucket.
            slots: vec![Slot::default(); buckets + 1].into_boxed_slice(),
            latest: 0,
            tail: 0,
            total: 0,
        }
    }

    /// Create the ring used for `period`.
    pub fn for_period(period: Period) -> Self {
        let (resolution, buckets) = period.ring_shape();
        Self::new(resolution, buckets)
    }

    fn len(&self) -> u64 {
        self.slots.len() as u64
    }

    fn bucket_of(&self, secs: u64) -> u64 {
        secs / self.resolution
    }

    fn index(&self, bucket: u64) -> usize {
        (bucket % self.len()) as usize
    }

    /// Oldest bucket that still spans a second inside the window ending at `now_secs`.
    fn first_live_bucket(&self, now_secs: u64) -> u64 {
        self.bucket_of((now_secs + 1).saturating_sub(self.window))
    }

    /// Effective "now" for reads; a clock that moved backwards reads as the latest time seen.
    fn read_time(&self, now_secs: u64) -> u64 {
        now_secs.max(self.latest)
    }

    /// Evict every bucket that has slid out of the window ending at `now_secs`.
    ///
    /// A clock that moves backwards never rewinds the ring.
    pub fn advance(&mut self, now_secs: u64) {
        if now_secs <= self.latest {
            return;
        }
        self.latest = now_secs;

        let first_live = self.first_live_bucket(now_secs);
        if first_live <= self.tail {
            return;
        }

        if first_live - self.tail >= self.len() {
            self.slots.iter_mut().for_each(|slot| *slot = Slot::default());
            self.total = 0;
        } else {
            for bucket in self.tail..first_live {
                let idx = self.index(bucket);
                if self.slots[idx].bucket == bucket {
                    self.total -= u64::from(self.slots[idx].count);
                    self.slots[idx] = Slot::default();
                }
            }
        }
        self.tail = first_live;
    }

    /// Record one event at `now_secs`.
    pub fn record(&mut self, now_secs: u64) {
        self.advance(now_secs);
        let head = self.bucket_of(self.latest);
        let idx = self.index(head);
        let slot = &mut self.slots[idx];
        if slot.bucket != head {
            self.total -= u64::from(slot.count);
            *slot = Slot {
                bucket: head,
                count: 0,
            };
        }
        slot.count = slot.count.saturating_add(1);
        self.total += 1;
    }

    /// Live event count as of the last advance.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Event count in the window ending at `now_secs`, without mutating the ring.
    pub fn count_at(&self, now_secs: u64) -> u64 {
        self.count_since(now_secs, self.window)
    }

    /// Event count in live buckets spanning any of the last `span_secs` seconds.
    ///
    /// Spans are capped at the ring's window. A bucket only partly inside the
    /// span is counted in full.
    pub fn count_since(&self, now_secs: u64, span_secs: u64) -> u64 {
        let now = self.read_time(now_secs);
        let first = self.bucket_of((now + 1).saturating_sub(span_secs.min(self.window)));
        self.slots
            .iter()
            .filter(|slot| slot.count > 0 && slot.bucket >= first)
            .map(|slot| u64::from(slot.count))
            .sum()
    }

    /// Drop every bucket that starts before `cutoff_secs`.
    pub fn drop_before(&mut self, cutoff_secs: u64) {
        let resolution = self.resolution;
        let mut dropped = 0u64;
        for slot in self.slots.iter_mut() {
            if slot.count > 0 && slot.bucket * resolution < cutoff_secs {
                dropped += u64::from(slot.count);
                *slot = Slot::default();
            }
        }
        self.total = self.total.saturating_sub(dropped);
    }

    /// Start time in seconds of the oldest live bucket.
    pub fn oldest_at(&self, now_secs: u64) -> Option<u64> {
        let first = self.first_live_bucket(self.read_time(now_secs));
        self.slots
            .iter()
            .filter(|slot| slot.count > 0 && slot.bucket >= first)
            .map(|slot| slot.bucket * self.resolution)
            .min()
    }
}

/// Per-identifier traffic history across all tiers.
#[derive(Debug, Clone)]
pub struct EventWindow {
    minute: TierRing,
    hour: TierRing,
    day: TierRing,
    limit_type: LimitType,
}

impl EventWindow {
    /// Create an empty window for an identifier checked as `limit_type`.
    pub fn new(limit_type: LimitType) -> Self {
        Self {
            minute: TierRing::for_period(Period::Minute),
            hour: TierRing::for_period(Period::Hour),
            day: TierRing::for_period(Period::Day),
            limit_type,
        }
    }

    fn ring(&self, period: Period) -> &TierRing {
        match period {
            Period::Minute => &self.minute,
            Period::Hour => &self.hour,
            Period::Day => &self.day,
        }
    }

    /// The limit type this identifier was last checked as.
    pub fn limit_type(&self) -> LimitType {
        self.limit_type
    }

    pub(crate) fn set_limit_type(&mut self, limit_type: LimitType) {
        self.limit_type = limit_type;
    }

    /// Slide every tier to `now_secs`, dropping expired buckets.
    pub fn prune(&mut self, now_secs: u64) {
        self.minute.advance(now_secs);
        self.hour.advance(now_secs);
        self.day.advance(now_secs);
    }

    /// Live count for `period` as of the last prune.
    pub fn count(&self, period: Period) -> u64 {
        self.ring(period).total()
    }

    /// Non-destructive count for `period` in the window ending at `now_secs`.
    pub fn count_at(&self, period: Period, now_secs: u64) -> u64 {
        self.ring(period).count_at(now_secs)
    }

    /// Non-destructive count of events in the last `span_secs` seconds.
    ///
    /// Uses the finest ring that covers the span; spans wider than a day are
    /// capped at the day window. The result is bucket-granular: it may include
    /// events up to one bucket older than the span (1s up to a minute, 60s up
    /// to an hour, 900s up to a day), never fewer than the span holds.
    pub fn count_within(&self, now_secs: u64, span_secs: u64) -> u64 {
        let ring = Period::ALL
            .iter()
            .find(|p| span_secs <= p.window_secs())
            .map(|p| self.ring(*p))
            .unwrap_or(&self.day);
        ring.count_since(now_secs, span_secs)
    }

    /// Record one admitted request.
    pub fn record(&mut self, now_secs: u64) {
        self.minute.record(now_secs);
        self.hour.record(now_secs);
        self.day.record(now_secs);
    }

    /// Drop everything recorded before `cutoff_secs`.
    pub fn drop_before(&mut self, cutoff_secs: u64) {
        self.minute.drop_before(cutoff_secs);
        self.hour.drop_before(cutoff_secs);
        self.day.drop_before(cutoff_secs);
    }

    /// Whether no live events remain as of `now_secs`.
    pub fn is_empty_at(&self, now_secs: u64) -> bool {
        self.day.count_at(now_secs) == 0
    }

    /// Start time of the oldest live bucket, in seconds.
    pub fn oldest_at(&self, now_secs: u64) -> Option<u64> {
        self.day.oldest_at(now_secs)
    }
}
