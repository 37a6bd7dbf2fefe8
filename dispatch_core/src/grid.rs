// dispatch_core/src/grid.rs

//! Fixed 5-minute time grid anchored at a persisted epoch date.
//! Slot zero is midnight of the epoch date; every later slot is one 5-minute interval.

pub const SLOT_MINUTES: i64 = 5;
pub const SLOT_SECONDS: i64 = SLOT_MINUTES * 60;
pub const SLOTS_PER_DAY: usize = 288;
pub const SLOTS_PER_HALF_HOUR: usize = 6;
pub const HALF_HOURS_PER_DAY: usize = SLOTS_PER_DAY / SLOTS_PER_HALF_HOUR;

/// Converts timestamps into slot numbers relative to the epoch date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridIndexer {
    epoch: Option<chrono::NaiveDate>,
}

impl GridIndexer {
    pub fn new(epoch: Option<chrono::NaiveDate>) -> Self {
        GridIndexer { epoch }
    }

    pub fn epoch(&self) -> Option<chrono::NaiveDate> {
        self.epoch
    }

    /// Resolves the slot for `timestamp`.
    ///
    /// When no epoch exists yet and `allow_epoch_fill` is set, the date of `timestamp`
    /// becomes the epoch. The epoch is never replaced once set.
    ///
    /// # Returns
    /// * `None` if there is no epoch (and filling is not allowed) or `timestamp` precedes it.
    pub fn slot_for(&mut self, timestamp: chrono::NaiveDateTime, allow_epoch_fill: bool) -> Option<usize> {
        if self.epoch.is_none() {
            if !allow_epoch_fill {
                return None;
            }
            self.epoch = Some(timestamp.date());
        }
        self.lookup(timestamp)
    }

    /// Same as `slot_for` without ever filling the epoch.
    pub fn lookup(&self, timestamp: chrono::NaiveDateTime) -> Option<usize> {
        let epoch_start = self.epoch?.and_time(chrono::NaiveTime::MIN);
        let delta = timestamp - epoch_start;
        if delta < chrono::TimeDelta::zero() {
            return None;
        }
        let slot = delta.num_days() * SLOTS_PER_DAY as i64
            + (delta.num_seconds() % 86_400) / SLOT_SECONDS;
        usize::try_from(slot).ok()
    }

    /// First slot of `date`, or `None` if the date precedes the epoch.
    pub fn day_start_slot(&self, date: chrono::NaiveDate) -> Option<usize> {
        self.lookup(date.and_time(chrono::NaiveTime::MIN))
    }

    /// Calendar date that contains `slot`.
    pub fn date_of_slot(&self, slot: usize) -> Option<chrono::NaiveDate> {
        let days = (slot / SLOTS_PER_DAY) as u64;
        self.epoch?.checked_add_days(chrono::Days::new(days))
    }

}
