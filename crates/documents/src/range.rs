use crate::error::{DocumentError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Half-open date interval `[start, end)`; `start` always precedes `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = DocumentError;

    fn try_from(raw: RawDateRange) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start >= end {
            return Err(DocumentError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    #[must_use]
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    #[must_use]
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Intersection with `window`, or `None` when they do not overlap.
    #[must_use]
    pub fn clip(&self, window: &DateRange) -> Option<DateRange> {
        let start = self.start.max(window.start);
        let end = self.end.min(window.end);
        (start < end).then_some(DateRange { start, end })
    }
}

/// Sorted, non-overlapping availability windows of one unit.
///
/// Overlapping input ranges are merged on construction. Ranges that merely
/// touch (`a.end == b.start`) stay separate so a normalized input is kept
/// exactly as supplied; [`AvailabilityRanges::covers`] still treats them as
/// one continuous stretch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<DateRange>", into = "Vec<DateRange>")]
pub struct AvailabilityRanges(Vec<DateRange>);

impl AvailabilityRanges {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn normalize(mut ranges: Vec<DateRange>) -> Self {
        ranges.sort();
        let mut merged: Vec<DateRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if range.start < last.end => {
                    last.end = last.end.max(range.end);
                }
                _ => merged.push(range),
            }
        }
        Self(merged)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[DateRange] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the whole `stay` lies inside available time.
    #[must_use]
    pub fn covers(&self, stay: &DateRange) -> bool {
        let mut reach: Option<NaiveDate> = None;
        for range in &self.0 {
            match reach {
                None => {
                    if range.end <= stay.start {
                        continue;
                    }
                    if range.start > stay.start {
                        return false;
                    }
                    reach = Some(range.end);
                }
                Some(end) if range.start == end => reach = Some(range.end),
                Some(_) => break,
            }
            if reach.is_some_and(|end| end >= stay.end) {
                return true;
            }
        }
        false
    }
}

impl From<Vec<DateRange>> for AvailabilityRanges {
    fn from(ranges: Vec<DateRange>) -> Self {
        Self::normalize(ranges)
    }
}

impl From<AvailabilityRanges> for Vec<DateRange> {
    fn from(ranges: AvailabilityRanges) -> Self {
        ranges.0
    }
}
