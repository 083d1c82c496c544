//! Time-of-day and date-time columns.
//!
//! Time columns store nanoseconds of the day as `i64`, date-time columns
//! store unix seconds plus an optional buffer of subsecond nanoseconds that
//! is only present for nanosecond-precision columns. Both use a reserved
//! sentinel for missing rows.

use std::sync::Arc;

use time::{OffsetDateTime, Time};

use crate::{column::numeric::view_row, Error, Result};

/// Sentinel marking a missing time-of-day value.
pub const MISSING_TIME: i64 = i64::MIN;

/// Sentinel marking a missing date-time value.
pub const MISSING_DATE_TIME: i64 = i64::MIN;

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Converts a time of day into the nanosecond-of-day representation time
/// columns store.
pub fn nanos_of_day(time: Time) -> i64 {
    let (hour, minute, second, nano) = time.as_hms_nano();
    (i64::from(hour) * 3600 + i64::from(minute) * 60 + i64::from(second)) * NANOS_PER_SECOND
        + i64::from(nano)
}

fn time_from_nanos(nanos: i64) -> Option<Time> {
    if !(0..SECONDS_PER_DAY * NANOS_PER_SECOND).contains(&nanos) {
        return None;
    }
    let seconds = nanos / NANOS_PER_SECOND;
    Time::from_hms_nano(
        (seconds / 3600) as u8,
        ((seconds / 60) % 60) as u8,
        (seconds % 60) as u8,
        (nanos % NANOS_PER_SECOND) as u32,
    )
    .ok()
}

#[derive(Debug, Clone)]
enum TimeRepr {
    Dense(Arc<[i64]>),
    Mapped {
        data: Arc<[i64]>,
        mapping: Arc<[i32]>,
    },
}

/// An immutable column of time-of-day values.
#[derive(Debug, Clone)]
pub struct TimeColumn {
    len: usize,
    repr: TimeRepr,
}

impl TimeColumn {
    /// Creates a column over raw nanosecond-of-day values, missing rows
    /// marked with [`MISSING_TIME`].
    pub fn dense(data: impl Into<Arc<[i64]>>) -> Self {
        let data = data.into();
        Self {
            len: data.len(),
            repr: TimeRepr::Dense(data),
        }
    }

    pub fn from_times<I>(times: I) -> Self
    where
        I: IntoIterator<Item = Option<Time>>,
    {
        let data = times
            .into_iter()
            .map(|time| time.map_or(MISSING_TIME, nanos_of_day))
            .collect::<Vec<_>>();
        Self::dense(data)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The raw nanoseconds of the day at `row`, [`MISSING_TIME`] for
    /// missing.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    pub fn get_nanos(&self, row: usize) -> i64 {
        assert!(row < self.len, "row {row} out of range for {}", self.len);
        match &self.repr {
            TimeRepr::Dense(data) => data[row],
            TimeRepr::Mapped { data, mapping } => match view_row(mapping, row, data.len()) {
                Some(source) => data[source],
                None => MISSING_TIME,
            },
        }
    }

    /// The value at `row`, `None` for missing.
    pub fn get_time(&self, row: usize) -> Option<Time> {
        let nanos = self.get_nanos(row);
        if nanos == MISSING_TIME {
            None
        } else {
            time_from_nanos(nanos)
        }
    }

    /// Reads the nanosecond values numerically into the covered prefix of
    /// `buf`, missing as `NaN`; the rest of `buf` is left untouched.
    pub fn fill(&self, buf: &mut [f64], start: usize) {
        let n = buf.len().min(self.len.saturating_sub(start));
        if n == 0 {
            return;
        }
        match &self.repr {
            TimeRepr::Dense(data) => {
                for (slot, &nanos) in buf[..n].iter_mut().zip(&data[start..start + n]) {
                    *slot = nanos_to_f64(nanos);
                }
            }
            TimeRepr::Mapped { data, mapping } => {
                for (slot, &row) in buf[..n].iter_mut().zip(&mapping[start..start + n]) {
                    *slot = if row >= 0 && (row as usize) < data.len() {
                        nanos_to_f64(data[row as usize])
                    } else {
                        f64::NAN
                    };
                }
            }
        }
    }

    /// Interleaved variant of [`fill`](Self::fill), padding positions past
    /// the end of the column with `NaN`.
    ///
    /// # Panics
    ///
    /// Panics if `stride` is zero.
    pub fn fill_interleaved(&self, buf: &mut [f64], start: usize, offset: usize, stride: usize) {
        assert!(stride >= 1, "stride must be positive");
        let from = offset.min(buf.len());
        let mut row = start;
        for slot in buf[from..].iter_mut().step_by(stride) {
            *slot = if row < self.len {
                nanos_to_f64(self.get_nanos(row))
            } else {
                f64::NAN
            };
            row += 1;
        }
    }

    /// Applies a row mapping, producing either a lazy view or an eagerly
    /// materialized column with identical reads.
    pub fn map(&self, mapping: &Arc<[i32]>, prefer_view: bool) -> Self {
        let repr = match (&self.repr, prefer_view) {
            (TimeRepr::Dense(data), true) => TimeRepr::Mapped {
                data: data.clone(),
                mapping: mapping.clone(),
            },
            (TimeRepr::Mapped { data, mapping: old }, true) => TimeRepr::Mapped {
                data: data.clone(),
                mapping: crate::mapping::compose(old, mapping).into(),
            },
            _ => {
                let data = mapping
                    .iter()
                    .map(|&row| {
                        if row >= 0 && (row as usize) < self.len {
                            self.get_nanos(row as usize)
                        } else {
                            MISSING_TIME
                        }
                    })
                    .collect::<Vec<_>>();
                TimeRepr::Dense(data.into())
            }
        };
        Self {
            len: mapping.len(),
            repr,
        }
    }
}

fn nanos_to_f64(nanos: i64) -> f64 {
    if nanos == MISSING_TIME {
        f64::NAN
    } else {
        nanos as f64
    }
}

#[derive(Debug, Clone)]
enum DateTimeRepr {
    Dense {
        seconds: Arc<[i64]>,
        nanos: Option<Arc<[i32]>>,
    },
    Mapped {
        seconds: Arc<[i64]>,
        nanos: Option<Arc<[i32]>>,
        mapping: Arc<[i32]>,
    },
}

/// An immutable column of date-time values with second or nanosecond
/// precision.
#[derive(Debug, Clone)]
pub struct DateTimeColumn {
    len: usize,
    repr: DateTimeRepr,
}

impl DateTimeColumn {
    /// Creates a column over raw unix seconds and, for nanosecond
    /// precision, a parallel buffer of subsecond nanoseconds. Missing rows
    /// are marked with [`MISSING_DATE_TIME`] in the seconds buffer.
    pub fn dense(
        seconds: impl Into<Arc<[i64]>>,
        nanos: Option<Arc<[i32]>>,
    ) -> Result<Self> {
        let seconds = seconds.into();
        if let Some(nanos) = &nanos {
            if nanos.len() != seconds.len() {
                return Err(Error::SubsecondLength {
                    seconds: seconds.len(),
                    nanos: nanos.len(),
                });
            }
        }
        Ok(Self {
            len: seconds.len(),
            repr: DateTimeRepr::Dense { seconds, nanos },
        })
    }

    /// Collects date-times, keeping a subsecond buffer only if some value
    /// actually carries subsecond information.
    pub fn from_datetimes<I>(datetimes: I) -> Self
    where
        I: IntoIterator<Item = Option<OffsetDateTime>>,
    {
        let mut seconds = Vec::new();
        let mut nanos = Vec::new();
        let mut nano_precision = false;
        for datetime in datetimes {
            match datetime {
                Some(value) => {
                    seconds.push(value.unix_timestamp());
                    let nano = value.nanosecond() as i32;
                    nano_precision |= nano != 0;
                    nanos.push(nano);
                }
                None => {
                    seconds.push(MISSING_DATE_TIME);
                    nanos.push(0);
                }
            }
        }
        let nanos = nano_precision.then(|| nanos.into());
        Self {
            len: seconds.len(),
            repr: DateTimeRepr::Dense {
                seconds: seconds.into(),
                nanos,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether this column stores subsecond nanoseconds.
    pub fn nano_precision(&self) -> bool {
        match &self.repr {
            DateTimeRepr::Dense { nanos, .. } => nanos.is_some(),
            DateTimeRepr::Mapped { nanos, .. } => nanos.is_some(),
        }
    }

    /// The raw `(unix seconds, subsecond nanos)` pair at `row`, `None` for
    /// missing.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    pub fn get_parts(&self, row: usize) -> Option<(i64, i32)> {
        assert!(row < self.len, "row {row} out of range for {}", self.len);
        let (seconds, nanos, source) = match &self.repr {
            DateTimeRepr::Dense { seconds, nanos } => (seconds, nanos, Some(row)),
            DateTimeRepr::Mapped {
                seconds,
                nanos,
                mapping,
            } => (seconds, nanos, view_row(mapping, row, seconds.len())),
        };
        let source = source?;
        let second = seconds[source];
        if second == MISSING_DATE_TIME {
            return None;
        }
        let nano = nanos.as_ref().map_or(0, |nanos| nanos[source]);
        Some((second, nano))
    }

    /// The value at `row`, `None` for missing.
    pub fn get_datetime(&self, row: usize) -> Option<OffsetDateTime> {
        let (seconds, nanos) = self.get_parts(row)?;
        OffsetDateTime::from_unix_timestamp_nanos(
            i128::from(seconds) * i128::from(NANOS_PER_SECOND) + i128::from(nanos),
        )
        .ok()
    }

    /// Applies a row mapping, producing either a lazy view or an eagerly
    /// materialized column with identical reads.
    pub fn map(&self, mapping: &Arc<[i32]>, prefer_view: bool) -> Self {
        let repr = match (&self.repr, prefer_view) {
            (DateTimeRepr::Dense { seconds, nanos }, true) => DateTimeRepr::Mapped {
                seconds: seconds.clone(),
                nanos: nanos.clone(),
                mapping: mapping.clone(),
            },
            (
                DateTimeRepr::Mapped {
                    seconds,
                    nanos,
                    mapping: old,
                },
                true,
            ) => DateTimeRepr::Mapped {
                seconds: seconds.clone(),
                nanos: nanos.clone(),
                mapping: crate::mapping::compose(old, mapping).into(),
            },
            _ => {
                let with_nanos = self.nano_precision();
                let mut seconds = Vec::with_capacity(mapping.len());
                let mut nanos = Vec::with_capacity(mapping.len());
                for &row in mapping.iter() {
                    let parts = if row >= 0 && (row as usize) < self.len {
                        self.get_parts(row as usize)
                    } else {
                        None
                    };
                    match parts {
                        Some((second, nano)) => {
                            seconds.push(second);
                            nanos.push(nano);
                        }
                        None => {
                            seconds.push(MISSING_DATE_TIME);
                            nanos.push(0);
                        }
                    }
                }
                DateTimeRepr::Dense {
                    seconds: seconds.into(),
                    nanos: with_nanos.then(|| nanos.into()),
                }
            }
        };
        Self {
            len: mapping.len(),
            repr,
        }
    }
}
