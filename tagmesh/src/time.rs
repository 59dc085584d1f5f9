//! Time APIs for obtaining the current tick count and calculating with points in time and
//! durations.
//!
//! These APIs are made for the scanning node and are not meant to be general-purpose. The system
//! tick has millisecond resolution, so everything here uses 32-bit millisecond arithmetic. The
//! tick counter wraps after about 49 days; all deadline comparisons use wrapping arithmetic so a
//! node left running across the wrap keeps scanning.

use core::fmt;
use core::ops::{Add, AddAssign, Sub, SubAssign};

/// A duration with millisecond resolution.
///
/// Overflows in arithmetic will result in a panic, but shouldn't happen since the node never
/// deals with durations beyond a few seconds.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(u32);

impl Duration {
    /// Creates a [`Duration`] from a number of milliseconds.
    pub const fn from_millis(millis: u32) -> Self {
        Duration(millis)
    }

    /// Creates a [`Duration`] representing a number of seconds.
    pub const fn from_secs(secs: u16) -> Self {
        Duration(secs as u32 * 1_000)
    }

    /// Returns the number of whole seconds that fit in `self`.
    pub fn whole_secs(&self) -> u32 {
        self.0 / 1_000
    }

    /// Returns the number of milliseconds represented by `self`.
    pub fn as_millis(&self) -> u32 {
        self.0
    }
}

impl Add for Duration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Duration(self.0.checked_add(rhs.0).expect("duration overflow"))
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Duration {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Duration(self.0.checked_sub(rhs.0).expect("duration underflow"))
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1000 {
            let (secs, subsec_millis) = (self.whole_secs(), self.0 % 1000);
            if subsec_millis == 0 {
                write!(f, "{}s", secs)
            } else {
                write!(f, "{}.{:03}s", secs, subsec_millis)
            }
        } else {
            write!(f, "{}ms", self.0)
        }
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}

/// A point in time, relative to an unspecified epoch.
///
/// This has millisecond resolution and wraps around after about 49 days. Apart from the
/// wraparound, it is monotonic.
///
/// `Instant`s are obtained from an implementation of [`Timer`]. `Instant`s created from different
/// [`Timer`] instances (even when using the same implementation) are not compatible, and mixing
/// them in operations causes unspecified results.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Instant(u32);

impl Instant {
    /// The maximum time between two `Instant`s that can be handled by [`Instant::duration_since`].
    ///
    /// This is defined to be a value of a few minutes, far beyond any deadline the node arms.
    pub const MAX_TIME_BETWEEN: Duration = Duration(1_000 * 60 * 5); // 5 minutes

    /// Creates an `Instant` from raw milliseconds since an arbitrary implementation-defined
    /// reference point.
    ///
    /// This should only be called from a [`Timer`] implementation.
    pub fn from_raw_millis(millis: u32) -> Self {
        Instant(millis)
    }

    /// Returns the raw value from which this `Instant` was created.
    pub fn raw_millis(&self) -> u32 {
        self.0
    }

    /// Calculates the duration of time that has passed between `earlier` and `self`.
    ///
    /// The maximum duration that can be calculated by this method is defined as
    /// [`Instant::MAX_TIME_BETWEEN`]. Calling this method when the `Instant`s are further apart is
    /// an error and may panic, as a safeguard against wrapped-around counters producing wildly
    /// incorrect durations.
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        let millis_passed = self.0.wrapping_sub(earlier.0);
        debug_assert!(
            millis_passed <= Self::MAX_TIME_BETWEEN.0,
            "{}ms between instants {} and {}",
            millis_passed,
            earlier,
            self
        );

        Duration(millis_passed)
    }

    /// Returns whether a deadline stored in `self` has been reached at time `now`.
    ///
    /// A deadline counts as reached as soon as `now` is at or past it. The comparison is done in
    /// wrapping arithmetic: `now` instants up to half the counter range past the deadline report
    /// `true`, everything else reports `false`.
    pub fn reached_by(&self, now: Instant) -> bool {
        now.0.wrapping_sub(self.0) < u32::max_value() / 2
    }
}

/// [`Instant`]s can be subtracted, which computes the [`Duration`] between the rhs and lhs using
/// [`Instant::duration_since`].
impl Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.duration_since(rhs)
    }
}

/// A [`Duration`] can be added to an [`Instant`], moving the [`Instant`] forwards in time.
impl Add<Duration> for Instant {
    type Output = Self;

    fn add(self, d: Duration) -> Self {
        Instant(self.0.wrapping_add(d.as_millis()))
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, d: Duration) {
        *self = *self + d;
    }
}

/// A [`Duration`] can be subtracted from an [`Instant`], moving the [`Instant`] backwards in time.
impl Sub<Duration> for Instant {
    type Output = Self;

    fn sub(self, d: Duration) -> Self {
        Instant(self.0.wrapping_sub(d.as_millis()))
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1000 {
            let (secs, subsec_millis) = (self.0 / 1000, self.0 % 1000);
            if subsec_millis == 0 {
                write!(f, "{}s", secs)
            } else {
                write!(f, "{}.{:03}s", secs, subsec_millis)
            }
        } else {
            write!(f, "{}ms", self.0)
        }
    }
}

impl fmt::Debug for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}

/// Trait for time providers.
///
/// The hardware interface has to provide an implementation of `Timer` backed by a 1 kHz tick.
///
/// This trait can also be implemented by a mock timer for testing.
pub trait Timer {
    /// Obtain the current time as an [`Instant`].
    ///
    /// The [`Instant`]s returned by this function must never move backwards in time, except when
    /// the underlying counter wraps around.
    fn now(&self) -> Instant;

    /// Waits until `d` has passed.
    ///
    /// The default implementation busy-waits on [`Timer::now`]. Implementations backed by real
    /// hardware may override this to enter a low-power wait state between ticks. Only bring-up
    /// code uses this; the main loop never blocks.
    fn delay(&self, d: Duration) {
        let end = self.now() + d;
        while !end.reached_by(self.now()) {}
    }
}
