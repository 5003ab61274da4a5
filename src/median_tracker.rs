use alloc::vec::Vec;
use core::fmt::{self, Debug, Display};

use log::{debug, trace};
use num_traits::float::FloatCore;
use ordered_float::OrderedFloat;

use crate::{
    DuplicatePolicy, Error, NodeRef, Op, RbTree, Violation,
    helper::{median_from_sorted_slice, midpoint},
};

/// A median value as reported by [`MedianTracker::current_median`].
///
/// Medians of whole-numbered inputs are either whole or exact halves. The
/// [`Display`] impl renders whole values without a fractional part (`4`) and
/// everything else unchanged (`4.5`).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Median<T>(T);

impl<T: FloatCore> Median<T> {
    /// The wrapped value
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }

    /// Returns `true` when the median has no fractional part
    #[inline]
    pub fn is_integral(&self) -> bool {
        self.0.is_finite() && self.0.fract() == T::zero()
    }
}

impl<T: FloatCore + Display> Display for Median<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_integral() {
            // `-0.0 + 0.0` is `+0.0`
            write!(f, "{:.0}", self.0 + T::zero())
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Running median of a multiset under inserts and deletes.
///
/// The tracker keeps a handle on the *center*: the node at in-order rank
/// `ceil(size / 2)`. Each `add`/`remove` moves the center at most one step
/// through the tree, so the median is maintained in `O(log n)` per update
/// without ever being recomputed from scratch.
///
/// When the size is even the center sits just left of the midpoint and the
/// median is the average of the center and its successor.
///
/// # Type Parameters
///
/// * `T` - A floating point type, ordered through `OrderedFloat`
#[derive(Debug, Clone)]
pub struct MedianTracker<T> {
    /// Ordered multiset of the values added so far
    tree: RbTree<OrderedFloat<T>>,
    /// Node at rank `ceil(size / 2)`, `None` when empty
    center: Option<NodeRef>,
    /// Cached median, `None` when empty
    median: Option<T>,
}

impl<T: FloatCore + Debug> Default for MedianTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FloatCore + Debug> MedianTracker<T> {
    /// Creates an empty tracker that accepts repeated values.
    pub const fn new() -> Self {
        Self::with_policy(DuplicatePolicy::Allow)
    }

    /// Creates an empty tracker with room for `capacity` values before it reallocates.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tree: RbTree::with_capacity(capacity),
            center: None,
            median: None,
        }
    }

    /// Creates an empty tracker with the given duplicate-value policy.
    ///
    /// With [`DuplicatePolicy::Reject`], adding a value already present fails
    /// with [`Error::DuplicateKey`].
    pub const fn with_policy(policy: DuplicatePolicy) -> Self {
        Self {
            tree: RbTree::with_policy(policy),
            center: None,
            median: None,
        }
    }

    /// Number of values tracked, counting repeats.
    #[inline]
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` when no values are tracked.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Drops every value.
    pub fn clear(&mut self) {
        self.tree.clear();
        self.center = None;
        self.median = None;
    }

    /// The underlying ordered multiset.
    #[inline]
    pub const fn tree(&self) -> &RbTree<OrderedFloat<T>> {
        &self.tree
    }

    /// Current median.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyCollection`] when nothing is tracked.
    pub fn current_median(&self) -> Result<Median<T>, Error> {
        self.median.map(Median).ok_or(Error::EmptyCollection)
    }

    /// Adds a value.
    ///
    /// # Errors
    ///
    /// * [`Error::NotANumber`] for NaN.
    /// * [`Error::DuplicateKey`] for a repeat under [`DuplicatePolicy::Reject`].
    ///
    /// The tracker is unchanged on error.
    pub fn add(&mut self, value: T) -> Result<(), Error> {
        if value.is_nan() {
            debug!("add rejected: NaN");
            return Err(Error::NotANumber);
        }

        let key = OrderedFloat(value);
        let node = self.tree.insert(key).inspect_err(|err| {
            debug!("add {value:?} rejected: {err}");
        })?;

        let Some(center) = self.center else {
            self.center = Some(node);
            self.median = Some(value);
            trace!("add {value:?}: size=1 median={value:?}");
            return Ok(());
        };

        let even = self.tree.len() % 2 == 0;
        let center_key = *self.tree.key(center);

        // Equal keys descend right, so `key >= center` lands after the center.
        let (center, median) = if key >= center_key {
            if even {
                let next = self.step(center, Step::Forward)?;
                (center, self.midpoint(center, next))
            } else {
                let next = self.step(center, Step::Forward)?;
                (next, self.value_at(next))
            }
        } else if even {
            let prev = self.step(center, Step::Back)?;
            (prev, self.midpoint(prev, center))
        } else {
            (center, center_key.into_inner())
        };

        self.center = Some(center);
        self.median = Some(median);
        trace!("add {value:?}: size={} median={median:?}", self.tree.len());
        Ok(())
    }

    /// Removes one occurrence of a value.
    ///
    /// # Errors
    ///
    /// * [`Error::EmptyCollection`] when nothing is tracked.
    /// * [`Error::KeyNotFound`] when the value is absent.
    ///
    /// The tracker is unchanged on error.
    pub fn remove(&mut self, value: T) -> Result<(), Error> {
        let Some(center) = self.center else {
            debug!("remove {value:?} rejected: empty");
            return Err(Error::EmptyCollection);
        };

        let key = OrderedFloat(value);
        let center_key = *self.tree.key(center);
        let target = if key == center_key {
            center
        } else {
            self.tree.search(&key).ok_or_else(|| {
                debug!("remove {value:?} rejected: not found");
                Error::KeyNotFound
            })?
        };

        let size = self.tree.len() - 1;
        let even = size % 2 == 0;

        if target == center {
            // Pick the neighbour that inherits the center before the node goes away.
            let heir = match size {
                0 => None,
                _ if even => self.tree.predecessor(center),
                _ => self.tree.successor(center),
            };
            let removal = self.tree.delete(center)?;
            self.center = heir.map(|heir| removal.reseat(heir));
            self.median = match self.center {
                None => None,
                Some(heir) if even => {
                    let next = self.step(heir, Step::Forward)?;
                    Some(self.midpoint(heir, next))
                }
                Some(heir) => Some(self.value_at(heir)),
            };
            trace!("remove {value:?}: size={size} median={:?}", self.median);
            return Ok(());
        }

        let removal = self.tree.delete(target)?;
        let center = removal.reseat(center);

        let (center, median) = if key > center_key {
            if even {
                let prev = self.step(center, Step::Back)?;
                (prev, self.midpoint(prev, center))
            } else {
                (center, center_key.into_inner())
            }
        } else if even {
            let next = self.step(center, Step::Forward)?;
            (center, self.midpoint(center, next))
        } else {
            let next = self.step(center, Step::Forward)?;
            (next, self.value_at(next))
        };

        self.center = Some(center);
        self.median = Some(median);
        trace!("remove {value:?}: size={size} median={median:?}");
        Ok(())
    }

    /// Applies one operation from a feed and returns the resulting median.
    ///
    /// A failed operation leaves the tracker unchanged, so a feed can report
    /// the failure and carry on with the next operation. A remove that empties
    /// the tracker succeeds but reports [`Error::EmptyCollection`], as there is
    /// no median left to return.
    pub fn apply(&mut self, op: Op<T>) -> Result<Median<T>, Error> {
        match op {
            Op::Add(value) => self.add(value)?,
            Op::Remove(value) => self.remove(value)?,
        }
        self.current_median()
    }

    /// Checks the tree invariants, the rank of the center, and the cached
    /// median against a sort of the contents. `O(n)`; meant for tests.
    pub fn validate(&self) -> Result<(), Error> {
        self.tree.validate()?;

        let Some(center) = self.center else {
            return match (self.tree.is_empty(), self.median) {
                (true, None) => Ok(()),
                (false, _) => Err(Violation::MissingNeighbor.into()),
                (true, Some(_)) => Err(Violation::StaleMedian.into()),
            };
        };

        let mut found = None;
        let mut sorted = Vec::with_capacity(self.tree.len());
        let mut node = self.tree.first();
        while let Some(current) = node {
            sorted.push(self.value_at(current));
            if current == center {
                found = Some(sorted.len());
            }
            node = self.tree.successor(current);
        }

        let expected = sorted.len().div_ceil(2);
        match found {
            Some(found) if found == expected => {}
            found => {
                return Err(Violation::CenterRank {
                    expected,
                    found: found.unwrap_or(0),
                }
                .into());
            }
        }

        if self.median != Some(median_from_sorted_slice(&sorted)) {
            return Err(Violation::StaleMedian.into());
        }
        Ok(())
    }

    #[inline]
    fn value_at(&self, node: NodeRef) -> T {
        self.tree.key(node).into_inner()
    }

    #[inline]
    fn midpoint(&self, low: NodeRef, high: NodeRef) -> T {
        midpoint(self.value_at(low), self.value_at(high))
    }

    /// Moves the center one position. The neighbour exists whenever the
    /// center invariant holds, so a miss means the structure is corrupt.
    fn step(&self, node: NodeRef, step: Step) -> Result<NodeRef, Error> {
        let next = match step {
            Step::Forward => self.tree.successor(node),
            Step::Back => self.tree.predecessor(node),
        };
        next.ok_or(Error::InvariantViolation(Violation::MissingNeighbor))
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Forward,
    Back,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{format, string::ToString, vec::Vec};
    use assert_approx_eq::assert_approx_eq;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn median_of(tracker: &MedianTracker<f64>) -> f64 {
        tracker.current_median().unwrap().into_inner()
    }

    #[test]
    fn test_tracker_creation() {
        let tracker = MedianTracker::<f64>::new();
        assert!(tracker.is_empty());
        assert_eq!(tracker.len(), 0);
        assert_eq!(tracker.current_median(), Err(Error::EmptyCollection));
        assert!(tracker.validate().is_ok());
    }

    #[test]
    fn test_tracker_reference_scenario() {
        let mut tracker = MedianTracker::new();

        tracker.add(5.0).unwrap();
        assert_eq!(median_of(&tracker), 5.0);
        tracker.add(3.0).unwrap();
        assert_eq!(median_of(&tracker), 4.0);
        tracker.add(8.0).unwrap();
        assert_eq!(median_of(&tracker), 5.0);
        tracker.add(1.0).unwrap();
        assert_eq!(median_of(&tracker), 4.0);
        tracker.remove(3.0).unwrap();
        assert_eq!(median_of(&tracker), 5.0);

        assert!(tracker.validate().is_ok());
    }

    #[test]
    fn test_tracker_half_medians() {
        let mut tracker = MedianTracker::new();
        tracker.add(1.0).unwrap();
        tracker.add(2.0).unwrap();

        let median = tracker.current_median().unwrap();
        assert_eq!(median.into_inner(), 1.5);
        assert!(!median.is_integral());
        assert_eq!(median.to_string(), "1.5");

        tracker.add(3.0).unwrap();
        let median = tracker.current_median().unwrap();
        assert!(median.is_integral());
        assert_eq!(median.to_string(), "2");
    }

    #[test]
    fn test_median_display() {
        assert_eq!(format!("{}", Median(4.0_f64)), "4");
        assert_eq!(format!("{}", Median(-3.0_f64)), "-3");
        assert_eq!(format!("{}", Median(-2.5_f64)), "-2.5");
        assert_eq!(format!("{}", Median(1e6_f64)), "1000000");
        assert_eq!(format!("{}", Median(f64::INFINITY)), "inf");
        assert_eq!(format!("{}", Median(-0.0_f64)), "0");
        assert_eq!(format!("{}", Median(0.0_f64)), "0");
    }

    #[test]
    fn test_tracker_empty_errors() {
        let mut tracker = MedianTracker::<f64>::new();
        assert_eq!(tracker.remove(1.0), Err(Error::EmptyCollection));
        assert_eq!(tracker.current_median(), Err(Error::EmptyCollection));

        tracker.add(1.0).unwrap();
        tracker.remove(1.0).unwrap();
        assert_eq!(tracker.remove(1.0), Err(Error::EmptyCollection));
        assert_eq!(tracker.current_median(), Err(Error::EmptyCollection));
        assert!(tracker.validate().is_ok());
    }

    #[test]
    fn test_tracker_missing_key_leaves_state() {
        let mut tracker = MedianTracker::new();
        for value in [4.0, 1.0, 9.0] {
            tracker.add(value).unwrap();
        }

        assert_eq!(tracker.remove(5.0), Err(Error::KeyNotFound));
        assert_eq!(tracker.len(), 3);
        assert_eq!(median_of(&tracker), 4.0);
        assert!(tracker.validate().is_ok());
    }

    #[test]
    fn test_tracker_rejects_nan() {
        let mut tracker = MedianTracker::new();
        tracker.add(2.0).unwrap();
        assert_eq!(tracker.add(f64::NAN), Err(Error::NotANumber));
        assert_eq!(tracker.len(), 1);
        assert_eq!(median_of(&tracker), 2.0);
    }

    #[test]
    fn test_tracker_duplicates_allowed() {
        let mut tracker = MedianTracker::with_policy(DuplicatePolicy::Allow);
        for value in [5.0, 5.0, 5.0, 1.0, 9.0] {
            tracker.add(value).unwrap();
            assert!(tracker.validate().is_ok());
        }
        assert_eq!(tracker.len(), 5);
        assert_eq!(median_of(&tracker), 5.0);

        tracker.remove(5.0).unwrap();
        assert_eq!(median_of(&tracker), 5.0);
        tracker.remove(5.0).unwrap();
        assert_eq!(median_of(&tracker), 5.0);
        tracker.remove(5.0).unwrap();
        assert_eq!(median_of(&tracker), 5.0);
        assert_eq!(tracker.remove(5.0), Err(Error::KeyNotFound));
        assert!(tracker.validate().is_ok());
    }

    #[test]
    fn test_tracker_duplicates_rejected() {
        let mut tracker = MedianTracker::with_policy(DuplicatePolicy::Reject);
        tracker.add(3.0).unwrap();
        tracker.add(7.0).unwrap();

        assert_eq!(tracker.add(3.0), Err(Error::DuplicateKey));
        assert_eq!(tracker.len(), 2);
        assert_eq!(median_of(&tracker), 5.0);
        assert!(tracker.validate().is_ok());

        tracker.remove(3.0).unwrap();
        tracker.add(3.0).unwrap();
        assert_eq!(median_of(&tracker), 5.0);
    }

    #[test]
    fn test_tracker_remove_center_repeatedly() {
        let mut tracker = MedianTracker::new();
        for value in 1..=15 {
            tracker.add(value as f64).unwrap();
        }
        assert_eq!(median_of(&tracker), 8.0);

        // Each value removed is the current center.
        for (value, expected) in [(8.0, 8.0), (7.0, 9.0), (9.0, 8.0), (6.0, 10.0)] {
            assert_eq!(tracker.value_at(tracker.center.unwrap()), value);
            tracker.remove(value).unwrap();
            assert_eq!(median_of(&tracker), expected);
            assert!(tracker.validate().is_ok());
        }
    }

    #[test]
    fn test_tracker_center_reseated_after_relocation() {
        let mut tracker = MedianTracker::new();
        for value in [4.0, 2.0, 6.0, 1.0, 3.0, 5.0, 7.0] {
            tracker.add(value).unwrap();
        }
        assert_eq!(median_of(&tracker), 4.0);

        tracker.remove(1.0).unwrap();
        assert_eq!(median_of(&tracker), 4.5);
        tracker.remove(2.0).unwrap();
        assert_eq!(median_of(&tracker), 5.0);

        // 6 has two children and the center (5) is its predecessor, so the
        // delete copies 5 into the node that held 6.
        let target = tracker.tree.search(&OrderedFloat(6.0)).unwrap();
        assert_eq!(tracker.tree.predecessor(target), tracker.center);

        tracker.remove(6.0).unwrap();
        assert_eq!(median_of(&tracker), 4.5);
        assert!(tracker.validate().is_ok());

        tracker.remove(4.0).unwrap();
        assert_eq!(median_of(&tracker), 5.0);
        assert!(tracker.validate().is_ok());
    }

    #[test]
    fn test_tracker_add_remove_round_trip() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut tracker = MedianTracker::new();
        for _ in 0..64 {
            tracker.add(rng.gen_range(-50..50) as f64).unwrap();
        }

        for _ in 0..200 {
            let before = tracker.current_median().unwrap();
            let size = tracker.len();
            let value = rng.gen_range(-60..60) as f64;

            tracker.add(value).unwrap();
            tracker.remove(value).unwrap();

            assert_eq!(tracker.len(), size);
            assert_eq!(tracker.current_median().unwrap(), before);
            assert!(tracker.validate().is_ok());
        }
    }

    #[test]
    fn test_tracker_randomized_against_sorted_vec() {
        let mut rng = StdRng::seed_from_u64(0xfeed);
        let mut tracker = MedianTracker::new();
        let mut reference: Vec<f64> = Vec::new();

        for step in 0..5000 {
            let value = rng.gen_range(0..64) as f64;
            if rng.gen_bool(0.5) {
                tracker.add(value).unwrap();
                let pos = reference.partition_point(|&v| v <= value);
                reference.insert(pos, value);
            } else {
                let result = tracker.remove(value);
                match reference.iter().position(|&v| v == value) {
                    Some(pos) => {
                        reference.remove(pos);
                        assert_eq!(result, Ok(()));
                    }
                    None if reference.is_empty() => {
                        assert_eq!(result, Err(Error::EmptyCollection));
                    }
                    None => assert_eq!(result, Err(Error::KeyNotFound)),
                }
            }

            assert_eq!(tracker.len(), reference.len());
            if reference.is_empty() {
                assert!(tracker.current_median().is_err());
            } else {
                assert_eq!(
                    median_of(&tracker),
                    median_from_sorted_slice(&reference),
                    "median diverged at step {step}"
                );
            }
            assert!(tracker.validate().is_ok(), "invalid state at step {step}");
        }
    }

    #[test]
    fn test_tracker_randomized_fractional_values() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut tracker = MedianTracker::with_capacity(256);
        let mut reference: Vec<f64> = Vec::new();

        for _ in 0..1000 {
            if reference.len() < 8 || rng.gen_bool(0.6) {
                let value = rng.gen_range(-1.0..1.0);
                tracker.add(value).unwrap();
                let pos = reference.partition_point(|&v| v <= value);
                reference.insert(pos, value);
            } else {
                let value = reference[rng.gen_range(0..reference.len())];
                tracker.remove(value).unwrap();
                let pos = reference.iter().position(|&v| v == value).unwrap();
                reference.remove(pos);
            }

            assert_approx_eq!(median_of(&tracker), median_from_sorted_slice(&reference));
        }
        assert!(tracker.validate().is_ok());
    }

    #[test]
    fn test_tracker_apply_feed() {
        let mut tracker = MedianTracker::new();
        let feed = ["r 1", "a 1", "a 2", "a 1", "r 1", "r 1", "r 2", "r 2"];
        let rendered: Vec<_> = feed
            .iter()
            .map(|line| {
                line.parse::<Op<f64>>()
                    .and_then(|op| tracker.apply(op))
                    .map_or_else(|_| "Wrong!".to_string(), |median| median.to_string())
            })
            .collect();

        assert_eq!(
            rendered,
            ["Wrong!", "1", "1.5", "1", "1.5", "2", "Wrong!", "Wrong!"]
        );
    }

    #[test]
    fn test_tracker_clear() {
        let mut tracker = MedianTracker::new();
        for value in 0..10 {
            tracker.add(value as f64).unwrap();
        }
        tracker.clear();
        assert!(tracker.is_empty());
        assert!(tracker.tree().is_empty());
        assert_eq!(tracker.current_median(), Err(Error::EmptyCollection));
        tracker.add(1.0).unwrap();
        assert_eq!(median_of(&tracker), 1.0);
    }

    #[test]
    fn test_tracker_extreme_values_do_not_overflow() {
        let mut tracker = MedianTracker::new();
        tracker.add(f64::MAX).unwrap();
        tracker.add(f64::MAX).unwrap();
        assert_eq!(median_of(&tracker), f64::MAX);
        assert!(tracker.validate().is_ok());

        tracker.add(f64::MIN).unwrap();
        tracker.add(f64::MIN).unwrap();
        assert_eq!(median_of(&tracker), 0.0);

        tracker.remove(f64::MIN).unwrap();
        tracker.remove(f64::MIN).unwrap();
        tracker.add(f64::MAX / 2.0).unwrap();
        tracker.add(f64::MAX / 2.0).unwrap();
        assert_eq!(median_of(&tracker), f64::MAX * 0.75);
        assert!(tracker.validate().is_ok());

        let mut tracker = MedianTracker::<f32>::new();
        tracker.add(f32::MAX).unwrap();
        tracker.add(f32::MAX).unwrap();
        assert_eq!(tracker.current_median().unwrap().into_inner(), f32::MAX);
    }

    #[test]
    fn test_tracker_f32() {
        let mut tracker = MedianTracker::<f32>::new();
        for value in [3.0, 1.0, 2.0, 10.0] {
            tracker.add(value).unwrap();
        }
        assert_eq!(tracker.current_median().unwrap().into_inner(), 2.5);
    }
}
