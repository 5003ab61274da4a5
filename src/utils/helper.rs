use num_traits::float::FloatCore;

/// Returns the median from a sorted slice
///
/// # Arguments
///
/// * `ss` - The sorted slice, must not be empty
///
/// # Returns
///
/// * `T` - The middle element, or the mean of the two middle elements for an even length
#[inline]
pub fn median_from_sorted_slice<T: FloatCore>(ss: &[T]) -> T {
    let len = ss.len();
    let mid = len / 2;
    if len % 2 == 0 {
        midpoint(ss[mid - 1], ss[mid])
    } else {
        ss[mid]
    }
}

/// Returns the mean of two values without overflowing near `T::max_value()`
///
/// Halving each operand first is exact for whole and half-whole inputs.
#[inline]
pub fn midpoint<T: FloatCore>(a: T, b: T) -> T {
    let _2 = T::one() + T::one();
    a / _2 + b / _2
}
