//! Aggregations with an explicit non-finite policy.
//!
//! Every reduction here ignores NaN and infinite inputs. An aggregation with
//! no finite inputs returns NaN (except [`nan_sum`], which returns zero).

use num_traits::Float;

/// Finite values of `values`, in order.
pub fn finite<T: Float>(values: impl IntoIterator<Item = T>) -> Vec<T> {
    values.into_iter().filter(|v| v.is_finite()).collect()
}

pub fn nan_sum<T: Float>(values: &[T]) -> T {
    values
        .iter()
        .filter(|v| v.is_finite())
        .fold(T::zero(), |acc, &v| acc + v)
}

pub fn nan_mean<T: Float>(values: &[T]) -> T {
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((T::zero(), 0usize), |(s, n), &v| (s + v, n + 1));
    if count == 0 {
        return T::nan();
    }
    sum / T::from(count).unwrap_or_else(T::nan)
}

/// Standard deviation with `ddof` delta degrees of freedom.
///
/// NaN when fewer than `ddof + 1` finite values are present.
pub fn nan_std<T: Float>(values: &[T], ddof: usize) -> T {
    let finite_values = finite(values.iter().copied());
    let n = finite_values.len();
    if n <= ddof {
        return T::nan();
    }
    let mean = nan_mean(&finite_values);
    let sum_sq = finite_values
        .iter()
        .fold(T::zero(), |acc, &v| acc + (v - mean) * (v - mean));
    let denom = T::from(n - ddof).unwrap_or_else(T::nan);
    (sum_sq / denom).sqrt()
}

pub fn nan_median<T: Float>(values: &[T]) -> T {
    let mut finite_values = finite(values.iter().copied());
    median_in_place(&mut finite_values)
}

pub fn nan_min<T: Float>(values: &[T]) -> T {
    values
        .iter()
        .filter(|v| v.is_finite())
        .fold(T::nan(), |acc, &v| if acc.is_nan() || v < acc { v } else { acc })
}

pub fn nan_max<T: Float>(values: &[T]) -> T {
    values
        .iter()
        .filter(|v| v.is_finite())
        .fold(T::nan(), |acc, &v| if acc.is_nan() || v > acc { v } else { acc })
}

/// Median of a slice already known to be finite. Reorders the slice.
pub fn median_in_place<T: Float>(values: &mut [T]) -> T {
    let n = values.len();
    if n == 0 {
        return T::nan();
    }
    let cmp = |a: &T, b: &T| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal);
    let mid = n / 2;
    let upper = *values.select_nth_unstable_by(mid, cmp).1;
    if n % 2 == 1 {
        upper
    } else {
        let lower = values[..mid]
            .iter()
            .copied()
            .fold(T::neg_infinity(), T::max);
        (lower + upper) / T::from(2.0).unwrap_or_else(T::one)
    }
}
