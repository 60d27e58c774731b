//! Shape and stride arithmetic. All strides are counted in elements.

use crate::{bail, Result};

/// Number of elements described by `shape`. A rank 0 shape holds one element.
pub fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Compute default (contiguous, row-major) strides for a tensor of given shape.
pub fn contiguous_stride(shape: &[usize]) -> Vec<usize> {
    let mut stride = vec![0; shape.len()];
    let mut acc = 1;
    // Iterate dims in reverse to accumulate products
    for (s, dim) in stride.iter_mut().zip(shape).rev() {
        *s = acc;
        acc *= *dim;
    }
    stride
}

/// Fill the unspecified (negative) entries of `stride` for `shape`.
///
/// An empty `stride` yields the contiguous stride. Specified entries are kept
/// as they are but still advance the running product by their dimension.
pub fn complete_stride(shape: &[usize], stride: &[isize]) -> Result<Vec<usize>> {
    if stride.is_empty() {
        return Ok(contiguous_stride(shape));
    }
    if stride.len() != shape.len() {
        bail!(
            @Configuration,
            "stride rank {} does not match shape rank {}. Leave the stride empty to compute a \
             contiguous one",
            stride.len(),
            shape.len()
        );
    }

    let mut out = vec![0; shape.len()];
    let mut acc = 1;
    for i in (0..shape.len()).rev() {
        out[i] = match usize::try_from(stride[i]) {
            Ok(s) => s,
            Err(_) => acc,
        };
        acc = acc.saturating_mul(shape[i]);
    }
    Ok(out)
}

/// True when `stride` is exactly the contiguous stride for `shape`.
pub fn is_contiguous(shape: &[usize], stride: &[usize]) -> bool {
    shape.len() == stride.len() && contiguous_stride(shape) == stride
}

/// Element offset of `index` under `stride`.
pub fn offset_of(index: &[usize], stride: &[usize]) -> usize {
    index.iter().zip(stride).map(|(i, s)| i * s).sum()
}

/// Number of elements between the first and one past the last element a
/// layout can reach. Zero when the shape is empty of elements. Saturates at
/// `usize::MAX`; use [`checked_span`] for layouts not yet validated.
pub fn span(shape: &[usize], stride: &[usize]) -> usize {
    checked_span(shape, stride).unwrap_or(usize::MAX)
}

/// [`span`], or `None` when it does not fit in a `usize`.
pub fn checked_span(shape: &[usize], stride: &[usize]) -> Option<usize> {
    if shape.iter().any(|&d| d == 0) {
        return Some(0);
    }
    shape
        .iter()
        .zip(stride)
        .try_fold(1usize, |acc, (dim, s)| (dim - 1).checked_mul(*s)?.checked_add(acc))
}
