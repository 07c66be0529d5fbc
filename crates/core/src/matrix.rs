//! Borrowed row-major view over a caller-owned vector collection.

use crate::config::MAX_DIMENSION;
use crate::error::{AnnError, Result};

/// `num_elements` vectors of `dimension` elements stored back to back.
///
/// Row `i` is `data[i * dimension..(i + 1) * dimension]`.
#[derive(Debug, Clone, Copy)]
pub struct MatrixView<'a, T> {
    num_elements: usize,
    dimension: usize,
    data: &'a [T],
}

impl<'a, T> MatrixView<'a, T> {
    /// Wrap `data` as rows of `dimension` elements.
    pub fn new(data: &'a [T], dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(AnnError::config("dimension must be positive"));
        }
        if dimension > MAX_DIMENSION {
            return Err(AnnError::config(format!(
                "dimension {dimension} exceeds the maximum of {MAX_DIMENSION}"
            )));
        }
        if data.len() % dimension != 0 {
            return Err(AnnError::config(format!(
                "data length {} is not a multiple of dimension {dimension}",
                data.len()
            )));
        }
        let num_elements = data.len() / dimension;
        if num_elements > u32::MAX as usize {
            return Err(AnnError::config("too many vectors for 32-bit ids"));
        }
        Ok(Self {
            num_elements,
            dimension,
            data,
        })
    }

    #[inline]
    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_elements == 0
    }

    /// Row `i`. Panics if `i >= num_elements`.
    #[inline]
    pub fn row(&self, i: usize) -> &'a [T] {
        assert!(
            i < self.num_elements,
            "row {i} out of range for {} vectors",
            self.num_elements
        );
        let start = i * self.dimension;
        &self.data[start..start + self.dimension]
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &'a [T]> + 'a {
        self.data.chunks_exact(self.dimension)
    }

    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows() {
        let data: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let m = MatrixView::new(&data, 4).unwrap();
        assert_eq!(m.num_elements(), 3);
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0, 7.0]);
        assert_eq!(m.rows().len(), 3);
    }

    #[test]
    fn test_invalid_shapes() {
        let data = vec![0u8; 10];
        assert!(matches!(
            MatrixView::new(&data, 0),
            Err(AnnError::InvalidConfig(_))
        ));
        assert!(matches!(
            MatrixView::new(&data, 3),
            Err(AnnError::InvalidConfig(_))
        ));
        assert!(MatrixView::new(&data, 5).is_ok());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_row_out_of_range_panics() {
        let data = vec![0.0f32; 4];
        let m = MatrixView::new(&data, 2).unwrap();
        m.row(2);
    }
}
