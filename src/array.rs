//! Typed multidimensional field storage.
#![allow(clippy::use_self)] // false positive with serde derives
use ndarray::{concatenate, Array, ArrayD, ArrayViewD, Axis, Dimension, IxDyn, Slice};
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Bool,
    U8,
    I32,
    I64,
    F32,
    F64,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// A dynamically-shaped array of any supported element type.
///
/// When used as field storage, axis 0 indexes records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldArray {
    Bool(ArrayD<bool>),
    U8(ArrayD<u8>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

/// Apply an expression to the inner array of a [`FieldArray`].
macro_rules! with_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            FieldArray::Bool($arr) => $body,
            FieldArray::U8($arr) => $body,
            FieldArray::I32($arr) => $body,
            FieldArray::I64($arr) => $body,
            FieldArray::F32($arr) => $body,
            FieldArray::F64($arr) => $body,
        }
    };
}

/// Map the inner array of a [`FieldArray`] to a new array of the same element type.
macro_rules! map_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            FieldArray::Bool($arr) => FieldArray::Bool($body),
            FieldArray::U8($arr) => FieldArray::U8($body),
            FieldArray::I32($arr) => FieldArray::I32($body),
            FieldArray::I64($arr) => FieldArray::I64($body),
            FieldArray::F32($arr) => FieldArray::F32($body),
            FieldArray::F64($arr) => FieldArray::F64($body),
        }
    };
}

/// Apply an expression to a pair of [`FieldArray`] with matching element types.
///
/// Evaluates `$mismatch` if the element types differ.
macro_rules! zip_arrays {
    ($a:expr, $b:expr, ($x:ident, $y:ident) => $body:expr, _ => $mismatch:expr) => {
        match ($a, $b) {
            (FieldArray::Bool($x), FieldArray::Bool($y)) => $body,
            (FieldArray::U8($x), FieldArray::U8($y)) => $body,
            (FieldArray::I32($x), FieldArray::I32($y)) => $body,
            (FieldArray::I64($x), FieldArray::I64($y)) => $body,
            (FieldArray::F32($x), FieldArray::F32($y)) => $body,
            (FieldArray::F64($x), FieldArray::F64($y)) => $body,
            _ => $mismatch,
        }
    };
}

impl FieldArray {
    /// Create a zero-filled array (`false` for booleans).
    #[must_use]
    pub fn zeros(dtype: DType, shape: &[usize]) -> Self {
        Self::constant(dtype, shape, 0.0)
    }

    /// Create an array with every element equal to `value` cast to `dtype`.
    ///
    /// Booleans are `true` for any non-zero value.
    #[must_use]
    pub fn constant(dtype: DType, shape: &[usize], value: f64) -> Self {
        let shape = IxDyn(shape);
        match dtype {
            DType::Bool => Self::Bool(ArrayD::from_elem(shape, value != 0.0)),
            DType::U8 => Self::U8(ArrayD::from_elem(shape, value.as_())),
            DType::I32 => Self::I32(ArrayD::from_elem(shape, value.as_())),
            DType::I64 => Self::I64(ArrayD::from_elem(shape, value.as_())),
            DType::F32 => Self::F32(ArrayD::from_elem(shape, value.as_())),
            DType::F64 => Self::F64(ArrayD::from_elem(shape, value)),
        }
    }

    /// The element type.
    #[must_use]
    pub const fn dtype(&self) -> DType {
        match self {
            Self::Bool(_) => DType::Bool,
            Self::U8(_) => DType::U8,
            Self::I32(_) => DType::I32,
            Self::I64(_) => DType::I64,
            Self::F32(_) => DType::F32,
            Self::F64(_) => DType::F64,
        }
    }

    /// The full array shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    /// The shape of each row (the shape without axis 0).
    ///
    /// Empty for 0-dimensional arrays.
    #[must_use]
    pub fn row_shape(&self) -> &[usize] {
        self.shape().get(1..).unwrap_or(&[])
    }

    /// Number of rows (the length of axis 0); 0 for 0-dimensional arrays.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.shape().first().copied().unwrap_or(0)
    }

    /// View as an array of element type `T` if the element type matches.
    #[must_use]
    pub fn as_array<T: Element>(&self) -> Option<&ArrayD<T>> {
        T::unwrap_ref(self)
    }

    /// Convert into an array of element type `T` if the element type matches.
    pub fn into_array<T: Element>(self) -> Result<ArrayD<T>, Self> {
        T::unwrap(self)
    }

    /// Whether this array broadcasts to `shape`.
    #[must_use]
    pub fn broadcasts_to(&self, shape: &[usize]) -> bool {
        with_array!(self, a => a.broadcast(IxDyn(shape)).is_some())
    }

    /// Insert a new axis of length 1 at position 0.
    #[must_use]
    pub fn insert_row_axis(self) -> Self {
        map_array!(self, a => a.insert_axis(Axis(0)))
    }

    /// Gather rows at the given indices into a new array.
    ///
    /// # Panics
    /// If any index is not less than [`FieldArray::num_rows`].
    #[must_use]
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        map_array!(self, a => gather_rows(a, indices))
    }

    /// The first `n` rows.
    ///
    /// # Panics
    /// If `n` is greater than [`FieldArray::num_rows`].
    #[must_use]
    pub fn head_rows(&self, n: usize) -> Self {
        map_array!(self, a => a.slice_axis(Axis(0), Slice::from(..n)).to_owned())
    }

    /// All rows from `start` onwards.
    ///
    /// # Panics
    /// If `start` is greater than [`FieldArray::num_rows`].
    #[must_use]
    pub fn tail_rows(&self, start: usize) -> Self {
        map_array!(self, a => a.slice_axis(Axis(0), Slice::from(start..)).to_owned())
    }

    /// Extend axis 0 with zero-filled rows until it has length `num_rows`.
    ///
    /// Returns `self` unchanged if it already has at least `num_rows` rows.
    #[must_use]
    pub fn pad_rows(self, num_rows: usize) -> Self {
        let have = self.num_rows();
        if have >= num_rows {
            return self;
        }
        let mut pad_shape = self.shape().to_vec();
        pad_shape[0] = num_rows - have;
        let padding = Self::zeros(self.dtype(), &pad_shape);
        zip_arrays!(self, padding, (a, p) => {
            concatenate(Axis(0), &[a.view(), p.view()])
                .expect("padding shares the row shape")
                .into()
        }, _ => unreachable!("padding shares the element type"))
    }

    /// Scatter rows of `values` into this array at the given row indices.
    ///
    /// `values` is broadcast to `(indices.len(),) + self.row_shape()` and the `k`-th row is
    /// written to row `indices[k]`. Later rows win when an index repeats.
    ///
    /// # Returns
    /// `None` without modifying `self` if the element types differ
    /// or if `values` does not broadcast to the destination shape.
    ///
    /// # Panics
    /// If any index is not less than [`FieldArray::num_rows`].
    pub fn assign_rows(&mut self, indices: &[usize], values: &Self) -> Option<()> {
        let mut target = vec![indices.len()];
        target.extend_from_slice(self.row_shape());
        zip_arrays!(self, values, (dest, src) => {
            let src = src.broadcast(IxDyn(&target))?;
            scatter_rows(dest, indices, src);
            Some(())
        }, _ => None)
    }

    /// Fill the given rows with `value` broadcast to the row shape.
    ///
    /// # Returns
    /// `None` without modifying `self` if the element types differ
    /// or if `value` does not broadcast to the row shape.
    pub fn fill_rows(&mut self, indices: &[usize], value: &Self) -> Option<()> {
        let row_shape = self.row_shape().to_vec();
        zip_arrays!(self, value, (dest, src) => {
            let src = src.broadcast(IxDyn(&row_shape))?;
            for &i in indices {
                dest.index_axis_mut(Axis(0), i).assign(&src);
            }
            Some(())
        }, _ => None)
    }
}

fn gather_rows<T: Clone>(array: &ArrayD<T>, indices: &[usize]) -> ArrayD<T> {
    let mut shape = array.shape().to_vec();
    shape[0] = indices.len();
    let mut data = Vec::with_capacity(shape.iter().product());
    for &i in indices {
        data.extend(array.index_axis(Axis(0), i).iter().cloned());
    }
    ArrayD::from_shape_vec(shape, data).expect("gathered data matches shape")
}

fn scatter_rows<T: Clone>(dest: &mut ArrayD<T>, indices: &[usize], src: ArrayViewD<T>) {
    for (&i, row) in indices.iter().zip(src.outer_iter()) {
        dest.index_axis_mut(Axis(0), i).assign(&row);
    }
}

/// A scalar type that can be stored in a [`FieldArray`].
pub trait Element: Clone + Sized {
    /// The corresponding element type tag.
    const DTYPE: DType;

    /// Wrap an array of this element type.
    fn wrap(array: ArrayD<Self>) -> FieldArray;

    /// Unwrap into an array of this element type.
    #[allow(clippy::missing_errors_doc)]
    fn unwrap(array: FieldArray) -> Result<ArrayD<Self>, FieldArray>;

    /// Borrow the inner array if it has this element type.
    fn unwrap_ref(array: &FieldArray) -> Option<&ArrayD<Self>>;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$variant;

            #[inline]
            fn wrap(array: ArrayD<Self>) -> FieldArray {
                FieldArray::$variant(array)
            }

            #[inline]
            fn unwrap(array: FieldArray) -> Result<ArrayD<Self>, FieldArray> {
                match array {
                    FieldArray::$variant(a) => Ok(a),
                    other => Err(other),
                }
            }

            #[inline]
            fn unwrap_ref(array: &FieldArray) -> Option<&ArrayD<Self>> {
                match array {
                    FieldArray::$variant(a) => Some(a),
                    _ => None,
                }
            }
        }

        /// 0-dimensional array holding a single element.
        impl From<$ty> for FieldArray {
            #[inline]
            fn from(value: $ty) -> Self {
                Self::$variant(ArrayD::from_elem(IxDyn(&[]), value))
            }
        }

        /// 1-dimensional array.
        impl From<Vec<$ty>> for FieldArray {
            #[inline]
            fn from(values: Vec<$ty>) -> Self {
                Self::$variant(Array::from(values).into_dyn())
            }
        }

        impl<D: Dimension> From<Array<$ty, D>> for FieldArray {
            #[inline]
            fn from(array: Array<$ty, D>) -> Self {
                Self::$variant(array.into_dyn())
            }
        }
    };
}

impl_element!(bool, Bool);
impl_element!(u8, U8);
impl_element!(i32, I32);
impl_element!(i64, I64);
impl_element!(f32, F32);
impl_element!(f64, F64);

#[allow(clippy::needless_pass_by_value)]
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use rstest::rstest;
    use serde_test::{assert_tokens, Token};

    #[rstest]
    #[case::bool(DType::Bool)]
    #[case::u8(DType::U8)]
    #[case::i32(DType::I32)]
    #[case::i64(DType::I64)]
    #[case::f32(DType::F32)]
    #[case::f64(DType::F64)]
    fn zeros_has_dtype_and_shape(#[case] dtype: DType) {
        let array = FieldArray::zeros(dtype, &[4, 2, 3]);
        assert_eq!(array.dtype(), dtype);
        assert_eq!(array.shape(), &[4, 2, 3]);
        assert_eq!(array.row_shape(), &[2, 3]);
        assert_eq!(array.num_rows(), 4);
    }

    #[test]
    fn constant_casts_value() {
        let array = FieldArray::constant(DType::I64, &[3], 2.0);
        assert_eq!(array, FieldArray::from(vec![2_i64, 2, 2]));
        let array = FieldArray::constant(DType::Bool, &[2], 1.0);
        assert_eq!(array, FieldArray::from(vec![true, true]));
    }

    #[test]
    fn scalar_is_zero_dimensional() {
        let array = FieldArray::from(1.5_f32);
        assert_eq!(array.shape(), &[] as &[usize]);
        assert_eq!(array.num_rows(), 0);
        assert_eq!(array.row_shape(), &[] as &[usize]);
    }

    #[test]
    fn as_array_checks_dtype() {
        let array = FieldArray::from(vec![1_i32, 2]);
        assert_eq!(array.as_array::<i32>(), Some(&arr1(&[1, 2]).into_dyn()));
        assert!(array.as_array::<i64>().is_none());
        assert!(array.into_array::<f32>().is_err());
    }

    #[test]
    fn select_rows_gathers_in_index_order() {
        let array = FieldArray::from(arr2(&[[0_i32, 1], [2, 3], [4, 5]]));
        let selected = array.select_rows(&[2, 0, 2]);
        assert_eq!(selected, FieldArray::from(arr2(&[[4_i32, 5], [0, 1], [4, 5]])));
    }

    #[test]
    fn select_rows_empty_keeps_row_shape() {
        let array = FieldArray::zeros(DType::F32, &[3, 2, 2]);
        let selected = array.select_rows(&[]);
        assert_eq!(selected.shape(), &[0, 2, 2]);
    }

    #[test]
    fn head_rows() {
        let array = FieldArray::from(vec![1_u8, 2, 3, 4]);
        assert_eq!(array.head_rows(2), FieldArray::from(vec![1_u8, 2]));
    }

    #[test]
    fn pad_rows_appends_zeros() {
        let array = FieldArray::from(arr2(&[[1.0_f64, 2.0]]));
        let padded = array.pad_rows(3);
        assert_eq!(
            padded,
            FieldArray::from(arr2(&[[1.0_f64, 2.0], [0.0, 0.0], [0.0, 0.0]]))
        );
    }

    #[test]
    fn pad_rows_noop_when_long_enough() {
        let array = FieldArray::from(vec![true, false]);
        assert_eq!(array.clone().pad_rows(2), array);
    }

    #[test]
    fn assign_rows_scatters() {
        let mut array = FieldArray::zeros(DType::I64, &[4]);
        array
            .assign_rows(&[3, 0], &FieldArray::from(vec![4_i64, 5]))
            .unwrap();
        assert_eq!(array, FieldArray::from(vec![5_i64, 0, 0, 4]));
    }

    #[test]
    fn assign_rows_broadcasts() {
        let mut array = FieldArray::zeros(DType::F64, &[3, 2]);
        array
            .assign_rows(&[0, 2], &FieldArray::from(vec![1.0_f64, 2.0]))
            .unwrap();
        assert_eq!(
            array,
            FieldArray::from(arr2(&[[1.0_f64, 2.0], [0.0, 0.0], [1.0, 2.0]]))
        );
    }

    #[test]
    fn assign_rows_rejects_mismatch() {
        let mut array = FieldArray::zeros(DType::F64, &[3, 2]);
        assert!(array
            .assign_rows(&[0], &FieldArray::from(vec![1.0_f32, 2.0]))
            .is_none());
        assert!(array
            .assign_rows(&[0], &FieldArray::from(vec![1.0_f64, 2.0, 3.0]))
            .is_none());
        assert_eq!(array, FieldArray::zeros(DType::F64, &[3, 2]));
    }

    #[test]
    fn fill_rows_broadcasts_scalar() {
        let mut array = FieldArray::zeros(DType::I32, &[3, 2]);
        array.fill_rows(&[1], &FieldArray::from(7_i32)).unwrap();
        assert_eq!(array, FieldArray::from(arr2(&[[0_i32, 0], [7, 7], [0, 0]])));
    }

    #[test]
    fn dtype_ser_de_tokens() {
        assert_tokens(
            &DType::F32,
            &[Token::UnitVariant {
                name: "DType",
                variant: "F32",
            }],
        );
    }

    #[test]
    fn dtype_display() {
        assert_eq!(DType::I64.to_string(), "i64");
    }
}
