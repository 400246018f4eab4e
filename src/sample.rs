//! Sampling record batches from a replay pool.
use crate::array::FieldArray;
use crate::error::PoolError;
use crate::pool::FlexibleReplayPool;
use rand::Rng;
use std::ops::Index;

/// Selects which fields to include in a batch.
pub trait FieldFilter {
    /// Whether to include the named field.
    fn includes(&mut self, name: &str) -> bool;
}

/// Include every field.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AllFields;

impl FieldFilter for AllFields {
    #[inline]
    fn includes(&mut self, _: &str) -> bool {
        true
    }
}

impl<F: FnMut(&str) -> bool> FieldFilter for F {
    #[inline]
    fn includes(&mut self, name: &str) -> bool {
        self(name)
    }
}

/// Include the listed fields (in registry order, not list order).
impl FieldFilter for &[&str] {
    #[inline]
    fn includes(&mut self, name: &str) -> bool {
        self.iter().any(|&listed| listed == name)
    }
}

/// A batch of records gathered from a pool.
///
/// Holds one array per selected field, in registry order.
/// Axis 0 of every array indexes the records of the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    len: usize,
    fields: Vec<(String, FieldArray)>,
}

impl Batch {
    /// Number of records in the batch.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of fields in the batch.
    #[must_use]
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// The gathered values of the named field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldArray> {
        self.fields
            .iter()
            .find_map(|(field_name, values)| (field_name == name).then_some(values))
    }

    pub fn names(&self) -> impl ExactSizeIterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &FieldArray)> {
        self.fields.iter().map(|(name, values)| (name.as_str(), values))
    }

    #[must_use]
    pub fn into_fields(self) -> Vec<(String, FieldArray)> {
        self.fields
    }
}

impl Index<&str> for Batch {
    type Output = FieldArray;

    fn index(&self, name: &str) -> &Self::Output {
        self.get(name)
            .unwrap_or_else(|| panic!("no field {:?} in batch", name))
    }
}

impl FlexibleReplayPool {
    /// Sample `batch_size` record indices uniformly at random with replacement.
    ///
    /// Returns no indices if the pool is empty.
    pub fn random_indices<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Vec<usize> {
        if self.size == 0 {
            return Vec::new();
        }
        (0..batch_size)
            .map(|_| rng.gen_range(0..self.size))
            .collect()
    }

    /// Indices of the most recent `min(n, size)` records, oldest first.
    #[must_use]
    pub fn last_n_indices(&self, n: usize) -> Vec<usize> {
        let n = n.min(self.size);
        (0..n)
            .map(|k| (self.pointer + self.capacity - n + k) % self.capacity)
            .collect()
    }

    /// Sample a batch of `batch_size` records uniformly at random with replacement.
    ///
    /// The batch is empty if the pool is empty.
    pub fn random_batch<R, F>(&self, batch_size: usize, filter: F, rng: &mut R) -> Batch
    where
        R: Rng + ?Sized,
        F: FieldFilter,
    {
        let indices = self.random_indices(batch_size, rng);
        self.gather(&indices, filter)
    }

    /// The most recent `min(n, size)` records, oldest first.
    pub fn last_n_batch<F: FieldFilter>(&self, n: usize, filter: F) -> Batch {
        self.gather(&self.last_n_indices(n), filter)
    }

    /// The records at the given indices.
    ///
    /// Indices are taken modulo the capacity.
    ///
    /// # Errors
    /// [`PoolError::OutOfRange`] if any index does not refer to a filled record.
    pub fn batch_by_indices<F: FieldFilter>(
        &self,
        indices: &[usize],
        filter: F,
    ) -> Result<Batch, PoolError> {
        let indices = indices
            .iter()
            .map(|&index| {
                let position = index.checked_rem(self.capacity).unwrap_or(index);
                if position < self.size {
                    Ok(position)
                } else {
                    Err(PoolError::OutOfRange {
                        index,
                        size: self.size,
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.gather(&indices, filter))
    }

    /// Gather already-validated indices.
    fn gather<F: FieldFilter>(&self, indices: &[usize], mut filter: F) -> Batch {
        let fields = self
            .fields
            .fields()
            .iter()
            .filter(|field| filter.includes(&field.name))
            .map(|field| (field.name.clone(), field.data.select_rows(indices)))
            .collect();
        Batch {
            len: indices.len(),
            fields,
        }
    }
}
