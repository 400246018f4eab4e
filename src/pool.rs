//! Fixed-capacity multi-field circular replay pool.
#![allow(clippy::use_self)] // false positive with serde derives
use crate::array::FieldArray;
use crate::error::PoolError;
use crate::fields::{Field, FieldRegistry, FieldSpec};
use serde::{Deserialize, Serialize};

/// Configuration for [`FlexibleReplayPool`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayPoolConfig {
    /// Maximum number of stored records.
    pub capacity: usize,
    /// Fields in registration order.
    pub fields: Vec<(String, FieldSpec)>,
}

impl Default for ReplayPoolConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            fields: Vec::new(),
        }
    }
}

impl ReplayPoolConfig {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            fields: Vec::new(),
        }
    }

    /// Add a field to the configuration.
    #[must_use]
    pub fn field<K: Into<String>>(mut self, name: K, spec: FieldSpec) -> Self {
        self.fields.push((name.into(), spec));
        self
    }

    /// Build a new empty pool.
    ///
    /// # Errors
    /// [`PoolError::InvalidField`] if any field descriptor is invalid.
    pub fn build_pool(&self) -> Result<FlexibleReplayPool, PoolError> {
        FlexibleReplayPool::new(self.capacity, self.fields.iter().cloned())
    }
}

/// A circular buffer of records made of named, independently typed and shaped fields.
///
/// Storage for `capacity` records is allocated up front.
/// Once full, each write overwrites the oldest records.
///
/// Record `i` consists of row `i` of every field's storage.
/// The valid records are the `size` positions preceding `pointer` (with wrap-around).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "crate::snapshot::PoolState")]
#[serde(try_from = "crate::snapshot::PoolState")]
pub struct FlexibleReplayPool {
    pub(crate) capacity: usize,
    /// Position of the next write.
    pub(crate) pointer: usize,
    /// Number of valid records.
    pub(crate) size: usize,
    pub(crate) fields: FieldRegistry,
}

impl FlexibleReplayPool {
    /// Create an empty pool with space for `capacity` records of the given fields.
    ///
    /// # Errors
    /// [`PoolError::InvalidField`] if any field descriptor is invalid.
    pub fn new<I, K>(capacity: usize, fields: I) -> Result<Self, PoolError>
    where
        I: IntoIterator<Item = (K, FieldSpec)>,
        K: Into<String>,
    {
        let mut pool = Self {
            capacity,
            pointer: 0,
            size: 0,
            fields: FieldRegistry::new(capacity),
        };
        pool.add_fields(fields)?;
        Ok(pool)
    }

    /// Register additional fields.
    ///
    /// Re-registering an existing field replaces its descriptor and discards its stored values;
    /// the slots of a reallocated field hold initializer values until they are next written.
    ///
    /// # Errors
    /// [`PoolError::InvalidField`] if any field descriptor is invalid.
    /// No field is registered in that case.
    pub fn add_fields<I, K>(&mut self, fields: I) -> Result<(), PoolError>
    where
        I: IntoIterator<Item = (K, FieldSpec)>,
        K: Into<String>,
    {
        self.fields.register(fields)
    }

    /// Maximum number of stored records.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid records.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Position that the next record will be written to.
    #[must_use]
    pub const fn pointer(&self) -> usize {
        self.pointer
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.size == self.capacity
    }

    /// Field names in registration order.
    pub fn field_names(&self) -> impl ExactSizeIterator<Item = &str> {
        self.fields.field_names()
    }

    /// The registered fields.
    #[must_use]
    pub const fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    /// Write a single record.
    ///
    /// Each value has the shape of a single field entry (no leading record axis);
    /// scalar fields accept scalars.
    ///
    /// # Errors
    /// See [`FlexibleReplayPool::add_samples`].
    pub fn add_sample<I, K>(&mut self, values: I) -> Result<(), PoolError>
    where
        I: IntoIterator<Item = (K, FieldArray)>,
        K: Into<String>,
    {
        self.add_samples(
            1,
            values
                .into_iter()
                .map(|(name, value)| (name, value.insert_row_axis())),
        )
    }

    /// Write `num_samples` consecutive records.
    ///
    /// Each value is broadcast to `(num_samples,) + field.shape`; row `k` is the `k`-th new record.
    /// Registered fields missing from `values` are set to their default value.
    /// If `num_samples > capacity` then only the final `capacity` records are kept.
    ///
    /// # Errors
    /// * [`PoolError::UnknownField`] if `values` names an unregistered field.
    /// * [`PoolError::DTypeMismatch`] if a value has the wrong element type.
    /// * [`PoolError::ShapeMismatch`] if a value does not broadcast to the record shape.
    ///
    /// Nothing is written if an error is returned.
    pub fn add_samples<I, K>(&mut self, num_samples: usize, values: I) -> Result<(), PoolError>
    where
        I: IntoIterator<Item = (K, FieldArray)>,
        K: Into<String>,
    {
        let mut supplied: Vec<Option<FieldArray>> = vec![None; self.fields.len()];
        for (name, value) in values {
            let name = name.into();
            let position = self
                .fields
                .position(&name)
                .ok_or_else(|| PoolError::UnknownField { name: name.clone() })?;
            check_values(&self.fields.fields()[position], num_samples, &value)?;
            supplied[position] = Some(value);
        }

        if self.capacity == 0 {
            return Ok(());
        }
        // Records before `skip` would be overwritten within this same write.
        let skip = num_samples.saturating_sub(self.capacity);
        let indices: Vec<_> = (skip..num_samples)
            .map(|k| (self.pointer + k % self.capacity) % self.capacity)
            .collect();

        for (field, value) in self.fields.fields_mut().iter_mut().zip(supplied) {
            let written = match value {
                Some(value) if skip > 0 => {
                    let tail = broadcast_records(&field.spec, num_samples, value).tail_rows(skip);
                    field.data.assign_rows(&indices, &tail)
                }
                Some(value) => field.data.assign_rows(&indices, &value),
                None => field
                    .data
                    .fill_rows(&indices, &field.spec.resolved_default()),
            };
            debug_assert!(written.is_some(), "values were checked before writing");
        }
        self.advance(num_samples);
        Ok(())
    }

    fn advance(&mut self, count: usize) {
        self.pointer = (self.pointer + count % self.capacity) % self.capacity;
        self.size = self.size.saturating_add(count).min(self.capacity);
    }
}

fn check_values(field: &Field, num_samples: usize, value: &FieldArray) -> Result<(), PoolError> {
    if value.dtype() != field.spec.dtype {
        return Err(PoolError::DTypeMismatch {
            name: field.name.clone(),
            expected: field.spec.dtype,
            actual: value.dtype(),
        });
    }
    let expected = field.spec.storage_shape(num_samples);
    if !value.broadcasts_to(&expected) {
        return Err(PoolError::ShapeMismatch {
            name: field.name.clone(),
            expected,
            actual: value.shape().to_vec(),
        });
    }
    Ok(())
}

/// Materialize `value` at the full `(num_samples,) + spec.shape` record shape.
fn broadcast_records(spec: &FieldSpec, num_samples: usize, value: FieldArray) -> FieldArray {
    let shape = spec.storage_shape(num_samples);
    if value.shape() == shape.as_slice() {
        return value;
    }
    let mut full = FieldArray::zeros(spec.dtype, &shape);
    let all: Vec<_> = (0..num_samples).collect();
    let written = full.assign_rows(&all, &value);
    debug_assert!(written.is_some(), "values were checked before writing");
    full
}
