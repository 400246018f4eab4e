//! Field descriptors and the field registry.
#![allow(clippy::use_self)] // false positive with serde derives
use crate::array::{DType, FieldArray};
use crate::error::PoolError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Function that allocates an array of the given element type and shape.
pub type InitFn = fn(DType, &[usize]) -> FieldArray;

/// Fill pattern for newly allocated field storage.
#[derive(Copy, Clone, Serialize, Deserialize)]
pub enum Initializer {
    /// Initialize to all zeros (`false` for booleans).
    Zeros,
    /// Initialize all elements to the given constant cast to the field element type.
    Constant(f64),
    /// Allocate with a custom function.
    ///
    /// Not serializable; serializing a descriptor with a custom initializer is an error.
    #[serde(skip)]
    Custom(InitFn),
}

impl Default for Initializer {
    fn default() -> Self {
        Self::Zeros
    }
}

impl fmt::Debug for Initializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zeros => f.write_str("Zeros"),
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::Custom(init) => f.debug_tuple("Custom").field(&(*init as usize)).finish(),
        }
    }
}

impl PartialEq for Initializer {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Zeros, Self::Zeros) => true,
            (Self::Constant(a), Self::Constant(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => *a as usize == *b as usize,
            _ => false,
        }
    }
}

impl Initializer {
    /// Allocate an array with this fill pattern.
    #[must_use]
    pub fn allocate(&self, dtype: DType, shape: &[usize]) -> FieldArray {
        match self {
            Self::Zeros => FieldArray::zeros(dtype, shape),
            Self::Constant(value) => FieldArray::constant(dtype, shape, *value),
            Self::Custom(init) => init(dtype, shape),
        }
    }
}

/// Description of a single field: the element type and shape of each record entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Element type.
    pub dtype: DType,
    /// Shape of a single record entry (excluding the record axis).
    pub shape: Vec<usize>,
    /// Value written when a write omits this field.
    ///
    /// Broadcast to `shape`. Zero when `None`.
    pub default_value: Option<FieldArray>,
    /// Fill pattern for slots that have never been written.
    pub initializer: Initializer,
}

impl FieldSpec {
    /// A field with zero default value and zero initializer.
    #[must_use]
    pub fn new<S: Into<Vec<usize>>>(dtype: DType, shape: S) -> Self {
        Self {
            dtype,
            shape: shape.into(),
            default_value: None,
            initializer: Initializer::Zeros,
        }
    }

    /// A field with a single element per record.
    #[must_use]
    pub fn scalar(dtype: DType) -> Self {
        Self::new(dtype, Vec::new())
    }

    #[must_use]
    pub fn with_default<V: Into<FieldArray>>(mut self, value: V) -> Self {
        self.default_value = Some(value.into());
        self
    }

    #[must_use]
    pub const fn with_initializer(mut self, initializer: Initializer) -> Self {
        self.initializer = initializer;
        self
    }

    /// The default value with the field shape.
    #[must_use]
    pub fn resolved_default(&self) -> FieldArray {
        match &self.default_value {
            Some(value) => value.clone(),
            None => FieldArray::zeros(self.dtype, &self.shape),
        }
    }

    /// Shape of storage holding `num_rows` records of this field.
    #[must_use]
    pub fn storage_shape(&self, num_rows: usize) -> Vec<usize> {
        let mut shape = Vec::with_capacity(self.shape.len() + 1);
        shape.push(num_rows);
        shape.extend_from_slice(&self.shape);
        shape
    }

    pub(crate) fn check_default(&self, name: &str) -> Result<(), PoolError> {
        if let Some(value) = &self.default_value {
            if value.dtype() != self.dtype {
                return Err(PoolError::InvalidField {
                    name: name.into(),
                    reason: format!(
                        "default value has element type {} but the field has {}",
                        value.dtype(),
                        self.dtype
                    ),
                });
            }
            if !value.broadcasts_to(&self.shape) {
                return Err(PoolError::InvalidField {
                    name: name.into(),
                    reason: format!(
                        "default value of shape {:?} does not broadcast to {:?}",
                        value.shape(),
                        self.shape
                    ),
                });
            }
        }
        Ok(())
    }
}

/// A named field with its descriptor and backing storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub spec: FieldSpec,
    /// Storage of shape `(capacity,) + spec.shape`.
    pub data: FieldArray,
}

/// Ordered collection of fields sharing a common record capacity.
///
/// Iteration follows registration order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRegistry {
    capacity: usize,
    fields: Vec<Field>,
    index: HashMap<String, usize>,
}

impl FieldRegistry {
    /// An empty registry for `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            fields: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register fields, allocating storage for each.
    ///
    /// Re-registering an existing name replaces its descriptor and reallocates its storage,
    /// keeping its position in the registry order.
    /// All descriptors are checked before any field is allocated.
    ///
    /// # Errors
    /// [`PoolError::InvalidField`] if a default value does not match the field
    /// or a custom initializer returns an array of the wrong type or shape.
    pub fn register<I, K>(&mut self, fields: I) -> Result<(), PoolError>
    where
        I: IntoIterator<Item = (K, FieldSpec)>,
        K: Into<String>,
    {
        let mut allocated = Vec::new();
        for (name, spec) in fields {
            let name = name.into();
            spec.check_default(&name)?;
            let data = self.allocate(&name, &spec)?;
            allocated.push(Field { name, spec, data });
        }
        for field in allocated {
            self.insert(field);
        }
        Ok(())
    }

    fn allocate(&self, name: &str, spec: &FieldSpec) -> Result<FieldArray, PoolError> {
        let shape = spec.storage_shape(self.capacity);
        let data = spec.initializer.allocate(spec.dtype, &shape);
        if data.dtype() != spec.dtype || data.shape() != shape.as_slice() {
            return Err(PoolError::InvalidField {
                name: name.into(),
                reason: format!(
                    "initializer returned {} array of shape {:?}, expected {} array of shape {:?}",
                    data.dtype(),
                    data.shape(),
                    spec.dtype,
                    shape
                ),
            });
        }
        Ok(data)
    }

    /// Insert a field with already-allocated storage.
    pub(crate) fn insert(&mut self, field: Field) {
        if let Some(&i) = self.index.get(&field.name) {
            warn!("reallocating field {:?}; its stored records are discarded", field.name);
            self.fields[i] = field;
        } else {
            debug!(
                "allocated field {:?} with storage shape {:?}",
                field.name,
                field.data.shape()
            );
            self.index.insert(field.name.clone(), self.fields.len());
            self.fields.push(field);
        }
    }

    /// Record capacity of every field's storage.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of registered fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Field names in registration order.
    pub fn field_names(&self) -> impl ExactSizeIterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    /// The descriptor of the named field.
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&FieldSpec> {
        self.get(name).map(|field| &field.spec)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// All fields in registration order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [Field] {
        &mut self.fields
    }

    /// Position of the named field in registration order.
    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}
