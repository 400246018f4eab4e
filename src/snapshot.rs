//! Compact pool snapshots.
//!
//! A snapshot omits the unfilled tail of each field's storage.
#![allow(clippy::use_self)] // false positive with serde derives
use crate::array::FieldArray;
use crate::error::PoolError;
use crate::fields::{Field, FieldRegistry, FieldSpec};
use crate::pool::FlexibleReplayPool;
use log::debug;
use serde::{Deserialize, Serialize};

/// Serializable state of a [`FlexibleReplayPool`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolState {
    pub capacity: usize,
    pub pointer: usize,
    pub size: usize,
    /// Fields in registry order.
    pub fields: Vec<FieldState>,
}

/// Serializable state of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldState {
    pub name: String,
    pub spec: FieldSpec,
    /// The first `size` rows of storage, or all `capacity` rows if the pool is full.
    pub data: FieldArray,
}

impl FlexibleReplayPool {
    /// Export the pool state, omitting storage rows that have never been written.
    #[must_use]
    pub fn export(&self) -> PoolState {
        let fields = self
            .fields
            .fields()
            .iter()
            .map(|field| FieldState {
                name: field.name.clone(),
                spec: field.spec.clone(),
                data: if self.size < self.capacity {
                    field.data.head_rows(self.size)
                } else {
                    field.data.clone()
                },
            })
            .collect();
        PoolState {
            capacity: self.capacity,
            pointer: self.pointer,
            size: self.size,
            fields,
        }
    }

    /// Restore a pool from an exported state.
    ///
    /// Storage is padded back to full capacity with zero-filled rows.
    ///
    /// # Errors
    /// [`PoolError::InvalidState`] if the state is internally inconsistent.
    pub fn import(state: PoolState) -> Result<Self, PoolError> {
        let PoolState {
            capacity,
            pointer,
            size,
            fields,
        } = state;
        if size > capacity {
            return Err(PoolError::InvalidState(format!(
                "size {} exceeds capacity {}",
                size, capacity
            )));
        }
        if pointer >= capacity && !(pointer == 0 && capacity == 0) {
            return Err(PoolError::InvalidState(format!(
                "pointer {} is not less than capacity {}",
                pointer, capacity
            )));
        }

        let mut registry = FieldRegistry::new(capacity);
        for FieldState { name, spec, data } in fields {
            check_field_state(&name, &spec, &data, size, capacity)?;
            registry.insert(Field {
                name,
                spec,
                data: data.pad_rows(capacity),
            });
        }
        debug!(
            "imported pool with {} of {} records in {} fields",
            size,
            capacity,
            registry.len()
        );
        Ok(Self {
            capacity,
            pointer,
            size,
            fields: registry,
        })
    }
}

fn check_field_state(
    name: &str,
    spec: &FieldSpec,
    data: &FieldArray,
    size: usize,
    capacity: usize,
) -> Result<(), PoolError> {
    if data.dtype() != spec.dtype {
        return Err(PoolError::InvalidState(format!(
            "field {:?} data has element type {} but the field has {}",
            name,
            data.dtype(),
            spec.dtype
        )));
    }
    spec.check_default(name).map_err(|err| match err {
        PoolError::InvalidField { name, reason } => {
            PoolError::InvalidState(format!("field {:?}: {}", name, reason))
        }
        other => other,
    })?;
    let rows = data.num_rows();
    if data.shape().is_empty() || data.row_shape() != spec.shape.as_slice() {
        return Err(PoolError::InvalidState(format!(
            "field {:?} data shape {:?} does not match field shape {:?}",
            name,
            data.shape(),
            spec.shape
        )));
    }
    if rows < size || rows > capacity {
        return Err(PoolError::InvalidState(format!(
            "field {:?} has {} rows for {} records with capacity {}",
            name, rows, size, capacity
        )));
    }
    Ok(())
}

impl From<FlexibleReplayPool> for PoolState {
    fn from(pool: FlexibleReplayPool) -> Self {
        pool.export()
    }
}

impl TryFrom<PoolState> for FlexibleReplayPool {
    type Error = PoolError;

    fn try_from(state: PoolState) -> Result<Self, Self::Error> {
        Self::import(state)
    }
}
