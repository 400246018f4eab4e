//! A fixed-capacity, multi-field circular replay pool.
//!
//! Records are written to a [`FlexibleReplayPool`] made of named fields,
//! each with its own element type and shape, and read back in batches by
//! random sampling, recency, or explicit index.
//!
//! # Example
//! ```
//! use flexpool::{AllFields, DType, FieldSpec, FlexibleReplayPool, Prng};
//! use rand::SeedableRng;
//!
//! let mut pool = FlexibleReplayPool::new(
//!     100,
//!     [
//!         ("observation", FieldSpec::new(DType::F32, [3])),
//!         ("reward", FieldSpec::scalar(DType::F64)),
//!         ("done", FieldSpec::scalar(DType::Bool)),
//!     ],
//! )
//! .unwrap();
//! pool.add_sample([
//!     ("observation", vec![0.1_f32, 0.2, 0.3].into()),
//!     ("reward", 1.0_f64.into()),
//! ])
//! .unwrap();
//!
//! let mut rng = Prng::seed_from_u64(0);
//! let batch = pool.random_batch(8, AllFields, &mut rng);
//! assert_eq!(batch["observation"].shape(), &[8, 3]);
//! ```
#![warn(clippy::cast_lossless)]
#![warn(clippy::cast_possible_truncation)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::missing_const_for_fn)] // has some false positives
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::use_self)] // also triggered by macro expansions
pub mod array;
mod error;
pub mod fields;
pub mod pool;
pub mod sample;
pub mod snapshot;

pub use array::{DType, Element, FieldArray};
pub use error::PoolError;
pub use fields::{FieldRegistry, FieldSpec, InitFn, Initializer};
pub use pool::{FlexibleReplayPool, ReplayPoolConfig};
pub use sample::{AllFields, Batch, FieldFilter};
pub use snapshot::{FieldState, PoolState};

/// Pseudo-random number generator used for sampling.
pub type Prng = rand_chacha::ChaCha8Rng;
