//! Run parameters: the operator-edited configuration, design variables,
//! the scalar-or-vector codec and the run request built from them.

pub mod codec;
mod payload;
mod types;

pub use codec::{Scalar, ScalarOrVector};
pub use payload::RunRequest;
pub use types::*;
