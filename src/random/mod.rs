//! Named random streams and the sampling capability used by the exposure
//! samplers.
//!
//! Each stream is declared with [`define_rng!`] and seeded from the context's
//! base seed plus a hash of the stream name, so adding draws to one stream
//! never shifts the draws of another.
mod context_ext;
mod macros;
mod source;

use std::any::{Any, TypeId};
use std::cell::RefCell;

pub use context_ext::ContextRandomExt;
pub use macros::define_rng;
pub use source::{round_random, RandomSource};

use crate::define_data_plugin;
use crate::rand::SeedableRng;
use crate::HashMap;

pub trait RngId: Copy + Clone + 'static {
    type RngType: SeedableRng;
    fn get_name() -> &'static str;
}

// Type-erased so that streams may use any `SeedableRng`.
struct RngHolder {
    rng: Box<dyn Any>,
}

// * base_seed: seed shared by every stream of this context
// * rng_holders: streams keyed by `RngId`, behind a `RefCell` so that drawing
//   only needs `&Context`
struct RngData {
    base_seed: u64,
    rng_holders: RefCell<HashMap<TypeId, RngHolder>>,
}

define_data_plugin!(
    RngPlugin,
    RngData,
    RngData {
        base_seed: 0,
        rng_holders: RefCell::new(HashMap::default()),
    }
);
