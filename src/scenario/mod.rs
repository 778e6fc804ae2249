//! Scenario presets and the resolver that switches configuration and
//! variable bounds together.

mod presets;
mod resolver;
mod types;

pub use presets::{default_presets, load_presets};
pub use resolver::ScenarioResolver;
pub use types::*;
