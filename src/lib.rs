pub mod backend; // Audio capability, offline renderer and stubs
pub mod config;
pub mod dsp;
pub mod error;
pub mod generator; // Enable-gated sound generators
pub mod io;
pub mod registry;
pub mod signal; // Observable properties and enable aggregation

pub use backend::{AudioBackend, NodeId, NullBackend};
pub use error::SoundError;
pub use generator::{Sound, SoundGenerator, SoundGeneratorOptions};
pub use registry::SoundRegistry;
pub use signal::{BooleanProperty, EnableAggregator};

pub const MAX_BLOCK_SIZE: usize = 2048;
