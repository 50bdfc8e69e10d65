// Purpose - audio device output and backend selection

pub mod device;

pub use device::AudioSystem;
