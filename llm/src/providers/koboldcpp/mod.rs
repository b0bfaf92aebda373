mod api;
pub mod provider;

pub use provider::KoboldCppBackend;
