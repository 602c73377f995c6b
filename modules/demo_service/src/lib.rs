// === PLUGIN DEFINITION ===
pub mod plugin;
pub use plugin::DemoServicePlugin;

pub mod config;
pub mod service;

// === INTERNAL MODULES ===
// Handlers are discovered through inventory; exposed only for tests.
#[doc(hidden)]
pub mod api;
