// Irrigation and fertilizer recommendations
pub mod advisor;

// HTTP and WebSocket APIs
pub mod api;

// Configuration loading
pub mod config;

// Weather, crop and alert records
pub mod model;

// Sensor registry and simulation
pub mod sensor;

// Offline snapshot and mutation queue
pub mod store;

// Mutation replay against the remote service
pub mod sync;

// Weather sources
pub mod weather;
