pub mod engine;
pub mod io;
pub mod metrics;
pub mod model;
pub mod records;
pub mod timing;
