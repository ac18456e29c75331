pub mod adapters;
pub mod fetcher;
pub mod scheduler;
pub mod series;
pub mod types;
