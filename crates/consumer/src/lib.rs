pub mod service;

pub use service::{ConsumerService, ConsumerServiceBuilder};
