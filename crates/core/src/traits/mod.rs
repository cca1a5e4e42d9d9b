pub mod message_queue;
pub mod provisioner;
pub mod repository;

pub use message_queue::*;
pub use provisioner::*;
pub use repository::*;
