pub mod in_memory_queue;
pub mod memory_store;
pub mod rabbitmq_queue;
pub mod service_endpoint;
pub mod shell_provisioner;

pub use in_memory_queue::InMemoryMessageQueue;
pub use memory_store::{InMemoryAppStore, InMemoryServiceInstanceStore};
pub use rabbitmq_queue::RabbitMqMessageQueue;
pub use service_endpoint::ServiceEndpointClient;
pub use shell_provisioner::ShellProvisioner;
