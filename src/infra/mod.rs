pub mod couch_store;
pub mod introspection_client;
pub mod memory_store;
pub mod slack_client;

pub use couch_store::CouchInstanceStore;
pub use introspection_client::HttpCredentialIntrospector;
pub use memory_store::MemoryInstanceStore;
pub use slack_client::SlackClient;
