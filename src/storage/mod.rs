// Object store adapters that need no network.

pub mod in_memory;

pub use in_memory::InMemoryObjectStore;
