pub mod client;
pub mod task_repo;

pub use client::MongoClient;
pub use task_repo::MongoTaskBackend;
