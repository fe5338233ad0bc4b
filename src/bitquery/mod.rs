pub mod query_client;
pub mod stream_client;
pub mod types;

pub use query_client::{BitqueryClient, QueryError};
pub use stream_client::BitqueryStream;
