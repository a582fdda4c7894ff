mod api;
mod blocking;
mod error;
mod http;
pub mod token_store;

pub use api::{ApiClient, TaskApi};
pub use blocking::BlockingApiClient;
pub use error::{extract_error_message, ClientError};
pub use http::{HttpClient, RequestOptions, DEFAULT_BASE_URL};
pub use token_store::{FileTokenStore, MemoryTokenStore, StoreError, TokenStore};
