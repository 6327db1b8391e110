pub mod cas_client;

pub use cas_client::CasApiClient;
