mod client;
mod endpoints;
mod gate;
mod response;

pub use client::ApiClient;
pub use endpoints::LoginData;
pub use gate::{DEFAULT_REFRESH_THRESHOLD_MS, TokenRefreshGate, TokenRefresher};
pub use reqwest::Method;
pub use response::ApiResponse;
