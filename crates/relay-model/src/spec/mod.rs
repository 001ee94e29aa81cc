mod api;
pub use api::ApiSpec;
