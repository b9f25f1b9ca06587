pub mod api;
pub mod router;
pub mod sfile;
pub mod url;

pub use api::ApiHandler;
pub use router::Router;
pub use sfile::StaticFiles;
pub use url::UrlComponents;
