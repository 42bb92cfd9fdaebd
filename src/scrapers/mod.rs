pub mod browser;
pub mod details;
pub mod http;
pub mod listings;
pub mod page;
pub mod traits;
pub mod types;

pub use browser::ChromeSession;
pub use details::{extract_occupancy, DetailFetcher};
pub use http::HttpSession;
pub use listings::LinkCollector;
pub use traits::PageSession;
pub use types::{FetchSettings, SiteConfig};
