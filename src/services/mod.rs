pub mod extractor;
pub mod orders;
pub mod scrape;

pub use extractor::ProductExtractor;
pub use orders::{OrderReport, OrderService};
pub use scrape::{ScrapeReport, ScrapeService};
