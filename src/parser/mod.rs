pub mod extract;
pub mod page;
pub mod pagination;

pub use page::ListingPage;
pub use pagination::PageCeiling;
