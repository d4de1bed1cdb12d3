pub mod dates;
pub mod ranking;
pub mod recommendation;

pub use dates::{DateInput, DateRange};
pub use ranking::WindowRanker;
pub use recommendation::{Query, RecommendationService};
