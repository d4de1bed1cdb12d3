pub mod day_key;
pub mod forecast;
pub mod observation;
pub mod outfit;
pub mod recommendation;
pub mod window;

pub use day_key::*;
pub use forecast::*;
pub use observation::*;
pub use outfit::*;
pub use recommendation::*;
pub use window::*;
