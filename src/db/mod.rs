pub mod matches;
pub mod players;
pub mod reviews;
pub mod store;
pub mod teams;
pub mod transfers;

pub use reviews::IdentityReview;
pub use store::Store;
pub use teams::{NewLeague, NewTeam};
