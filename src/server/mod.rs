mod audits;
mod availabilities;
pub mod dto;
mod items;
pub mod response;
mod router;
pub mod shipments;
mod ships;
mod sites;
mod users;
pub mod validation;

pub use audits::audits_router;
pub use availabilities::availabilities_router;
pub use items::items_router;
pub use router::{AppState, create_router};
pub use shipments::shipments_router;
pub use ships::ships_router;
pub use sites::sites_router;
pub use users::users_router;
