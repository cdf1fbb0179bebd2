pub mod availability;
pub mod timegrid;

pub use availability::AvailabilityService;
pub use timegrid::ClockTime;
