pub mod current_actor;

pub use current_actor::CurrentActor;
