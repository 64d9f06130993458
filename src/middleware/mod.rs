mod actor;

pub use actor::{Actor, ACTOR_HEADER};
