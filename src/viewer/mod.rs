pub mod application;
pub mod dispatcher;
pub mod events;
pub mod instruction_handlers;
