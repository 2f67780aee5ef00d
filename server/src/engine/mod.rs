pub mod connection_registry;
pub mod directory;
pub mod presence_index;
pub mod reconciler;
pub mod room;
pub mod room_store;
pub mod validation;
