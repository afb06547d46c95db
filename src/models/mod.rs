pub mod assembly;
pub mod attendance;
pub mod property;
pub mod proxy;
