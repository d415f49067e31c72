pub mod cycler;
pub mod logging;
pub mod model;
pub mod notification;
pub mod scheduler;
