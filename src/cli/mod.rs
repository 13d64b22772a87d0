pub mod autostart;
pub mod interval;
pub mod refresh;
pub mod status;
