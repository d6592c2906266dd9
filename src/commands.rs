pub mod calibrate;
pub mod gate;
pub mod status;
