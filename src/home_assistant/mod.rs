pub mod availability;
pub mod device;
pub mod sensor;
