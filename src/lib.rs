pub mod capture;
pub mod driver;
pub mod mirage;
pub mod pwm;
pub mod receive;
pub mod smartir;
pub mod state;
pub mod transmit;
