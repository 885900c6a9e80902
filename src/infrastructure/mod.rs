pub mod clock;
pub mod logging;
pub mod radio;
pub mod runtime;
pub mod sensor;
