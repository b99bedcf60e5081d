pub mod gate;
pub mod kinematics;
pub mod modules;
pub mod monitor;
pub mod pipeline;
pub mod protocol;
pub mod select;
pub mod session;
pub mod settings;
pub mod shape;
pub mod transmitter;
pub mod transport;
