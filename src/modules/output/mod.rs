mod display;
mod logsink;

pub use display::DisplayOutput;
pub use logsink::LogOutput;
