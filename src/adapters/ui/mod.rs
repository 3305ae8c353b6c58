//! Terminal front-end. Implements InputPort.

pub mod tui;

pub use tui::TuiInputPort;
