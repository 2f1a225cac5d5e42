pub mod control_task;
pub mod dispatch;
pub mod sink;
pub mod text_task;

pub use control_task::ControlTask;
pub use dispatch::{DispatcherCommand, SynthesisDispatcher};
pub use sink::{SinkEvent, WavSink};
pub use text_task::{TextEvent, TextFeed};
