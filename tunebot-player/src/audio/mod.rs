//! Audio output side: resources, sinks, and voice sessions

pub mod paced;
pub mod resource;
pub mod session;
pub mod sink;

pub use paced::PacedSink;
pub use resource::{AudioResource, GainControl, ResourceId};
pub use session::{LoggingSession, VoiceSession};
pub use sink::{
    sink_channel, AudioSink, SinkError, SinkEvent, SinkEventReceiver, SinkEventSender,
    SinkStatus,
};
