pub mod realtime;

// Re-export commonly used types for convenience
pub use realtime::{
    ClientNotification, MediaInput, ProviderConnector, RealtimeError, RealtimeProvider,
    RealtimeResult, SessionMode, TerminationKind, TerminationReason, UpstreamConnector,
    UpstreamSession, WireCodec, codec_for, get_supported_realtime_providers,
};
