/// Capabilities / limits of a notification transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SinkCapabilities {
    /// Maximum characters in a text message.
    pub max_text_len: usize,
    /// Maximum characters in a media caption.
    pub max_caption_len: usize,
}

impl SinkCapabilities {
    /// Telegram Bot API limits.
    pub const TELEGRAM: SinkCapabilities = SinkCapabilities {
        max_text_len: 4096,
        max_caption_len: 1024,
    };
}
