/// names of values used in interactions
pub mod value {
    pub const PROMPT: &str = "prompt";
    pub const TONE: &str = "tone";
}

/// Discord rejects message content longer than this
pub const MESSAGE_LIMIT: usize = 2000;
