use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeTrust {
    /// Reported by the external time service
    Trusted,
    /// Local device clock; can be tampered with
    Fallback,
}

/// Resolved time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedTime {
    /// Always true: a timestamp is produced even when the service fails.
    pub success: bool,
    /// Milliseconds since the Unix epoch, as decimal text
    pub millis: String,
    pub trust: TimeTrust,
    /// Service that answered; empty for a fallback
    pub source_url: String,
}

impl TrustedTime {
    pub fn trusted(millis: i64, source_url: impl Into<String>) -> Self {
        Self {
            success: true,
            millis: millis.to_string(),
            trust: TimeTrust::Trusted,
            source_url: source_url.into(),
        }
    }

    pub fn fallback(millis: i64) -> Self {
        Self {
            success: true,
            millis: millis.to_string(),
            trust: TimeTrust::Fallback,
            source_url: String::new(),
        }
    }

    pub fn is_trusted(&self) -> bool {
        self.trust == TimeTrust::Trusted
    }

    pub fn millis_value(&self) -> Option<i64> {
        self.millis.parse().ok()
    }
}
