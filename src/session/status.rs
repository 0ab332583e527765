//! Human-readable operation status, last write wins

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusChannel {
    current: Option<String>,
}

impl StatusChannel {
    pub fn set(&mut self, status: impl Into<String>) {
        self.current = Some(status.into());
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }
}
