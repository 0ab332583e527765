//! Patient-context binding for the session

/// The external record (patient) the session is currently bound to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    bound_record_id: Option<String>,
}

impl SessionContext {
    pub fn bind(&mut self, record_id: impl Into<String>) {
        self.bound_record_id = Some(record_id.into());
    }

    pub fn clear(&mut self) {
        self.bound_record_id = None;
    }

    pub fn current(&self) -> Option<&str> {
        self.bound_record_id.as_deref()
    }
}
