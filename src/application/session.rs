//! Explicit session context handed to the engine on every call.

use crate::application::error::FeedError;
use crate::domain::entities::Viewer;

#[derive(Debug, Clone, Default)]
pub struct Session {
    viewer: Option<Viewer>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { viewer: None }
    }

    pub fn authenticated(viewer: Viewer) -> Self {
        Self {
            viewer: Some(viewer),
        }
    }

    pub fn viewer(&self) -> Option<&Viewer> {
        self.viewer.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.viewer.is_some()
    }

    /// Precondition for every mutation.
    pub fn require_viewer(&self) -> Result<&Viewer, FeedError> {
        self.viewer.as_ref().ok_or(FeedError::NotAuthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_session_has_no_viewer() {
        let session = Session::anonymous();
        assert!(!session.is_authenticated());
        assert!(matches!(
            session.require_viewer(),
            Err(FeedError::NotAuthenticated)
        ));
    }

    #[test]
    fn authenticated_session_exposes_viewer() {
        let session = Session::authenticated(Viewer::new("u1", "Ada"));
        let viewer = session.require_viewer().expect("viewer present");
        assert_eq!(viewer.id.as_str(), "u1");
    }
}
