use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::capability::{CanCopy, UsesConnection, UsesShell, UsesSymbols};

static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one view instance for its whole life, across detach/redock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

impl ViewId {
    pub fn next() -> Self {
        Self(NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A pluggable inspection view.
///
/// Capabilities are opted into by overriding the matching accessor to
/// return `Some(self)`.
pub trait View: Any {
    /// Tab caption.
    fn title(&self) -> String;

    /// Current contents as text lines.
    fn render(&self) -> Vec<String>;

    /// Act on entry `index` of whatever the view lists. Returns `false` if
    /// the view has no such entry.
    fn pick(&mut self, _index: usize) -> bool {
        false
    }

    fn as_connection_user(&mut self) -> Option<&mut dyn UsesConnection> {
        None
    }

    fn as_symbol_user(&mut self) -> Option<&mut dyn UsesSymbols> {
        None
    }

    fn as_shell_user(&mut self) -> Option<&mut dyn UsesShell> {
        None
    }

    fn as_copy_source(&mut self) -> Option<&mut dyn CanCopy> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A view instance as the workspace holds it.
pub struct HostedView {
    id: ViewId,
    type_id: &'static str,
    view: Box<dyn View>,
}

impl HostedView {
    pub fn new(type_id: &'static str, view: Box<dyn View>) -> Self {
        Self {
            id: ViewId::next(),
            type_id,
            view,
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn type_id(&self) -> &'static str {
        self.type_id
    }

    pub fn view(&self) -> &dyn View {
        self.view.as_ref()
    }

    pub fn view_mut(&mut self) -> &mut dyn View {
        self.view.as_mut()
    }

    pub fn downcast_ref<T: View>(&self) -> Option<&T> {
        self.view.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: View>(&mut self) -> Option<&mut T> {
        self.view.as_any_mut().downcast_mut::<T>()
    }
}

impl fmt::Debug for HostedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostedView")
            .field("id", &self.id)
            .field("type_id", &self.type_id)
            .field("title", &self.view.title())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Note(&'static str);

    impl View for Note {
        fn title(&self) -> String {
            self.0.to_string()
        }

        fn render(&self) -> Vec<String> {
            vec![self.0.to_string()]
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn ids_are_unique() {
        let a = HostedView::new("note", Box::new(Note("a")));
        let b = HostedView::new("note", Box::new(Note("b")));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn default_view_has_no_capabilities() {
        let mut note = Note("n");
        assert!(note.as_connection_user().is_none());
        assert!(note.as_symbol_user().is_none());
        assert!(note.as_shell_user().is_none());
        assert!(note.as_copy_source().is_none());
        assert!(!note.pick(0));
    }

    #[test]
    fn downcast_reaches_concrete_type() {
        let mut hosted = HostedView::new("note", Box::new(Note("x")));
        assert_eq!(hosted.downcast_ref::<Note>().unwrap().0, "x");
        hosted.downcast_mut::<Note>().unwrap().0 = "y";
        assert_eq!(hosted.view().title(), "y");
    }
}
