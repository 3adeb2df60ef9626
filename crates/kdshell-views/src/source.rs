//! Read-only source file view with a highlighted current line.

use std::any::Any;
use std::path::{Path, PathBuf};

use ropey::Rope;

use crate::capability::{CanCopy, CopySink};
use crate::error::ViewError;
use crate::view::View;

const DEFAULT_VIEWPORT: usize = 20;

pub struct SourceView {
    path: PathBuf,
    rope: Rope,
    /// 0-based highlighted line.
    highlight: Option<usize>,
    scroll_top: usize,
    viewport: usize,
    copy_sink: Option<CopySink>,
}

impl SourceView {
    pub fn open(path: &Path) -> Result<Self, ViewError> {
        if !path.is_file() {
            return Err(ViewError::SourceFileNotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            rope: Rope::from_str(&String::from_utf8_lossy(&bytes)),
            highlight: None,
            scroll_top: 0,
            viewport: DEFAULT_VIEWPORT,
            copy_sink: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of text lines, not counting the empty line after a final
    /// newline.
    pub fn line_count(&self) -> usize {
        let lines = self.rope.len_lines();
        if lines > 1 && self.rope.line(lines - 1).len_chars() == 0 {
            lines - 1
        } else {
            lines
        }
    }

    /// 1-based highlighted line.
    pub fn highlighted_line(&self) -> Option<u32> {
        self.highlight.and_then(|idx| u32::try_from(idx + 1).ok())
    }

    /// Highlight 1-based `line` and scroll it into view. Returns `false` if
    /// the file has no such line.
    pub fn highlight_line(&mut self, line: u32) -> bool {
        let Some(idx) = (line as usize).checked_sub(1) else {
            return false;
        };
        if idx >= self.line_count() {
            return false;
        }
        self.highlight = Some(idx);
        self.scroll_into_view(idx);
        if let Some(sink) = &self.copy_sink {
            sink.report(true);
        }
        true
    }

    fn scroll_into_view(&mut self, idx: usize) {
        if idx < self.scroll_top || idx >= self.scroll_top + self.viewport {
            self.scroll_top = idx.saturating_sub(self.viewport / 2);
        }
    }

    fn line_text(&self, idx: usize) -> Option<String> {
        if idx >= self.line_count() {
            return None;
        }
        let line = self.rope.line(idx).to_string();
        Some(line.trim_end_matches(['\n', '\r']).to_string())
    }
}

impl View for SourceView {
    fn title(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn render(&self) -> Vec<String> {
        let end = (self.scroll_top + self.viewport).min(self.line_count());
        (self.scroll_top..end)
            .map(|idx| {
                let marker = if self.highlight == Some(idx) { '>' } else { ' ' };
                let text = self.line_text(idx).unwrap_or_default();
                format!("{marker}{:>5} {text}", idx + 1)
            })
            .collect()
    }

    fn pick(&mut self, index: usize) -> bool {
        u32::try_from(index).is_ok_and(|line| self.highlight_line(line))
    }

    fn as_copy_source(&mut self) -> Option<&mut dyn CanCopy> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl CanCopy for SourceView {
    fn can_copy(&self) -> bool {
        self.highlight.is_some()
    }

    fn copy_selection(&self) -> Option<String> {
        self.highlight.and_then(|idx| self.line_text(idx))
    }

    fn subscribe_copy(&mut self, sink: CopySink) {
        self.copy_sink = Some(sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn numbered(lines: usize) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ldr.c");
        let text: String = (1..=lines).map(|n| format!("line {n}\n")).collect();
        std::fs::write(&path, text).unwrap();
        (tmp, path)
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = SourceView::open(&tmp.path().join("nope.c")).err().unwrap();
        assert!(matches!(err, ViewError::SourceFileNotFound(_)));
    }

    #[test]
    fn trailing_newline_is_not_a_line() {
        let (_tmp, path) = numbered(3);
        let view = SourceView::open(&path).unwrap();
        assert_eq!(view.line_count(), 3);
        assert_eq!(view.title(), "ldr.c");
    }

    #[test]
    fn highlight_scrolls_into_view() {
        let (_tmp, path) = numbered(100);
        let mut view = SourceView::open(&path).unwrap();
        assert!(view.highlight_line(42));
        assert_eq!(view.highlighted_line(), Some(42));
        let rendered = view.render();
        assert_eq!(rendered.len(), DEFAULT_VIEWPORT);
        let marked: Vec<&String> = rendered.iter().filter(|l| l.starts_with('>')).collect();
        assert_eq!(marked.len(), 1);
        assert!(marked[0].ends_with("line 42"));
    }

    #[test]
    fn invalid_utf8_is_shown_lossily() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ldrinit.c");
        std::fs::write(&path, b"/* \xa9 1998 ReactOS */\nint x;\n").unwrap();

        let mut view = SourceView::open(&path).unwrap();
        assert_eq!(view.line_count(), 2);
        assert!(view.highlight_line(1));
        assert_eq!(view.copy_selection().as_deref(), Some("/* \u{fffd} 1998 ReactOS */"));
    }

    #[test]
    fn out_of_range_line_is_rejected() {
        let (_tmp, path) = numbered(5);
        let mut view = SourceView::open(&path).unwrap();
        assert!(!view.highlight_line(0));
        assert!(!view.highlight_line(6));
        assert_eq!(view.highlighted_line(), None);
    }

    #[test]
    fn copy_follows_highlight() {
        let (_tmp, path) = numbered(5);
        let mut view = SourceView::open(&path).unwrap();
        let sink = CopySink::new();
        view.subscribe_copy(sink.clone());
        assert!(!view.can_copy());

        assert!(view.pick(3));
        assert!(sink.enabled());
        assert_eq!(view.copy_selection().as_deref(), Some("line 3"));
    }
}
