// Message composer
//
// Multi-line input buffer with a cursor. The panel grows with its content:
// visible height is the number of wrapped lines clamped to the configured
// bounds, and longer drafts scroll inside the panel.

use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Default)]
pub struct Composer {
    buffer: String,
    /// Byte offset into `buffer`, always on a char boundary
    cursor: usize,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn is_blank(&self) -> bool {
        self.buffer.trim().is_empty()
    }

    /// Take the draft, leaving the composer empty
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.buffer)
    }

    pub fn insert(&mut self, c: char) {
        self.buffer.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn newline(&mut self) {
        self.insert('\n');
    }

    pub fn backspace(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.buffer.replace_range(prev..self.cursor, "");
            self.cursor = prev;
        }
    }

    pub fn delete(&mut self) {
        if let Some(next) = self.next_boundary() {
            self.buffer.replace_range(self.cursor..next, "");
        }
    }

    pub fn move_left(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.cursor = prev;
        }
    }

    pub fn move_right(&mut self) {
        if let Some(next) = self.next_boundary() {
            self.cursor = next;
        }
    }

    /// Start of the current line
    pub fn home(&mut self) {
        self.cursor = self.buffer[..self.cursor]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);
    }

    /// End of the current line
    pub fn end(&mut self) {
        self.cursor = self.buffer[self.cursor..]
            .find('\n')
            .map(|i| self.cursor + i)
            .unwrap_or(self.buffer.len());
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.buffer[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
    }

    fn next_boundary(&self) -> Option<usize> {
        self.buffer[self.cursor..]
            .chars()
            .next()
            .map(|c| self.cursor + c.len_utf8())
    }

    /// Draft split into display rows of at most `width` columns
    ///
    /// Explicit newlines always start a row; long lines wrap per character.
    pub fn wrapped_lines(&self, width: u16) -> Vec<String> {
        wrap_hard(&self.buffer, width)
    }

    /// Row and column of the cursor within `wrapped_lines(width)`
    pub fn cursor_position(&self, width: u16) -> (u16, u16) {
        let before = wrap_hard(&self.buffer[..self.cursor], width);
        let row = before.len().saturating_sub(1);
        let col = before
            .last()
            .map(|line| line.chars().filter_map(|c| c.width()).sum::<usize>())
            .unwrap_or(0);

        // A full row pushes the cursor onto the next one
        if col >= width.max(1) as usize {
            (row as u16 + 1, 0)
        } else {
            (row as u16, col as u16)
        }
    }

    /// Panel height in text rows: wrapped rows clamped to `[min, max]`
    pub fn visible_height(&self, width: u16, min: u16, max: u16) -> u16 {
        let rows = self.wrapped_lines(width).len() as u16;
        rows.clamp(min, max.max(min))
    }
}

fn wrap_hard(text: &str, width: u16) -> Vec<String> {
    let width = width.max(1) as usize;
    let mut rows = Vec::new();

    for line in text.split('\n') {
        let mut row = String::new();
        let mut used = 0;
        for c in line.chars() {
            let w = c.width().unwrap_or(0);
            if used + w > width && !row.is_empty() {
                rows.push(std::mem::take(&mut row));
                used = 0;
            }
            row.push(c);
            used += w;
        }
        rows.push(row);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &str) -> Composer {
        let mut composer = Composer::new();
        for c in text.chars() {
            if c == '\n' {
                composer.newline();
            } else {
                composer.insert(c);
            }
        }
        composer
    }

    #[test]
    fn test_height_grows_with_content() {
        let composer = typed("Quais coberturas tenho?");
        assert_eq!(composer.visible_height(40, 1, 6), 1);
        // 23 columns over a 10-column panel
        assert_eq!(composer.visible_height(10, 1, 6), 3);

        let long = typed("a\nb\nc\nd\ne\nf\ng\nh");
        assert_eq!(long.visible_height(40, 1, 6), 6);
        assert_eq!(Composer::new().visible_height(40, 2, 6), 2);
    }

    #[test]
    fn test_newline_then_take() {
        let mut composer = typed("Olá\nTudo bem?");
        assert_eq!(composer.wrapped_lines(40), vec!["Olá", "Tudo bem?"]);
        assert_eq!(composer.take(), "Olá\nTudo bem?");
        assert!(composer.is_blank());
        assert_eq!(composer.cursor_position(40), (0, 0));
    }

    #[test]
    fn test_editing_multibyte_text() {
        let mut composer = typed("apólice");
        composer.move_left();
        composer.move_left();
        composer.move_left();
        composer.move_left();
        // Cursor sits after "apó"
        composer.backspace();
        assert_eq!(composer.text(), "aplice");
        composer.insert('ó');
        composer.end();
        composer.delete();
        composer.home();
        composer.delete();
        assert_eq!(composer.text(), "pólice");
    }

    #[test]
    fn test_cursor_follows_wrapping() {
        let composer = typed("abcdefghij");
        assert_eq!(composer.cursor_position(4), (2, 2));
        let exact = typed("abcd");
        assert_eq!(exact.cursor_position(4), (1, 0));
        let lines = typed("ab\ncd");
        assert_eq!(lines.cursor_position(10), (1, 2));
    }
}
