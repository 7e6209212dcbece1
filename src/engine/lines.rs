//! Line-oriented view of file content.
//!
//! Splitting remembers the newline convention and whether the content ended
//! with a newline, so rendering reproduces both.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Newline {
    Lf,
    CrLf,
}

impl Newline {
    /// `\r\n` wins as soon as it appears anywhere in the content.
    pub fn detect(content: &str) -> Self {
        if content.contains("\r\n") {
            Newline::CrLf
        } else {
            Newline::Lf
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::CrLf => "\r\n",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<String>,
    newline: Newline,
    trailing_newline: bool,
}

impl LineBuffer {
    pub fn parse(content: &str) -> Self {
        let newline = Newline::detect(content);
        let trailing_newline = content.ends_with('\n');

        if content.is_empty() {
            return Self {
                lines: Vec::new(),
                newline,
                trailing_newline,
            };
        }

        let body = content.strip_suffix('\n').unwrap_or(content);
        let mut lines: Vec<String> = body.split('\n').map(str::to_string).collect();

        // A `\r` is part of the line ending only when a `\n` followed it.
        let last = lines.len() - 1;
        for (idx, line) in lines.iter_mut().enumerate() {
            if (idx < last || trailing_newline) && line.ends_with('\r') {
                line.pop();
            }
        }

        Self {
            lines,
            newline,
            trailing_newline,
        }
    }

    pub fn render(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let newline = self.newline.as_str();
        let mut out = self.lines.join(newline);
        if self.trailing_newline {
            out.push_str(newline);
        }
        out
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn newline(&self) -> Newline {
        self.newline
    }

    /// Insert `new_lines` so the first of them lands at `index`.
    pub fn insert_at(&mut self, index: usize, new_lines: impl IntoIterator<Item = String>) {
        let index = index.min(self.lines.len());
        self.lines.splice(index..index, new_lines);
    }

    pub fn remove(&mut self, index: usize) -> Option<String> {
        (index < self.lines.len()).then(|| self.lines.remove(index))
    }
}
