//! Indentation-aware source buffer

const INDENT: &str = "    ";

/// Accumulates generated source one line at a time
#[derive(Debug, Default)]
pub struct SourceWriter {
    out: String,
    depth: usize,
}

impl SourceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current depth
    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str(INDENT);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.line("")
    }

    pub fn doc(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.line(format!("/// {}", text.as_ref()))
    }

    /// Write `text {` and indent
    pub fn open(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.line(format!("{} {{", text.as_ref()));
        self.depth += 1;
        self
    }

    /// Dedent and write `}` followed by `suffix`
    pub fn close(&mut self, suffix: &str) -> &mut Self {
        self.depth = self.depth.saturating_sub(1);
        self.line(format!("}}{}", suffix))
    }

    /// Append already formatted source verbatim
    pub fn raw(&mut self, source: &str) -> &mut Self {
        self.out.push_str(source);
        self
    }

    pub fn finish(self) -> String {
        self.out
    }
}
