//! Indentation-aware text builder for generated C and C++ sources.

/// Column limit for wrapped signatures.
const WRAP_COLUMN: usize = 80;

#[derive(Debug, Default)]
pub struct SourceWriter {
    out: String,
    depth: usize,
}

impl SourceWriter {
    pub fn new() -> Self {
        SourceWriter::default()
    }

    fn indent_width(&self) -> usize {
        self.depth * 2
    }

    /// Write one line at the current depth. Embedded newlines are indented
    /// line by line; empty lines stay empty.
    pub fn line(&mut self, text: impl AsRef<str>) {
        for l in text.as_ref().split('\n') {
            if l.is_empty() {
                self.out.push('\n');
            } else {
                self.out.extend(std::iter::repeat(' ').take(self.indent_width()));
                self.out.push_str(l);
                self.out.push('\n');
            }
        }
    }

    pub fn lines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for l in lines {
            self.line(l);
        }
    }

    /// A single blank line; consecutive calls collapse.
    pub fn blank(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// `head {` followed by an indented block.
    pub fn open(&mut self, head: impl AsRef<str>) {
        let head = head.as_ref();
        if head.is_empty() {
            self.line("{");
        } else {
            self.line(format!("{head} {{"));
        }
        self.indent();
    }

    /// Close a block opened with [`SourceWriter::open`]; `tail` follows the brace.
    pub fn close(&mut self, tail: &str) {
        self.dedent();
        self.line(format!("}}{tail}"));
    }

    /// `//` comment lines; blank entries become a bare `//`.
    pub fn comment<S: AsRef<str>>(&mut self, lines: &[S]) {
        for l in lines {
            let l = l.as_ref().trim_end();
            if l.is_empty() {
                self.line("//");
            } else {
                self.line(format!("// {l}"));
            }
        }
    }

    /// `/// ...` documentation block, as carried over from the native header.
    pub fn doc<S: AsRef<str>>(&mut self, lines: &[S]) {
        for l in lines {
            let l = l.as_ref().trim_end();
            if l.is_empty() {
                self.line("///");
            } else {
                self.line(format!("/// {l}"));
            }
        }
    }

    /// `head(a, b, c)tail`, wrapped one argument per line past the column limit.
    pub fn signature(&mut self, head: &str, args: &[String], tail: &str) {
        let single = format!("{head}({}){tail}", args.join(", "));
        if self.indent_width() + single.len() <= WRAP_COLUMN || args.len() < 2 {
            self.line(single);
            return;
        }
        self.line(format!("{head}("));
        self.depth += 2;
        let last = args.len() - 1;
        for (i, arg) in args.iter().enumerate() {
            if i == last {
                self.line(format!("{arg}){tail}"));
            } else {
                self.line(format!("{arg},"));
            }
        }
        self.depth -= 2;
    }

    pub fn finish(mut self) -> String {
        while self.out.ends_with("\n\n") {
            self.out.pop();
        }
        self.out
    }
}

/// Generated-file banner: configured lines, then the translator notice.
pub fn banner(w: &mut SourceWriter, lines: &[String], notice: &[&str]) {
    if !lines.is_empty() {
        w.comment(lines);
        w.line("//");
        w.line("// ---------------------------------------------------------------------------");
        w.line("//");
    }
    w.comment(notice);
    w.blank();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_indent_and_close() {
        let mut w = SourceWriter::new();
        w.open("int f()");
        w.line("return 0;");
        w.close("");
        assert_eq!(w.finish(), "int f() {\n  return 0;\n}\n");
    }

    #[test]
    fn embedded_newlines_keep_relative_indent() {
        let mut w = SourceWriter::new();
        w.indent();
        w.line("if (x)\n  y();");
        assert_eq!(w.finish(), "  if (x)\n    y();\n");
    }

    #[test]
    fn long_signatures_wrap() {
        let mut w = SourceWriter::new();
        let args: Vec<String> = (0..6).map(|i| format!("struct _cef_browser_t* argument{i}")).collect();
        w.signature("void cef_something", &args, ";");
        let text = w.finish();
        assert!(text.starts_with("void cef_something(\n    struct _cef_browser_t* argument0,\n"));
        assert!(text.ends_with("argument5);\n"));
    }

    #[test]
    fn short_signatures_stay_on_one_line() {
        let mut w = SourceWriter::new();
        w.signature("int f", &["int a".to_string(), "int b".to_string()], ";");
        assert_eq!(w.finish(), "int f(int a, int b);\n");
    }

    #[test]
    fn blank_lines_collapse() {
        let mut w = SourceWriter::new();
        w.line("a");
        w.blank();
        w.blank();
        w.line("b");
        w.blank();
        assert_eq!(w.finish(), "a\n\nb\n");
    }
}
