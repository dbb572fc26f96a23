//! Line buffer used by the code generator.
//!
//! Tokens are appended one at a time. In compact mode spaces and newlines are
//! only emitted where two adjacent tokens would otherwise merge.

pub struct Output {
    lines: Vec<String>,
    current_line: String,
    indent_level: usize,
    indent_string: String,
    at_line_start: bool,
    compact: bool,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '\\' || !c.is_ascii()
}

/// Whether `prev` followed directly by `next` would lex differently.
fn needs_separator(prev: char, next: char) -> bool {
    (is_word_char(prev) && is_word_char(next))
        || (prev == '+' && next == '+')
        || (prev == '-' && next == '-')
        || (prev == '/' && next == '/')
        || (prev == '<' && next == '!')
}

impl Output {
    pub fn new(indent_string: String, compact: bool) -> Self {
        Self {
            lines: Vec::new(),
            current_line: String::new(),
            indent_level: 0,
            indent_string,
            at_line_start: true,
            compact,
        }
    }

    pub fn add_token(&mut self, text: &str) {
        let Some(first) = text.chars().next() else {
            return;
        };
        if self.at_line_start {
            if !self.compact {
                self.current_line.push_str(&self.get_indent());
            }
            self.at_line_start = false;
        }
        if let Some(prev) = self.current_line.chars().next_back() {
            if needs_separator(prev, first) {
                self.current_line.push(' ');
            }
        }
        self.current_line.push_str(text);
    }

    /// Appends text verbatim, without separating it from the previous token.
    pub fn add_raw(&mut self, text: &str) {
        if self.at_line_start && !text.is_empty() {
            if !self.compact {
                self.current_line.push_str(&self.get_indent());
            }
            self.at_line_start = false;
        }
        self.current_line.push_str(text);
    }

    pub fn add_space(&mut self) {
        if !self.compact && !self.current_line.is_empty() && !self.current_line.ends_with(' ') {
            self.current_line.push(' ');
        }
    }

    pub fn add_newline(&mut self) {
        if self.compact {
            return;
        }
        if !self.current_line.is_empty() {
            self.lines.push(std::mem::take(&mut self.current_line));
        }
        self.at_line_start = true;
    }

    pub fn add_indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn remove_indent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    pub fn get_indent(&self) -> String {
        self.indent_string.repeat(self.indent_level)
    }

    pub const fn is_compact(&self) -> bool {
        self.compact
    }

    pub fn finish(mut self) -> String {
        if !self.current_line.is_empty() {
            self.lines.push(self.current_line);
        }
        self.lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_separates_words_only() {
        let mut out = Output::new("  ".to_string(), true);
        for token in ["return", "x", "+", "+", "y", ";"] {
            out.add_token(token);
        }
        out.add_space();
        out.add_newline();
        assert_eq!(out.finish(), "return x+ +y;");
    }

    #[test]
    fn test_pretty_indents_lines() {
        let mut out = Output::new("  ".to_string(), false);
        out.add_token("{");
        out.add_indent();
        out.add_newline();
        out.add_token("a");
        out.add_token(";");
        out.remove_indent();
        out.add_newline();
        out.add_token("}");
        assert_eq!(out.finish(), "{\n  a;\n}");
    }
}
