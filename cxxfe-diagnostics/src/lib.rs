//! Structured diagnostics: spans, severities, notes, and "did you mean?"
//! suggestions, formatted the way a modern C++ front end reports them.

use colored::Colorize;
use std::fmt;
use std::path::Path;

pub mod span_map;
pub use span_map::SpanMap;

/// Source code location, resolved to a byte span within one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

impl Span {
    pub fn new(file: String, line: usize, column: usize, length: usize) -> Self {
        Self {
            file,
            line,
            column,
            length,
        }
    }

    pub fn from_file_and_span(file: &str, source: &str, span: std::ops::Range<usize>) -> Self {
        let before = &source[..span.start];
        let line = before.chars().filter(|&c| c == '\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.len() + 1, |pos| before.len() - pos);
        let length = span.end.saturating_sub(span.start).max(1);

        Self {
            file: file.to_string(),
            line,
            column,
            length,
        }
    }

    pub fn unknown() -> Self {
        Self {
            file: "<unknown>".to_string(),
            line: 0,
            column: 0,
            length: 0,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self {
            file: path.display().to_string(),
            line: 0,
            column: 0,
            length: 0,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Error,
    Warning,
    Info,
    Note,
    Help,
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorLevel::Error => write!(f, "{}", "error".red().bold()),
            ErrorLevel::Warning => write!(f, "{}", "warning".yellow().bold()),
            ErrorLevel::Info => write!(f, "{}", "info".blue().bold()),
            ErrorLevel::Note => write!(f, "{}", "note".cyan().bold()),
            ErrorLevel::Help => write!(f, "{}", "help".green().bold()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: ErrorLevel,
    pub code: String,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
    pub suggestion: Option<Suggestion>,
}

#[derive(Debug, Clone)]
pub struct Suggestion {
    pub message: String,
    pub replacement: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(level: ErrorLevel, code: &str, message: String, span: Span) -> Self {
        Self {
            level,
            code: code.to_string(),
            message,
            span,
            notes: Vec::new(),
            help: None,
            suggestion: None,
        }
    }

    pub fn error(code: &str, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Error, code, message, span)
    }

    pub fn warning(code: &str, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Warning, code, message, span)
    }

    pub fn info(code: &str, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Info, code, message, span)
    }

    pub fn note(message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Note, "", message, span)
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    pub fn with_suggestion(mut self, message: String, replacement: String, span: Span) -> Self {
        self.suggestion = Some(Suggestion {
            message,
            replacement,
            span,
        });
        self
    }

    pub fn format(&self, source_code: &str) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}[{}]: {}\n",
            self.level,
            self.code,
            self.message.bold()
        ));

        output.push_str(&format!(
            " {} {}:{}:{}\n",
            "-->".cyan().bold(),
            self.span.file,
            self.span.line,
            self.span.column
        ));

        if let Some(snippet) = self.get_source_snippet(source_code) {
            output.push_str(&snippet);
        }

        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }

        if let Some(help) = &self.help {
            output.push_str(&format!(" {} {}\n", "help:".green().bold(), help));
        }

        if let Some(suggestion) = &self.suggestion {
            output.push_str(&format!(
                " {} {}\n",
                "help:".green().bold(),
                suggestion.message
            ));
            if let Some(suggested_snippet) = self.get_suggestion_snippet(source_code) {
                output.push_str(&suggested_snippet);
            }
        }

        output
    }

    fn format_simple(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}[{}]: {}\n",
            self.level,
            self.code,
            self.message.bold()
        ));

        output.push_str(&format!(
            " {} {}:{}:{}\n",
            "-->".cyan().bold(),
            self.span.file,
            self.span.line,
            self.span.column
        ));

        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }

        if let Some(help) = &self.help {
            output.push_str(&format!(" {} {}\n", "help:".green().bold(), help));
        }

        output
    }

    fn get_source_snippet(&self, source_code: &str) -> Option<String> {
        let lines: Vec<&str> = source_code.lines().collect();

        if self.span.line == 0 || self.span.line > lines.len() {
            return None;
        }

        let line_idx = self.span.line - 1;
        let line = lines[line_idx];

        let mut snippet = String::new();
        let line_num_width = self.span.line.to_string().len().max(2);

        snippet.push_str(&format!(" {}\n", " ".repeat(line_num_width + 1).cyan()));
        snippet.push_str(&format!(
            " {} {} {}\n",
            format!("{:>width$}", self.span.line, width = line_num_width)
                .cyan()
                .bold(),
            "|".cyan().bold(),
            line
        ));

        let padding = " ".repeat(line_num_width + 3 + self.span.column - 1);
        let underline = "^".repeat(self.span.length.max(1));
        snippet.push_str(&format!(
            " {} {}{}\n",
            " ".repeat(line_num_width + 1).cyan(),
            padding,
            underline.red().bold()
        ));

        Some(snippet)
    }

    fn get_suggestion_snippet(&self, source_code: &str) -> Option<String> {
        let suggestion = self.suggestion.as_ref()?;
        let lines: Vec<&str> = source_code.lines().collect();

        if suggestion.span.line == 0 || suggestion.span.line > lines.len() {
            return None;
        }

        let line_idx = suggestion.span.line - 1;
        let line = lines[line_idx];

        let mut snippet = String::new();
        let line_num_width = suggestion.span.line.to_string().len().max(2);

        let col = suggestion.span.column - 1;
        let before = &line[..col];
        let after = &line[col + suggestion.span.length..];
        let modified_line = format!("{}{}{}", before, &suggestion.replacement, after);

        snippet.push_str(&format!(
            " {} {}\n",
            format!("{:>width$}", suggestion.span.line, width = line_num_width)
                .cyan()
                .bold(),
            "| ".cyan().bold()
        ));
        snippet.push_str(&format!(
            " {} {}\n",
            " ".repeat(line_num_width + 1).cyan(),
            modified_line
        ));

        let padding = " ".repeat(line_num_width + 3 + col);
        let indicator = "+".repeat(suggestion.replacement.len());
        snippet.push_str(&format!(
            " {} {}{}\n",
            " ".repeat(line_num_width + 1).cyan(),
            padding,
            indicator.green().bold()
        ));

        Some(snippet)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

/// Collects diagnostics for a translation unit and reports them.
#[derive(Debug, Default)]
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
    info_count: usize,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.level {
            ErrorLevel::Error => self.error_count += 1,
            ErrorLevel::Warning => self.warning_count += 1,
            ErrorLevel::Info => self.info_count += 1,
            _ => {}
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn emit_error(&mut self, code: &str, message: String, span: Span) {
        self.emit(Diagnostic::error(code, message, span));
    }

    pub fn emit_warning(&mut self, code: &str, message: String, span: Span) {
        self.emit(Diagnostic::warning(code, message, span));
    }

    pub fn emit_info(&mut self, code: &str, message: String, span: Span) {
        self.emit(Diagnostic::info(code, message, span));
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn info_count(&self) -> usize {
        self.info_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn print_all(&self, source_code: &str) {
        for diag in &self.diagnostics {
            eprintln!("{}", diag.format(source_code));
        }
    }

    pub fn print_summary(&self) {
        if self.error_count > 0 {
            eprintln!(
                "\n{}: {} error{} generated",
                "error".red().bold(),
                self.error_count,
                if self.error_count == 1 { "" } else { "s" }
            );
        }

        if self.warning_count > 0 {
            eprintln!(
                "{}: {} warning{} generated",
                "warning".yellow().bold(),
                self.warning_count,
                if self.warning_count == 1 { "" } else { "s" }
            );
        }

        if self.info_count > 0 {
            eprintln!(
                "{}: {} info message{} emitted",
                "info".blue().bold(),
                self.info_count,
                if self.info_count == 1 { "" } else { "s" }
            );
        }
    }

    /// Exports diagnostics as JSON for IDE/LSP consumers.
    pub fn to_json(&self) -> String {
        let mut json = String::from("{\"diagnostics\":[");

        for (i, diag) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                json.push(',');
            }

            let level_str = match diag.level {
                ErrorLevel::Error => "error",
                ErrorLevel::Warning => "warning",
                ErrorLevel::Info => "info",
                ErrorLevel::Note => "note",
                ErrorLevel::Help => "help",
            };

            json.push_str(&format!(
                "{{\"level\":\"{}\",\"code\":\"{}\",\"message\":\"{}\",\"file\":\"{}\",\"line\":{},\"column\":{},\"length\":{}",
                level_str,
                diag.code,
                diag.message.replace('"', "\\\""),
                diag.span.file,
                diag.span.line,
                diag.span.column,
                diag.span.length
            ));

            if !diag.notes.is_empty() {
                json.push_str(",\"notes\":[");
                for (j, note) in diag.notes.iter().enumerate() {
                    if j > 0 {
                        json.push(',');
                    }
                    json.push_str(&format!("\"{}\"", note.replace('"', "\\\"")));
                }
                json.push(']');
            }

            if let Some(help) = &diag.help {
                json.push_str(&format!(",\"help\":\"{}\"", help.replace('"', "\\\"")));
            }

            json.push('}');
        }

        json.push_str("]}");
        json
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.error_count = 0;
        self.warning_count = 0;
        self.info_count = 0;
    }
}

/// Helpers for the diagnostics this front end raises most often.
impl DiagnosticEngine {
    pub fn type_mismatch(&mut self, expected: &str, found: &str, span: Span) {
        self.emit(
            Diagnostic::error(
                error_codes::TYPE_MISMATCH,
                "mismatched types".to_string(),
                span.clone(),
            )
            .with_note(format!("expected `{}`, found `{}`", expected, found))
            .with_help(format!("try converting `{}` to `{}`", found, expected)),
        );
    }

    pub fn undefined_identifier(&mut self, name: &str, span: Span, suggestions: Vec<String>) {
        let mut diag = Diagnostic::error(
            error_codes::UNDEFINED_IDENTIFIER,
            format!("use of undeclared identifier '{}'", name),
            span,
        );

        if !suggestions.is_empty() {
            diag = diag.with_help(format!("did you mean '{}'?", suggestions.join("', '")));
        }

        self.emit(diag);
    }

    pub fn argument_count_mismatch(
        &mut self,
        fn_name: &str,
        expected: usize,
        found: usize,
        span: Span,
    ) {
        self.emit(
            Diagnostic::error(
                error_codes::ARGUMENT_COUNT,
                format!(
                    "no matching function for call to '{}': expects {} argument{}, {} {} provided",
                    fn_name,
                    expected,
                    if expected == 1 { "" } else { "s" },
                    found,
                    if found == 1 { "was" } else { "were" }
                ),
                span,
            )
            .with_note(format!("'{}' declared here", fn_name)),
        );
    }

    pub fn ambiguous_overload(&mut self, fn_name: &str, candidate_count: usize, span: Span) {
        self.emit(
            Diagnostic::error(
                error_codes::AMBIGUOUS_OVERLOAD,
                format!("call to '{}' is ambiguous", fn_name),
                span,
            )
            .with_note(format!("{} candidates have equal conversion rank", candidate_count)),
        );
    }

    pub fn template_instantiation_cycle(&mut self, template_name: &str, span: Span) {
        self.emit(Diagnostic::error(
            error_codes::TEMPLATE_INSTANTIATION_CYCLE,
            format!(
                "recursive template instantiation of '{}' exceeds the allowed depth",
                template_name
            ),
            span,
        ));
    }

    pub fn constexpr_overflow(&mut self, expression: &str, span: Span) {
        self.emit(Diagnostic::error(
            error_codes::CONSTEXPR_OVERFLOW,
            format!(
                "constant expression '{}' overflows the result type",
                expression
            ),
            span,
        ));
    }

    pub fn odr_violation(&mut self, symbol_name: &str, span: Span) {
        self.emit(Diagnostic::error(
            error_codes::ODR_VIOLATION,
            format!("redefinition of '{}'", symbol_name),
            span,
        ));
    }

    pub fn access_denied(&mut self, member_name: &str, access: &str, span: Span) {
        self.emit(Diagnostic::error(
            error_codes::ACCESS_DENIED,
            format!("'{}' is a {} member of this class", member_name, access),
            span,
        ));
    }

    pub fn unused_variable(&mut self, name: &str, span: Span) {
        self.emit(
            Diagnostic::warning(
                error_codes::UNUSED_VARIABLE,
                format!("unused variable '{}'", name),
                span.clone(),
            )
            .with_suggestion(
                "if this is intentional, prefix with an underscore".to_string(),
                format!("_{}", name),
                span,
            ),
        );
    }

    pub fn type_inferred(&mut self, var_name: &str, inferred_type: &str, span: Span) {
        self.emit(Diagnostic::info(
            error_codes::TYPE_INFERENCE,
            format!("'{}' deduced as '{}'", var_name, inferred_type),
            span,
        ));
    }
}

/// Error codes for the C++ front end's diagnostics.
pub mod error_codes {
    // Syntax errors
    pub const SYNTAX_ERROR: &str = "C0001";
    pub const UNEXPECTED_TOKEN: &str = "C0002";
    pub const UNEXPECTED_EOF: &str = "C0003";
    pub const INVALID_LITERAL: &str = "C0004";

    // Type errors
    pub const TYPE_MISMATCH: &str = "C0100";
    pub const UNDEFINED_TYPE: &str = "C0101";
    pub const INVALID_CAST: &str = "C0102";
    pub const NOT_A_TYPE_TRAIT_CANDIDATE: &str = "C0103";

    // Name resolution errors
    pub const UNDEFINED_IDENTIFIER: &str = "C0200";
    pub const AMBIGUOUS_NAME: &str = "C0201";
    pub const ODR_VIOLATION: &str = "C0202";

    // Overload resolution errors
    pub const ARGUMENT_COUNT: &str = "C0300";
    pub const AMBIGUOUS_OVERLOAD: &str = "C0301";
    pub const NO_VIABLE_OVERLOAD: &str = "C0302";

    // Access control errors
    pub const ACCESS_DENIED: &str = "C0400";

    // Template errors
    pub const TEMPLATE_INSTANTIATION_CYCLE: &str = "C0500";
    pub const TEMPLATE_ARGUMENT_MISMATCH: &str = "C0501";
    pub const CONCEPT_NOT_SATISFIED: &str = "C0502";

    // Constant-expression errors
    pub const CONSTEXPR_OVERFLOW: &str = "C0600";
    pub const CONSTEXPR_NOT_CONSTANT: &str = "C0601";
    pub const CONSTEXPR_STEP_LIMIT: &str = "C0602";

    // Warnings
    pub const UNUSED_VARIABLE: &str = "W0001";
    pub const UNREACHABLE_CODE: &str = "W0002";
    pub const DEPRECATED: &str = "W0003";

    // Info messages
    pub const TYPE_INFERENCE: &str = "I0001";
    pub const TEMPLATE_INSTANTIATION: &str = "I0002";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_a_type_mismatch_with_note_and_help() {
        let source = "int main() {\n    int x = add(42, \"hello\");\n    return 0;\n}";

        let span = Span::new("main.cpp".to_string(), 2, 21, 7);
        let diag = Diagnostic::error(
            error_codes::TYPE_MISMATCH,
            "mismatched types".to_string(),
            span.clone(),
        )
        .with_note("expected 'int', found 'const char*'".to_string())
        .with_help("try converting the string to an integer".to_string());

        let formatted = diag.format(source);

        assert!(formatted.contains("error[C0100]"));
        assert!(formatted.contains("mismatched types"));
        assert!(formatted.contains("main.cpp:2:21"));
    }

    #[test]
    fn engine_tracks_error_and_warning_counts_separately() {
        let mut engine = DiagnosticEngine::new();
        engine.type_mismatch("int", "double", Span::unknown());
        engine.unused_variable("count", Span::unknown());

        assert_eq!(engine.error_count(), 1);
        assert_eq!(engine.warning_count(), 1);
        assert!(engine.has_errors());
    }

    #[test]
    fn to_json_escapes_embedded_quotes() {
        let mut engine = DiagnosticEngine::new();
        engine.emit(Diagnostic::error(
            "C0001",
            "unexpected token \"foo\"".to_string(),
            Span::unknown(),
        ));

        let json = engine.to_json();
        assert!(json.contains("unexpected token \\\"foo\\\""));
    }
}

/// Fuzzy matching for "did you mean?" suggestions over identifiers in scope.
pub mod fuzzy {
    use strsim::jaro_winkler;

    pub fn find_similar_names(
        target: &str,
        candidates: &[String],
        threshold: f64,
        max_suggestions: usize,
    ) -> Vec<String> {
        let mut scored: Vec<(String, f64)> = candidates
            .iter()
            .map(|candidate| {
                let similarity = jaro_winkler(target, candidate);
                (candidate.clone(), similarity)
            })
            .filter(|(_, score)| *score > threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

        scored
            .into_iter()
            .take(max_suggestions)
            .map(|(name, _)| name)
            .collect()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn finds_a_near_miss_identifier() {
            let candidates = vec!["count".to_string(), "length".to_string(), "size".to_string()];
            let matches = find_similar_names("coutn", &candidates, 0.7, 3);
            assert_eq!(matches.first().map(String::as_str), Some("count"));
        }
    }
}
