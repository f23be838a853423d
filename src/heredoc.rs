//! Heredoc fragment extraction for shell scripts.
//!
//! A script is split into an ordered list of fragments: shell text, and the
//! payload of every heredoc fed to one chosen command (e.g. `bteq <<EOF`).
//! The scanner runs a two-state machine over lines:
//!
//! - `Shell`: comments after `#` are ignored for matching; a line opening a
//!   heredoc for the command closes the current shell fragment (opening line
//!   included) and switches to `Heredoc`.
//! - `Heredoc`: a line equal to the terminator (quoted or unquoted form)
//!   closes the heredoc fragment; the terminator line starts the next shell
//!   fragment.
use log::debug;
use regex::Regex;

use crate::error::{PrepError, PrepResult};
use crate::warnings::{WarningKind, WarningLog};

const PATTERN_PREFIX: &str = r"(?:\s*|/)?";
const PATTERN_SUFFIX: &str = r"\s*[^<]*<<[-#]?\s*([^\s><]+)";

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FragmentKind {
    Shell,
    Heredoc,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ShellFragment {
    /// Lines of the fragment, each terminated by `\n`.
    pub text: String,
    /// Zero-based line where the fragment begins.
    pub start_line: usize,
    pub kind: FragmentKind,
    /// The terminator was quoted, so the payload is not parameter-expanded.
    pub quoted: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum ScanState {
    Shell,
    Heredoc,
}

#[derive(Debug)]
pub struct HeredocExtractor {
    pattern: Regex,
    replace: Option<(String, String)>,
    warnings: WarningLog,
}

impl HeredocExtractor {
    /// Build an extractor for heredocs fed to `command`.
    ///
    /// `command` is spliced into the opening-line pattern as a regular
    /// expression, so it must not introduce capture groups of its own.
    pub fn new(command: &str) -> PrepResult<Self> {
        Self::with_replacement(command, None)
    }

    /// Like [`HeredocExtractor::new`], additionally rewriting the first
    /// occurrence of `from` to `to` on every heredoc-opening line.
    pub fn with_replacement(command: &str, replace: Option<(String, String)>) -> PrepResult<Self> {
        let source = format!("{PATTERN_PREFIX}{command}{PATTERN_SUFFIX}");
        let pattern = Regex::new(&source).map_err(|err| PrepError::Regex {
            pattern: source.clone(),
            source: err,
        })?;
        let groups = pattern.captures_len() - 1;
        debug!("heredoc event=pattern source={} groups={}", source, groups);
        if groups != 1 {
            return Err(PrepError::InvalidPattern {
                pattern: source,
                groups,
            });
        }
        Ok(Self {
            pattern,
            replace,
            warnings: WarningLog::new(),
        })
    }

    pub fn read_fragments(&self, input: &str) -> Vec<ShellFragment> {
        let mut out = Vec::new();
        let mut buf = String::new();
        let mut state = ScanState::Shell;
        let mut terminator: Option<String> = None;
        let mut unquoted: Option<String> = None;
        let mut start_line = 0;

        for (line_number, line) in input.lines().enumerate() {
            match state {
                ScanState::Shell => {
                    let non_comment = line.split('#').next().unwrap_or_default();
                    let Some(caps) = self.pattern.captures(non_comment) else {
                        push_line(&mut buf, line);
                        continue;
                    };
                    let marker = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                    debug!(
                        "heredoc event=open line={} terminator={}",
                        line_number, marker
                    );
                    unquoted = Some(strip_quotes(marker).to_string());
                    terminator = Some(marker.to_string());
                    push_line(&mut buf, &self.replace_command(line));
                    flush(&mut out, &mut buf, start_line, FragmentKind::Shell, false);
                    state = ScanState::Heredoc;
                    start_line = line_number + 1;
                }
                ScanState::Heredoc => {
                    let closes = terminator.as_deref() == Some(line)
                        || unquoted.as_deref() == Some(line);
                    if !closes {
                        push_line(&mut buf, line);
                        continue;
                    }
                    debug!("heredoc event=close line={}", line_number);
                    let quoted = is_quoted(terminator.as_deref());
                    flush(&mut out, &mut buf, start_line, FragmentKind::Heredoc, quoted);
                    terminator = None;
                    unquoted = None;
                    state = ScanState::Shell;
                    start_line = line_number;
                    push_line(&mut buf, line);
                }
            }
        }

        match state {
            ScanState::Shell => {
                flush(&mut out, &mut buf, start_line, FragmentKind::Shell, false);
            }
            ScanState::Heredoc => {
                self.warnings.warn(
                    WarningKind::UnterminatedHeredoc,
                    format!(
                        "Here-document starting at line {} terminates at end of input (expected '{}').",
                        start_line,
                        terminator.as_deref().unwrap_or_default()
                    ),
                );
                let quoted = is_quoted(terminator.as_deref());
                flush(&mut out, &mut buf, start_line, FragmentKind::Heredoc, quoted);
            }
        }
        out
    }

    /// Every warning this extractor has emitted, oldest first.
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.messages()
    }

    fn replace_command(&self, line: &str) -> String {
        match &self.replace {
            Some((from, to)) => line.replacen(from.as_str(), to, 1),
            None => line.to_string(),
        }
    }
}

/// Heredoc payloads in input order.
pub fn filter_heredoc_texts(fragments: &[ShellFragment]) -> Vec<String> {
    fragments
        .iter()
        .filter(|fragment| fragment.kind == FragmentKind::Heredoc)
        .map(|fragment| fragment.text.clone())
        .collect()
}

fn push_line(buf: &mut String, line: &str) {
    buf.push_str(line);
    buf.push('\n');
}

fn flush(
    out: &mut Vec<ShellFragment>,
    buf: &mut String,
    start_line: usize,
    kind: FragmentKind,
    quoted: bool,
) {
    if buf.is_empty() {
        return;
    }
    out.push(ShellFragment {
        text: std::mem::take(buf),
        start_line,
        kind,
        quoted,
    });
}

fn is_quoted(terminator: Option<&str>) -> bool {
    matches!(terminator.and_then(|t| t.chars().next()), Some('\'') | Some('"'))
}

/// Drop the first character when it is a quote, and the last character
/// with it. A lone quote leaves the empty string.
fn strip_quotes(input: &str) -> &str {
    let Some(rest) = input.strip_prefix(|c: char| c == '\'' || c == '"') else {
        return input;
    };
    match rest.char_indices().next_back() {
        Some((last, _)) => &rest[..last],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bteq() -> HeredocExtractor {
        HeredocExtractor::new("bteq").unwrap()
    }

    #[test]
    fn single_heredoc() {
        let fragments = bteq().read_fragments("bteq <<EOF\nSELECT 1;\nEOF\n");
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].kind, FragmentKind::Shell);
        assert_eq!(fragments[0].text, "bteq <<EOF\n");
        assert_eq!(fragments[1].kind, FragmentKind::Heredoc);
        assert_eq!(fragments[1].text, "SELECT 1;\n");
        assert_eq!(fragments[1].start_line, 1);
        assert!(!fragments[1].quoted);
        assert_eq!(fragments[2].text, "EOF\n");
        assert_eq!(fragments[2].start_line, 2);
        assert_eq!(filter_heredoc_texts(&fragments), vec!["SELECT 1;\n"]);
    }

    #[test]
    fn no_heredoc_yields_no_texts() {
        let fragments = bteq().read_fragments("#!/bin/ksh\necho hello\n");
        assert_eq!(fragments.len(), 1);
        assert!(filter_heredoc_texts(&fragments).is_empty());
    }

    #[test]
    fn empty_input_has_no_fragments() {
        assert!(bteq().read_fragments("").is_empty());
    }

    #[test]
    fn quoted_terminator_matches_unquoted_line() {
        let input = "bteq <<'SQL'\nselect '$x';\nSQL\necho done\n";
        let fragments = bteq().read_fragments(input);
        let heredoc: Vec<_> = fragments
            .iter()
            .filter(|f| f.kind == FragmentKind::Heredoc)
            .collect();
        assert_eq!(heredoc.len(), 1);
        assert!(heredoc[0].quoted);
        assert_eq!(heredoc[0].text, "select '$x';\n");
        assert_eq!(fragments.last().unwrap().text, "SQL\necho done\n");
    }

    #[test]
    fn commented_command_is_ignored() {
        let input = "# bteq <<EOF\necho x # bteq <<EOF\nbteq <<EOF # run it\nselect 1\nEOF\n";
        let fragments = bteq().read_fragments(input);
        assert_eq!(filter_heredoc_texts(&fragments), vec!["select 1\n"]);
        assert_eq!(fragments[0].start_line, 0);
        assert_eq!(fragments[1].start_line, 3);
    }

    #[test]
    fn path_prefixed_command_and_flags() {
        let input = "/usr/bin/bteq -c UTF8 <<-EOF >> log.txt\n.LOGON x;\nEOF\n";
        let fragments = bteq().read_fragments(input);
        assert_eq!(filter_heredoc_texts(&fragments), vec![".LOGON x;\n"]);
    }

    #[test]
    fn multiple_heredocs_keep_order_and_lines() {
        let input = "bteq <<A\none\nA\necho mid\nbteq <<B\ntwo\nthree\nB\n";
        let fragments = bteq().read_fragments(input);
        let kinds: Vec<_> = fragments.iter().map(|f| (f.kind, f.start_line)).collect();
        assert_eq!(
            kinds,
            vec![
                (FragmentKind::Shell, 0),
                (FragmentKind::Heredoc, 1),
                (FragmentKind::Shell, 2),
                (FragmentKind::Heredoc, 5),
                (FragmentKind::Shell, 7),
            ]
        );
        assert_eq!(filter_heredoc_texts(&fragments), vec!["one\n", "two\nthree\n"]);
    }

    #[test]
    fn empty_heredoc_emits_no_fragment() {
        let fragments = bteq().read_fragments("bteq <<EOF\nEOF\n");
        assert!(filter_heredoc_texts(&fragments).is_empty());
        assert_eq!(fragments.len(), 2);
    }

    #[test]
    fn unterminated_heredoc_warns_and_flushes() {
        let extractor = bteq();
        let fragments = extractor.read_fragments("bteq <<EOF\nselect 1;\nselect 2;\n");
        assert_eq!(
            filter_heredoc_texts(&fragments),
            vec!["select 1;\nselect 2;\n"]
        );
        let warnings = extractor.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("terminates at end of input"));
    }

    #[test]
    fn other_commands_are_shell_text() {
        let fragments = bteq().read_fragments("cat <<EOF\nhello\nEOF\n");
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].kind, FragmentKind::Shell);
    }

    #[test]
    fn replacement_applies_to_opening_line_only() {
        let extractor = HeredocExtractor::with_replacement(
            "bteq",
            Some(("bteq".to_string(), "bq".to_string())),
        )
        .unwrap();
        let fragments = extractor.read_fragments("bteq <<EOF\nbteq\nEOF\n");
        assert_eq!(fragments[0].text, "bq <<EOF\n");
        assert_eq!(fragments[1].text, "bteq\n");
    }

    #[test]
    fn extra_capture_group_is_rejected() {
        let err = HeredocExtractor::new("foo(bar)baz").unwrap_err();
        assert!(matches!(err, PrepError::InvalidPattern { groups: 2, .. }));
    }

    #[test]
    fn non_capturing_groups_are_fine() {
        assert!(HeredocExtractor::new("(?:bteq|BTEQ)").is_ok());
    }

    #[test]
    fn quote_stripping_is_char_based() {
        assert_eq!(strip_quotes("'EOF'"), "EOF");
        assert_eq!(strip_quotes("\"ÉOF\""), "ÉOF");
        assert_eq!(strip_quotes("'EOFé"), "EOF");
        assert_eq!(strip_quotes("'"), "");
        assert_eq!(strip_quotes("EOF"), "EOF");
    }

    #[test]
    fn unbalanced_quote_with_non_ascii_terminator() {
        let input = "bteq <<'EOFé\nselect 1;\n'EOFé\necho ok\n";
        let fragments = bteq().read_fragments(input);
        assert_eq!(filter_heredoc_texts(&fragments), vec!["select 1;\n"]);
        assert!(fragments[1].quoted);
        assert_eq!(fragments[2].text, "'EOFé\necho ok\n");
    }

    #[test]
    fn lone_quote_terminator_closes_on_empty_line() {
        let fragments = bteq().read_fragments("bteq <<'\nselect 1;\n\necho ok\n");
        assert_eq!(filter_heredoc_texts(&fragments), vec!["select 1;\n"]);
        assert_eq!(fragments[2].text, "\necho ok\n");
    }

    #[test]
    fn non_ascii_payload_and_terminator() {
        let input = "bteq <<ÉOF\nselect 'grüße' from t;\nÉOF\n";
        let fragments = bteq().read_fragments(input);
        assert_eq!(
            filter_heredoc_texts(&fragments),
            vec!["select 'grüße' from t;\n"]
        );
        assert_eq!(fragments[2].start_line, 2);
    }

    #[test]
    fn crlf_input_is_normalised() {
        let extractor = bteq();
        let fragments = extractor.read_fragments("bteq <<EOF\r\nSELECT 1;\r\nEOF\r\necho ok\r\n");
        assert_eq!(filter_heredoc_texts(&fragments), vec!["SELECT 1;\n"]);
        assert_eq!(fragments[2].text, "EOF\necho ok\n");
        assert!(extractor.warnings().is_empty());
    }

    #[test]
    fn last_line_without_newline() {
        let extractor = bteq();
        let fragments = extractor.read_fragments("bteq <<EOF\nSELECT 1;\nEOF");
        assert_eq!(filter_heredoc_texts(&fragments), vec!["SELECT 1;\n"]);
        assert_eq!(fragments[2].text, "EOF\n");
        assert!(extractor.warnings().is_empty());

        let fragments = extractor.read_fragments("bteq <<EOF\nSELECT 1;");
        assert_eq!(filter_heredoc_texts(&fragments), vec!["SELECT 1;\n"]);
        assert_eq!(extractor.warnings().len(), 1);
    }

    fn script_line() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("bteq <<EOF".to_string()),
            Just("bteq <<'ÉOF'".to_string()),
            Just("bteq <<\"EOFé".to_string()),
            Just("EOF".to_string()),
            Just("ÉOF".to_string()),
            Just("EOFé".to_string()),
            Just("echo hi # bteq <<EOF".to_string()),
            "[^\r\n]{0,16}",
        ]
    }

    proptest! {
        #[test]
        fn line_endings_are_normalised(
            lines in proptest::collection::vec((script_line(), any::<bool>()), 1..16),
            trim_last in any::<bool>(),
        ) {
            let mut input = String::new();
            let mut expected = String::new();
            for (line, crlf) in &lines {
                input.push_str(line);
                input.push_str(if *crlf { "\r\n" } else { "\n" });
                expected.push_str(line);
                expected.push('\n');
            }
            let last_is_text = lines.last().map_or(false, |(line, _)| !line.is_empty());
            if trim_last && last_is_text {
                let cut = input.trim_end_matches(|c: char| c == '\r' || c == '\n').len();
                input.truncate(cut);
            }
            let fragments = bteq().read_fragments(&input);
            let rebuilt: String = fragments.iter().map(|f| f.text.as_str()).collect();
            prop_assert_eq!(rebuilt, expected);
        }

        #[test]
        fn fragments_reconstruct_input(lines in proptest::collection::vec(script_line(), 0..24)) {
            let mut input = String::new();
            for line in &lines {
                input.push_str(line);
                input.push('\n');
            }
            let fragments = bteq().read_fragments(&input);
            let rebuilt: String = fragments.iter().map(|f| f.text.as_str()).collect();
            prop_assert_eq!(rebuilt, input);
            for pair in fragments.windows(2) {
                prop_assert!(pair[0].start_line < pair[1].start_line);
            }
        }
    }
}
