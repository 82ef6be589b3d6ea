//! Text formatting helpers for log and error output.

/// Indent every line of `text` by `level` levels of four spaces
pub fn indent_lines(text: &str, level: usize) -> String {
    let pad = "    ".repeat(level);
    text.lines()
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format the result of running a command for logging
pub fn format_command_result(
    message: &str,
    command: &str,
    status: i32,
    stdout: &str,
    stderr: &str,
) -> String {
    let mut lines = vec![
        message.to_string(),
        format!("CMD: {}", command),
        format!("STATUS: {}", status),
        "STDOUT:".to_string(),
    ];
    if !stdout.is_empty() {
        lines.push(indent_lines(stdout, 1));
    }
    lines.push("STDERR:".to_string());
    if !stderr.is_empty() {
        lines.push(indent_lines(stderr, 1));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indent_lines() {
        assert_eq!(indent_lines("a\nb", 1), "    a\n    b");
        assert_eq!(indent_lines("a", 2), "        a");
        assert_eq!(indent_lines("", 1), "");
    }

    #[test]
    fn test_format_command_result() {
        let text = format_command_result("Ran command.", "echo hi", 0, "hi\n", "");
        assert_eq!(text, "Ran command.\nCMD: echo hi\nSTATUS: 0\nSTDOUT:\n    hi\nSTDERR:");
    }
}
