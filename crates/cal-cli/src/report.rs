//! Human-readable reports on stderr.

use owo_colors::OwoColorize;

/// One problem anchored at a 1-based line and column.
pub struct Problem<'a> {
    pub kind: &'a str,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

pub fn render_problem(path: &str, source: &str, problem: &Problem) {
    eprintln!("{}: {}", problem.kind.red().bold(), problem.message.red());
    eprintln!("  --> {}:{}:{}", path, problem.line, problem.column);
    if let Some(src_line) = problem.line.checked_sub(1).and_then(|i| source.lines().nth(i)) {
        let gutter = format!("{:4} | ", problem.line);
        eprintln!("     |");
        eprintln!("{}{}", gutter.bright_black(), src_line);
        let marker = format!("{}^", " ".repeat(gutter.len() + problem.column.saturating_sub(1)));
        eprintln!("{}", marker.red());
    }
}

/// Problems without a position, like clean-exit violations.
pub fn render_note(kind: &str, path: &str, message: &str) {
    eprintln!("{}: {}", kind.yellow().bold(), message);
    eprintln!("  --> {}", path);
}

pub fn render_summary(files: usize, problems: usize) {
    if problems == 0 {
        eprintln!("{} {} file(s), no problems", "ok:".green().bold(), files);
    } else {
        eprintln!("{} {} problem(s) in {} file(s)", "failed:".red().bold(), problems, files);
    }
}
