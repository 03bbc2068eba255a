use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding this crate's own Rust sources.
const SOURCE_DIRS: [&str; 4] = ["dca", "cli", "tests", "benches"];

// Which kind of line a collector keeps.
#[derive(Clone, Copy)]
enum Rule {
    UnderscorePrefix,
    ForbiddenWord,
    DoubleStar,
    AllCaps,
    AllowDeadCode,
}

impl Rule {
    fn describe(self) -> &'static str {
        match self {
            Rule::UnderscorePrefix => {
                "Underscore-prefixed names are not allowed. Use the binding or remove it."
            }
            Rule::ForbiddenWord => {
                "Comments must not carry edit markers such as 'FIX', 'NEW', 'CHANGED' or 'UPDATED'."
            }
            Rule::DoubleStar => "The '**' pattern is only allowed in doc comments.",
            Rule::AllCaps => "Comments written entirely in uppercase are not allowed.",
            Rule::AllowDeadCode => "#[allow(dead_code)] is not allowed. Use the item or delete it.",
        }
    }
}

struct Collector {
    rule: Rule,
    file_path: PathBuf,
    violations: Vec<String>,
}

impl Collector {
    fn new(rule: Rule, file_path: &Path) -> Self {
        Self {
            rule,
            file_path: file_path.to_path_buf(),
            violations: Vec::new(),
        }
    }

    fn keeps(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        match self.rule {
            Rule::UnderscorePrefix => !(trimmed.starts_with("//") || in_string_literal(line)),
            Rule::ForbiddenWord | Rule::AllowDeadCode => true,
            Rule::DoubleStar => !trimmed.starts_with("///"),
            Rule::AllCaps => comment_body(line).is_some_and(|body| {
                let mut letters = body.chars().filter(|c| c.is_alphabetic()).peekable();
                letters.peek().is_some() && letters.all(char::is_uppercase)
            }),
        }
    }

    fn into_error(self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }
        let mut message = format!(
            "\n❌ ERROR: {} lint violation(s) in {}:\n",
            self.violations.len(),
            self.file_path.display()
        );
        for violation in &self.violations {
            message.push_str(&format!("   {violation}\n"));
        }
        message.push_str(&format!("\n⚠️ {}\n", self.rule.describe()));
        Some(message)
    }
}

impl Sink for Collector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if self.keeps(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

// True when some quoted segment of the line holds an underscore.
fn in_string_literal(line: &str) -> bool {
    line.split('"')
        .enumerate()
        .any(|(i, part)| i % 2 == 1 && part.contains('_'))
}

fn comment_body(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix("///") {
        return Some(rest.trim());
    }
    if let Some(rest) = trimmed.strip_prefix("//") {
        return Some(rest.trim());
    }
    let start = line.find("/*")? + 2;
    let rest = &line[start..];
    Some(rest.find("*/").map_or(rest, |end| &rest[..end]).trim())
}

fn source_files() -> Vec<PathBuf> {
    SOURCE_DIRS
        .iter()
        .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn scan(rule: Rule, pattern: &str, files: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(pattern)?;
    let mut searcher = Searcher::new();
    for path in files {
        let mut collector = Collector::new(rule, path);
        searcher.search_path(&matcher, path, &mut collector)?;
        if let Some(message) = collector.into_error() {
            return Err(message.into());
        }
    }
    Ok(())
}

fn run_lints() -> Result<(), Box<dyn Error>> {
    let files = source_files();
    let mut with_build_script = files.clone();
    with_build_script.push(PathBuf::from("build.rs"));

    scan(
        Rule::UnderscorePrefix,
        r"\b(_[a-zA-Z0-9_]+)\b",
        &with_build_script,
    )?;
    scan(
        Rule::ForbiddenWord,
        r"(//|/\*).*(?:FIXED|CORRECTED|FIX|FIXES|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE)",
        &files,
    )?;
    scan(Rule::DoubleStar, r"(//|/\*).*\*\*", &files)?;
    scan(Rule::AllCaps, r"(//|/\*).*", &files)?;
    scan(
        Rule::AllowDeadCode,
        r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        &files,
    )?;
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    if let Err(e) = run_lints() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
