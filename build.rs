use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding this crate's own Rust sources.
const SOURCE_DIRS: [&str; 4] = ["analysis", "cli", "tests", "benches"];

// Collects every matching line of one file so the error lists them all.
struct ViolationCollector {
    violations: Vec<String>,
    file_path: PathBuf,
    kind: ViolationKind,
}

#[derive(Clone, Copy)]
enum ViolationKind {
    UnderscorePrefix,
    ForbiddenWord,
    StarsInComment,
    UppercaseComment,
    AllowDeadCode,
}

impl ViolationKind {
    fn headline(self) -> &'static str {
        match self {
            ViolationKind::UnderscorePrefix => "underscore-prefixed identifiers",
            ViolationKind::ForbiddenWord => "forbidden comment words",
            ViolationKind::StarsInComment => "'**' patterns in regular comments",
            ViolationKind::UppercaseComment => "comments with all uppercase alphabetic characters",
            ViolationKind::AllowDeadCode => "#[allow(dead_code)] attributes",
        }
    }

    fn advice(self) -> &'static str {
        match self {
            ViolationKind::UnderscorePrefix => {
                "Underscore-prefixed names are not allowed. Use the binding or remove it."
            }
            ViolationKind::ForbiddenWord => {
                "Comments narrating edits (fixed, changed, updated and so on, in capitals) are not allowed."
            }
            ViolationKind::StarsInComment => {
                "The '**' pattern is allowed in doc comments only."
            }
            ViolationKind::UppercaseComment => "Shouting comments are not allowed.",
            ViolationKind::AllowDeadCode => {
                "Either use the code or remove it; silencing the lint is not allowed."
            }
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            ViolationKind::UnderscorePrefix => r"\b(_[a-zA-Z0-9_]+)\b",
            ViolationKind::ForbiddenWord => {
                r"(//|/\*).*(?:FIXED|CORRECTED|FIX|FIXES|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE)"
            }
            ViolationKind::StarsInComment => r"(//|/\*).*\*\*",
            ViolationKind::UppercaseComment => r"(//|/\*).*",
            ViolationKind::AllowDeadCode => r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        }
    }
}

impl ViolationCollector {
    fn new(file_path: &Path, kind: ViolationKind) -> Self {
        Self {
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
            kind,
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let file_name = self.file_path.to_str().unwrap_or("?");
        let mut error_msg = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            self.kind.headline(),
            file_name
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        error_msg.push_str(&format!("\n⚠️ {}\n", self.kind.advice()));
        Some(error_msg)
    }

    // Decides whether a matched line is a real violation of this collector's rule.
    fn is_violation(&self, line_text: &str) -> bool {
        let trimmed = line_text.trim_start();
        let is_comment = trimmed.starts_with("//");
        match self.kind {
            ViolationKind::UnderscorePrefix => !is_comment && !underscore_only_in_strings(line_text),
            ViolationKind::ForbiddenWord | ViolationKind::AllowDeadCode => true,
            ViolationKind::StarsInComment => !is_doc_comment(line_text),
            ViolationKind::UppercaseComment => {
                if !is_comment {
                    return false;
                }
                let comment_text = trimmed.trim_start_matches('/').trim_start_matches('!');
                let alpha_chars: Vec<char> =
                    comment_text.chars().filter(|c| c.is_alphabetic()).collect();
                !alpha_chars.is_empty() && alpha_chars.iter().all(|c| c.is_uppercase())
            }
        }
    }
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        if self.is_violation(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn is_doc_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("///") || trimmed.starts_with("//!")
}

// True when every underscore-prefixed token sits between double quotes.
fn underscore_only_in_strings(line: &str) -> bool {
    line.contains('"')
        && line
            .split('"')
            .enumerate()
            .any(|(i, part)| i % 2 == 1 && part.contains('_'))
}

fn source_files() -> Vec<PathBuf> {
    SOURCE_DIRS
        .iter()
        .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn scan(kind: ViolationKind, files: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(kind.pattern())?;
    let mut searcher = Searcher::new();

    for path in files {
        let mut collector = ViolationCollector::new(path, kind);
        searcher.search_path(&matcher, path, &mut collector)?;
        if let Some(error_message) = collector.check_and_get_error_message() {
            return Err(error_message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    let files = source_files();
    for kind in [
        ViolationKind::UnderscorePrefix,
        ViolationKind::ForbiddenWord,
        ViolationKind::StarsInComment,
        ViolationKind::UppercaseComment,
        ViolationKind::AllowDeadCode,
    ] {
        if let Err(e) = scan(kind, &files) {
            // Printed to stderr so cargo shows it alongside the failed build.
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
