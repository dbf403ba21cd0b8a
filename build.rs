use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Only the crate's own sources are held to the policy.
const SOURCE_ROOTS: [&str; 3] = ["adjust", "tests", "benches"];

// Collects every offending line of a single file so the build error lists them all.
struct ViolationCollector {
    violations: Vec<String>,
    file_path: PathBuf,
    rule: &'static str,
    remedy: &'static str,
    skip_comments_and_strings: bool,
}

impl ViolationCollector {
    fn new(
        file_path: &Path,
        rule: &'static str,
        remedy: &'static str,
        skip_comments_and_strings: bool,
    ) -> Self {
        Self {
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
            rule,
            remedy,
            skip_comments_and_strings,
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let mut error_msg = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            self.rule,
            self.file_path.display()
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        error_msg.push_str(&format!("\n⚠️ {}\n", self.remedy));
        Some(error_msg)
    }
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        if self.skip_comments_and_strings {
            let is_pure_comment = line_text.trim_start().starts_with("//");
            // An odd-indexed piece between quote characters is string content.
            let is_in_string = line_text
                .split('"')
                .enumerate()
                .any(|(i, part)| i % 2 == 1 && part.contains('_'));
            if is_pure_comment || is_in_string {
                return Ok(true);
            }
        }

        self.violations.push(format!("{line_number}:{line_text}"));
        Ok(true)
    }
}

// Flags comment lines whose alphabetic characters are all uppercase.
struct UppercaseCommentCollector {
    violations: Vec<String>,
}

impl Sink for UppercaseCommentCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        let trimmed = line_text.trim_start();

        let comment_text = if let Some(rest) = trimmed.strip_prefix("///") {
            rest
        } else if let Some(rest) = trimmed.strip_prefix("//") {
            rest
        } else {
            return Ok(true);
        };

        let mut letters = comment_text.chars().filter(|c| c.is_alphabetic()).peekable();
        if letters.peek().is_some() && letters.all(|c| c.is_uppercase()) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    let checks: [(&str, fn() -> Result<(), Box<dyn Error>>); 4] = [
        ("underscore-prefixed bindings", scan_for_underscore_prefixes),
        ("forbidden comment patterns", scan_for_forbidden_comment_patterns),
        ("all-caps comments", scan_for_uppercase_comments),
        ("dead-code allowances", scan_for_allow_dead_code),
    ];
    for (name, check) in checks {
        if let Err(e) = check() {
            // eprintln! is what surfaces the message in cargo's output.
            eprintln!("{e}");
            eprintln!("Code policy check failed: {name}.");
            std::process::exit(1);
        }
    }
}

fn rust_sources() -> impl Iterator<Item = PathBuf> {
    SOURCE_ROOTS.into_iter().flat_map(|root| {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
            .map(|e| e.into_path())
    })
}

fn scan_with(
    pattern: &str,
    rule: &'static str,
    remedy: &'static str,
    skip_comments_and_strings: bool,
) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(pattern)?;
    let mut searcher = Searcher::new();

    for path in rust_sources() {
        let mut collector = ViolationCollector::new(&path, rule, remedy, skip_comments_and_strings);
        searcher.search_path(&matcher, &path, &mut collector)?;
        if let Some(error_message) = collector.check_and_get_error_message() {
            return Err(error_message.into());
        }
    }
    Ok(())
}

fn scan_for_underscore_prefixes() -> Result<(), Box<dyn Error>> {
    scan_with(
        r"\b(_[a-zA-Z0-9_]+)\b",
        "underscore-prefixed variable names",
        "Underscore prefixes are not allowed. Either use the variable or remove it completely.",
        true,
    )
}

fn scan_for_forbidden_comment_patterns() -> Result<(), Box<dyn Error>> {
    scan_with(
        r"(//|/\*).*(?:FIXED|CORRECTED|FIX|FIXES|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE)",
        "changelog-style comments",
        "Comments describe the code as it is, not the history of edits to it.",
        false,
    )?;
    scan_with(
        r"^\s*//[^/].*\*\*",
        "bold markers in plain comments",
        "Markdown emphasis belongs in doc comments only.",
        false,
    )
}

fn scan_for_uppercase_comments() -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(r"//")?;
    let mut searcher = Searcher::new();

    for path in rust_sources() {
        let mut collector = UppercaseCommentCollector {
            violations: Vec::new(),
        };
        searcher.search_path(&matcher, &path, &mut collector)?;
        if !collector.violations.is_empty() {
            return Err(format!(
                "\n❌ ERROR: Found all-caps comments in {}:\n   {}\n",
                path.display(),
                collector.violations.join("\n   ")
            )
            .into());
        }
    }
    Ok(())
}

fn scan_for_allow_dead_code() -> Result<(), Box<dyn Error>> {
    scan_with(
        r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        "#[allow(dead_code)] attributes",
        "Either use the code (removing the attribute) or remove it completely.",
        false,
    )
}
