use std::path::{Path, PathBuf};
use std::process::Command;

const MAX_LINES: usize = 750;

const CHECKED_EXTENSIONS: &[&str] = &["rs", "toml"];

const EXCLUDED_DIRS: &[&str] = &["target", ".git", "examples"];

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/main");

    let sha = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout)
                    .ok()
                    .map(|s| s.trim().to_string())
            } else {
                None
            }
        })
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=ACTIVE_SESSIONS_GIT_SHA={}", sha);

    let files = collect_source_files();
    enforce_line_limits(&files);
    enforce_no_test_skips(&files);
    enforce_serial_for_env_mutations(&files);
}

fn manifest_root() -> PathBuf {
    PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set"))
}

fn collect_source_files() -> Vec<PathBuf> {
    let mut files = Vec::new();
    walk_directory(&manifest_root().join("src"), &mut files);
    for file in &files {
        println!("cargo:rerun-if-changed={}", file.display());
    }
    files
}

fn relative(path: &Path) -> PathBuf {
    let root = manifest_root();
    path.strip_prefix(&root).unwrap_or(path).to_path_buf()
}

fn enforce_line_limits(files: &[PathBuf]) {
    let mut violations = Vec::new();
    for file in files {
        if let Ok(content) = std::fs::read_to_string(file) {
            let line_count = content.lines().filter(|l| !l.trim().is_empty()).count();
            if line_count > MAX_LINES {
                violations.push((relative(file), line_count));
            }
        }
    }

    if !violations.is_empty() {
        for (path, lines) in &violations {
            eprintln!("  {} - {} lines (max {})", path.display(), lines, MAX_LINES);
        }
        panic!(
            "Build failed: {} file(s) exceed the {} line limit",
            violations.len(),
            MAX_LINES
        );
    }
}

/// A `#[test]` or `#[tokio::test]` function found in a source file.
struct TestFn {
    name: String,
    line: usize,
    serial: bool,
    body: Vec<(usize, String)>,
}

/// Scans `content` for test functions, tracking brace depth to find where
/// each body ends. `#[serial]` may appear before or after the test attribute.
fn test_functions(content: &str) -> Vec<TestFn> {
    let lines: Vec<&str> = content.lines().collect();
    let mut tests = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let trimmed = lines[i].trim();
        if trimmed != "#[test]" && !trimmed.starts_with("#[tokio::test") {
            i += 1;
            continue;
        }

        let mut serial = is_serial_attr(lines.get(i.wrapping_sub(1)).copied().unwrap_or(""));
        let mut j = i + 1;
        while j < lines.len() && !lines[j].contains("fn ") {
            serial |= is_serial_attr(lines[j]);
            j += 1;
        }

        let name = lines
            .get(j)
            .and_then(|l| l.split_once("fn "))
            .and_then(|(_, rest)| rest.split_once('('))
            .map(|(name, _)| name.trim().to_string())
            .unwrap_or_default();

        let mut depth = 0i32;
        let mut opened = false;
        let mut body = Vec::new();
        while j < lines.len() {
            for c in lines[j].chars() {
                match c {
                    '{' => {
                        depth += 1;
                        opened = true;
                    }
                    '}' => depth -= 1,
                    _ => {}
                }
            }
            body.push((depth, lines[j].trim().to_string()));
            j += 1;
            if opened && depth <= 0 {
                break;
            }
        }

        tests.push(TestFn {
            name,
            line: i + 1,
            serial,
            body: body
                .into_iter()
                .map(|(depth, line)| (depth.max(0) as usize, line))
                .collect(),
        });
        i = j;
    }

    tests
}

fn is_serial_attr(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed == "#[serial]" || trimmed == "#[serial_test::serial]"
}

fn report(title: &str, advice: &[&str], violations: &[(PathBuf, usize, String)]) {
    eprintln!("\n========================================");
    eprintln!("{}", title);
    eprintln!("========================================");
    for (path, line, message) in violations {
        eprintln!("  {}:{}", path.display(), line);
        eprintln!("    {}", message);
    }
    eprintln!();
    for line in advice {
        eprintln!("{}", line);
    }
    eprintln!("========================================\n");
}

/// Tests that return early without doing work hide failures. If a test can't
/// run, it should fail, not silently pass.
fn enforce_no_test_skips(files: &[PathBuf]) {
    let skip_patterns = ["Skipping test", "skipping test", "Test skipped", "test skipped"];

    let mut violations = Vec::new();
    for file in files.iter().filter(|f| is_rust(f)) {
        let Ok(content) = std::fs::read_to_string(file) else {
            continue;
        };
        for test in test_functions(&content) {
            let skip = test.body.iter().find_map(|(depth, line)| {
                if let Some(pattern) = skip_patterns.iter().find(|p| line.contains(*p)) {
                    Some(format!("test `{}` contains skip pattern: {}", test.name, pattern))
                } else if line == "return;" && *depth > 1 {
                    Some(format!(
                        "test `{}` has conditional early return (silent skip)",
                        test.name
                    ))
                } else {
                    None
                }
            });
            if let Some(message) = skip {
                violations.push((relative(file), test.line, message));
            }
        }
    }

    if !violations.is_empty() {
        report(
            "SILENT TEST SKIPS ARE NOT ALLOWED",
            &[
                "Tests must FAIL if they cannot run, not silently pass.",
                "Use assert!() to verify preconditions, or #[ignore] with a reason.",
            ],
            &violations,
        );
        panic!(
            "Build failed: {} silent test skip(s) found. Make tests fail instead of skip.",
            violations.len()
        );
    }
}

/// Environment variables are process-global; tests that change them must not
/// run in parallel with other tests.
fn enforce_serial_for_env_mutations(files: &[PathBuf]) {
    let mut violations = Vec::new();
    for file in files.iter().filter(|f| is_rust(f)) {
        let Ok(content) = std::fs::read_to_string(file) else {
            continue;
        };
        for test in test_functions(&content) {
            let mutates_env = test.body.iter().any(|(_, line)| {
                !line.starts_with("//")
                    && (line.contains("env::set_var") || line.contains("env::remove_var"))
            });
            if mutates_env && !test.serial {
                violations.push((
                    relative(file),
                    test.line,
                    format!("test `{}` mutates env without #[serial]", test.name),
                ));
            }
        }
    }

    if !violations.is_empty() {
        report(
            "ENV MUTATIONS REQUIRE #[serial]",
            &[
                "Tests that call std::env::set_var or std::env::remove_var",
                "modify global state and cause flaky failures in parallel.",
                "Add #[serial] from the serial_test crate.",
            ],
            &violations,
        );
        panic!(
            "Build failed: {} test(s) mutate env without #[serial]",
            violations.len()
        );
    }
}

fn is_rust(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("rs")
}

fn walk_directory(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_dir() {
            let excluded = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| EXCLUDED_DIRS.contains(&name));
            if !excluded {
                walk_directory(&path, files);
            }
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| CHECKED_EXTENSIONS.contains(&ext))
        {
            files.push(path);
        }
    }
}
