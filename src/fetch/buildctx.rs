//! Build contexts and constraint filtering.
//!
//! File selection follows the Go tool's two mechanisms: GOOS/GOARCH
//! filename suffixes, and constraint comments (`//go:build` expressions,
//! plus legacy `// +build` lines where no expression is present).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildContext {
    pub goos: &'static str,
    pub goarch: &'static str,
}

/// Placeholder context when every real context selects the same fileset.
pub const ALL: BuildContext = BuildContext {
    goos: "all",
    goarch: "all",
};

/// Iteration order for package loading; the first context yielding any
/// non-test files wins the package identity.
pub const BUILD_CONTEXTS: &[BuildContext] = &[
    BuildContext { goos: "linux", goarch: "amd64" },
    BuildContext { goos: "windows", goarch: "amd64" },
    BuildContext { goos: "darwin", goarch: "amd64" },
    BuildContext { goos: "js", goarch: "wasm" },
    BuildContext { goos: "linux", goarch: "js" },
];

/// Display order: linux, darwin, windows, js; then by architecture.
pub fn display_rank(goos: &str, goarch: &str) -> (usize, String) {
    let os_rank = match goos {
        "linux" => 0,
        "darwin" => 1,
        "windows" => 2,
        "js" => 3,
        _ => 4,
    };
    (os_rank, goarch.to_string())
}

const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "windows", "zos",
];

const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "arm64", "arm64be", "armbe", "loong64", "mips", "mips64",
    "mips64le", "mips64p32", "mips64p32le", "mipsle", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

impl BuildContext {
    /// Whether `file_name` with `contents` builds under this context.
    pub fn should_build(&self, file_name: &str, contents: &str) -> bool {
        self.matches_file_name(file_name) && self.matches_constraints(contents)
    }

    /// GOOS/GOARCH filename suffix rules: `x_GOOS.go`, `x_GOARCH.go`,
    /// `x_GOOS_GOARCH.go`, with a `_test` suffix stripped first.
    fn matches_file_name(&self, file_name: &str) -> bool {
        let Some(stem) = file_name.strip_suffix(".go") else {
            return false;
        };
        let stem = stem.strip_suffix("_test").unwrap_or(stem);
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() >= 3 {
            let (os, arch) = (parts[parts.len() - 2], parts[parts.len() - 1]);
            if KNOWN_OS.contains(&os) && KNOWN_ARCH.contains(&arch) {
                return os == self.goos && arch == self.goarch;
            }
        }
        if parts.len() >= 2 {
            let last = parts[parts.len() - 1];
            if KNOWN_OS.contains(&last) {
                return last == self.goos;
            }
            if KNOWN_ARCH.contains(&last) {
                return last == self.goarch;
            }
        }
        true
    }

    fn matches_constraints(&self, contents: &str) -> bool {
        match constraint_of(contents) {
            Some(Constraint::Expr(expr)) => eval_expr(&expr, &|tag| self.matches_tag(tag)),
            Some(Constraint::Legacy(lines)) => {
                lines.iter().all(|line| self.matches_plus_build_line(line))
            }
            None => true,
        }
    }

    /// A `// +build` line is an OR of space-separated options, each a
    /// comma-separated AND of possibly negated terms.
    fn matches_plus_build_line(&self, line: &str) -> bool {
        line.split_whitespace().any(|option| {
            option.split(',').all(|term| {
                if let Some(tag) = term.strip_prefix('!') {
                    !self.matches_tag(tag)
                } else {
                    self.matches_tag(term)
                }
            })
        })
    }

    fn matches_tag(&self, tag: &str) -> bool {
        tag == self.goos
            || tag == self.goarch
            || (tag == "unix" && UNIX_OS.contains(&self.goos))
            // Language version tags are assumed satisfied.
            || tag.starts_with("go1")
    }
}

enum Constraint {
    Expr(Vec<Token>),
    Legacy(Vec<String>),
}

/// Scan the file header (before the package clause) for constraints. A
/// `//go:build` expression takes precedence over `// +build` lines.
fn constraint_of(contents: &str) -> Option<Constraint> {
    let mut legacy = Vec::new();
    for line in contents.lines() {
        let trimmed = line.trim();
        if let Some(expr) = trimmed.strip_prefix("//go:build ") {
            return Some(Constraint::Expr(tokenize(expr)));
        }
        if let Some(rest) = trimmed.strip_prefix("// +build ") {
            legacy.push(rest.trim().to_string());
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        // Package clause or code: constraints must appear above it.
        break;
    }
    if legacy.is_empty() {
        None
    } else {
        Some(Constraint::Legacy(legacy))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Not,
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '&' => {
                chars.next();
                if chars.peek() == Some(&'&') {
                    chars.next();
                    tokens.push(Token::And);
                }
            }
            '|' => {
                chars.next();
                if chars.peek() == Some(&'|') {
                    chars.next();
                    tokens.push(Token::Or);
                }
            }
            _ => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if ident.is_empty() {
                    // Unknown character; skip to avoid an infinite loop.
                    chars.next();
                } else {
                    tokens.push(Token::Ident(ident));
                }
            }
        }
    }
    tokens
}

/// Recursive-descent evaluation: or := and ('||' and)*, and := unary
/// ('&&' unary)*, unary := '!' unary | '(' or ')' | ident.
fn eval_expr(tokens: &[Token], matches: &dyn Fn(&str) -> bool) -> bool {
    let mut pos = 0;
    let result = eval_or(tokens, &mut pos, matches);
    result.unwrap_or(false)
}

fn eval_or(tokens: &[Token], pos: &mut usize, matches: &dyn Fn(&str) -> bool) -> Option<bool> {
    let mut value = eval_and(tokens, pos, matches)?;
    while tokens.get(*pos) == Some(&Token::Or) {
        *pos += 1;
        let rhs = eval_and(tokens, pos, matches)?;
        value = value || rhs;
    }
    Some(value)
}

fn eval_and(tokens: &[Token], pos: &mut usize, matches: &dyn Fn(&str) -> bool) -> Option<bool> {
    let mut value = eval_unary(tokens, pos, matches)?;
    while tokens.get(*pos) == Some(&Token::And) {
        *pos += 1;
        let rhs = eval_unary(tokens, pos, matches)?;
        value = value && rhs;
    }
    Some(value)
}

fn eval_unary(tokens: &[Token], pos: &mut usize, matches: &dyn Fn(&str) -> bool) -> Option<bool> {
    match tokens.get(*pos)? {
        Token::Not => {
            *pos += 1;
            Some(!eval_unary(tokens, pos, matches)?)
        }
        Token::LParen => {
            *pos += 1;
            let value = eval_or(tokens, pos, matches)?;
            if tokens.get(*pos) == Some(&Token::RParen) {
                *pos += 1;
            }
            Some(value)
        }
        Token::Ident(name) => {
            *pos += 1;
            Some(matches(name))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX: BuildContext = BuildContext { goos: "linux", goarch: "amd64" };
    const WINDOWS: BuildContext = BuildContext { goos: "windows", goarch: "amd64" };
    const JS: BuildContext = BuildContext { goos: "js", goarch: "wasm" };

    #[test]
    fn test_filename_suffixes() {
        assert!(LINUX.matches_file_name("main.go"));
        assert!(LINUX.matches_file_name("util_linux.go"));
        assert!(!LINUX.matches_file_name("util_windows.go"));
        assert!(WINDOWS.matches_file_name("util_windows.go"));
        assert!(LINUX.matches_file_name("asm_linux_amd64.go"));
        assert!(!LINUX.matches_file_name("asm_linux_arm64.go"));
        assert!(LINUX.matches_file_name("cpu_amd64.go"));
        assert!(!LINUX.matches_file_name("cpu_arm64.go"));
        // _test suffix strips before the GOOS check.
        assert!(!LINUX.matches_file_name("util_windows_test.go"));
        // Words that are not GOOS/GOARCH do not constrain.
        assert!(LINUX.matches_file_name("my_helper.go"));
        assert!(!LINUX.matches_file_name("not_go_source.txt"));
    }

    #[test]
    fn test_go_build_expressions() {
        assert!(LINUX.should_build("f.go", "//go:build linux\n\npackage p\n"));
        assert!(!WINDOWS.should_build("f.go", "//go:build linux\n\npackage p\n"));
        assert!(WINDOWS.should_build("f.go", "//go:build !linux\n\npackage p\n"));
        assert!(LINUX.should_build("f.go", "//go:build linux && amd64\n\npackage p\n"));
        assert!(LINUX.should_build("f.go", "//go:build windows || linux\n\npackage p\n"));
        assert!(!JS.should_build("f.go", "//go:build windows || linux\n\npackage p\n"));
        assert!(LINUX.should_build("f.go", "//go:build !(windows || darwin)\n\npackage p\n"));
        assert!(LINUX.should_build("f.go", "//go:build unix\n\npackage p\n"));
        assert!(!WINDOWS.should_build("f.go", "//go:build unix\n\npackage p\n"));
        assert!(LINUX.should_build("f.go", "//go:build go1.18\n\npackage p\n"));
        // Unknown tags are false.
        assert!(!LINUX.should_build("f.go", "//go:build mytag\n\npackage p\n"));
    }

    #[test]
    fn test_legacy_plus_build() {
        assert!(LINUX.should_build("f.go", "// +build linux darwin\n\npackage p\n"));
        assert!(!WINDOWS.should_build("f.go", "// +build linux darwin\n\npackage p\n"));
        assert!(LINUX.should_build("f.go", "// +build linux,amd64\n\npackage p\n"));
        assert!(!LINUX.should_build("f.go", "// +build linux,arm64\n\npackage p\n"));
        assert!(WINDOWS.should_build("f.go", "// +build !linux\n\npackage p\n"));
        // Multiple lines AND together.
        assert!(!JS.should_build("f.go", "// +build js\n// +build windows\n\npackage p\n"));
    }

    #[test]
    fn test_constraints_only_in_header() {
        let source = "package p\n\n//go:build windows\n";
        assert!(LINUX.should_build("f.go", source));
    }

    #[test]
    fn test_go_build_precedes_legacy() {
        let source = "//go:build linux\n// +build windows\n\npackage p\n";
        assert!(LINUX.should_build("f.go", source));
        assert!(!WINDOWS.should_build("f.go", source));
    }

    #[test]
    fn test_display_rank() {
        let mut contexts = vec![
            ("windows", "amd64"),
            ("linux", "amd64"),
            ("js", "wasm"),
            ("darwin", "amd64"),
        ];
        contexts.sort_by_key(|(os, arch)| display_rank(os, arch));
        assert_eq!(
            contexts,
            vec![
                ("linux", "amd64"),
                ("darwin", "amd64"),
                ("windows", "amd64"),
                ("js", "wasm"),
            ]
        );
    }
}
