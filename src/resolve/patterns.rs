use globset::{GlobBuilder, GlobMatcher};
use log::warn;

use crate::constants::MATCH_ALL_PATTERN;

/// A trimmed pattern with its negation folded out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePattern {
    pub glob: String,
    pub exclude: bool,
}

impl FilePattern {
    /// Parse one user pattern.
    ///
    /// Leading `!` characters toggle negation one by one, so `!a` excludes,
    /// `!!a` includes and `!!!a` excludes again. Blank patterns yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let glob = trimmed.trim_start_matches('!');
        let bangs = trimmed.len() - glob.len();

        let glob = glob.trim_start();
        if glob.is_empty() {
            return None;
        }

        Some(FilePattern {
            glob: glob.to_string(),
            exclude: bangs % 2 == 1,
        })
    }
}

/// Which form of a file path a pattern is compared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchScope {
    /// No separator in the pattern: match the file name anywhere in the tree
    Basename,
    /// Match the path relative to the source root
    Relative,
    /// Absolute pattern: match the absolute path
    Absolute,
}

/// The three views of a file a pattern can be matched against.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub absolute: &'a str,
    pub relative: &'a str,
    pub basename: &'a str,
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    matcher: GlobMatcher,
    scope: MatchScope,
}

impl CompiledPattern {
    fn compile(glob: &str, case_insensitive: bool) -> Option<Self> {
        let normalized = glob.replace('\\', "/");
        let normalized = normalized.strip_prefix("./").unwrap_or(&normalized).to_string();

        let scope = if is_absolute_pattern(&normalized) {
            MatchScope::Absolute
        } else if normalized.contains('/') {
            MatchScope::Relative
        } else {
            MatchScope::Basename
        };

        // Wildcards match dot files; `*` stays within one path segment.
        let built = GlobBuilder::new(&normalized)
            .literal_separator(true)
            .case_insensitive(case_insensitive)
            .backslash_escape(false)
            .build();

        match built {
            Ok(glob) => Some(CompiledPattern {
                matcher: glob.compile_matcher(),
                scope,
            }),
            Err(e) => {
                warn!("Ignoring invalid pattern '{}': {}", glob, e);
                None
            }
        }
    }

    fn is_match(&self, candidate: &Candidate<'_>) -> bool {
        match self.scope {
            MatchScope::Basename => self.matcher.is_match(candidate.basename),
            MatchScope::Relative => self.matcher.is_match(candidate.relative),
            MatchScope::Absolute => self.matcher.is_match(candidate.absolute),
        }
    }
}

fn is_absolute_pattern(pattern: &str) -> bool {
    let bytes = pattern.as_bytes();
    pattern.starts_with('/')
        || (bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/')
}

/// Compiled include and exclude patterns, in user order.
#[derive(Debug, Clone)]
pub struct PatternSet {
    includes: Vec<CompiledPattern>,
    excludes: Vec<CompiledPattern>,
}

impl PatternSet {
    /// Compile user patterns.
    ///
    /// When no include pattern is present an implicit match-all include is
    /// placed first, so a list of excludes narrows the whole tree.
    pub fn new<S: AsRef<str>>(patterns: &[S], case_insensitive: bool) -> Self {
        let parsed: Vec<FilePattern> = patterns
            .iter()
            .filter_map(|p| FilePattern::parse(p.as_ref()))
            .collect();

        let mut includes = Vec::new();
        let mut excludes = Vec::new();

        if !parsed.iter().any(|p| !p.exclude) {
            includes.extend(CompiledPattern::compile(MATCH_ALL_PATTERN, case_insensitive));
        }

        for pattern in &parsed {
            let Some(compiled) = CompiledPattern::compile(&pattern.glob, case_insensitive) else {
                continue;
            };
            if pattern.exclude {
                excludes.push(compiled);
            } else {
                includes.push(compiled);
            }
        }

        PatternSet { includes, excludes }
    }

    /// Number of compiled include patterns (including an implicit one)
    pub fn include_count(&self) -> usize {
        self.includes.len()
    }

    /// Number of compiled exclude patterns
    pub fn exclude_count(&self) -> usize {
        self.excludes.len()
    }

    /// Does the include pattern at `index` match?
    pub fn include_matches(&self, index: usize, candidate: &Candidate<'_>) -> bool {
        self.includes
            .get(index)
            .map(|p| p.is_match(candidate))
            .unwrap_or(false)
    }

    /// Does any exclude pattern match?
    pub fn is_excluded(&self, candidate: &Candidate<'_>) -> bool {
        self.excludes.iter().any(|p| p.is_match(candidate))
    }
}
