//! The fixed extension-to-language table.

/// A language bucket in the stats document.
///
/// The extension families are fixed and case-sensitive; note the broad
/// fortran family with its upper-case spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Language {
    Java,
    Csharp,
    Node,
    Python,
    Kotlin,
    C,
    Cpp,
    ObjectiveC,
    Swift,
    Ruby,
    Go,
    Rust,
    Scala,
    Php,
    Fortran,
}

impl Language {
    /// The JSON key for this language in `countersByLanguage`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Java => "java",
            Self::Csharp => "csharp",
            Self::Node => "node",
            Self::Python => "python",
            Self::Kotlin => "kotlin",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::ObjectiveC => "objectivec",
            Self::Swift => "swift",
            Self::Ruby => "ruby",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Scala => "scala",
            Self::Php => "php",
            Self::Fortran => "fortran",
        }
    }

    /// Look up the language for a file extension, with or without its
    /// leading dot. Returns `None` for unrecognized extensions (the file is
    /// then skipped for stats).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.strip_prefix('.').unwrap_or(ext);
        let language = match ext {
            "java" => Self::Java,
            "cs" | "cshtml" => Self::Csharp,
            "js" | "jsx" | "ts" | "tsx" => Self::Node,
            "py" | "py3" | "py2" => Self::Python,
            "kt" | "kts" | "ktm" => Self::Kotlin,
            "c" | "h" => Self::C,
            "cpp" | "cxx" | "cc" | "hpp" | "hh" | "txx" | "tpp" => Self::Cpp,
            "m" | "mm" => Self::ObjectiveC,
            "swift" => Self::Swift,
            "rb" => Self::Ruby,
            "go" => Self::Go,
            "rs" => Self::Rust,
            "scala" | "sc" => Self::Scala,
            "php" | "phtml" | "php3" | "php4" | "php5" | "php7" | "phps"
            | "pht" | "phar" => Self::Php,
            "f" | "for" | "f77" | "f90" | "f95" | "f03" | "f03p" | "f08"
            | "f08p" | "f15" | "f20" | "f18" | "f2k" | "f2003" | "f2008"
            | "f2015" | "f2018" | "fpp" | "ftn" | "f05" | "F" | "FOR"
            | "F77" | "F90" | "F95" | "F03" | "F08" | "F15" | "F18" | "F2K"
            | "F2003" | "F2015" | "F2008" | "F2018" | "FPP" | "FTN" => Self::Fortran,
            _ => return None,
        };
        Some(language)
    }
}
