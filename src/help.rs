// ABOUTME: Help and documentation system for Smoosh
// Provides first-class documentation for built-in functions

use std::cell::RefCell;
use std::collections::HashMap;

/// A help entry for a function
#[derive(Debug, Clone)]
pub struct HelpEntry {
    pub name: String,
    pub signature: String,
    pub description: String,
    pub examples: Vec<String>,
    pub related: Vec<String>,
    pub category: String,
}

/// Macro for defining help entries with less boilerplate
/// Usage: help_entry!("name", "category", "signature", "description", ["ex1", "ex2"], ["related1"])
macro_rules! help_entry {
    (
        $name:literal,
        $category:literal,
        $signature:literal,
        $description:literal,
        [$($example:literal),* $(,)?],
        [$($related:literal),* $(,)?]
    ) => {
        register_help(HelpEntry {
            name: $name.to_string(),
            category: $category.to_string(),
            signature: $signature.to_string(),
            description: $description.trim().to_string(),
            examples: vec![$($example.to_string()),*],
            related: vec![$($related.to_string()),*],
        });
    };
}

/// Registry for all function documentation
pub struct HelpRegistry {
    entries: HashMap<String, HelpEntry>,
}

impl HelpRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a help entry
    pub fn register(&mut self, entry: HelpEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    /// Get a help entry by name
    pub fn get(&self, name: &str) -> Option<HelpEntry> {
        self.entries.get(name).cloned()
    }

    /// Get all entries organized by category
    pub fn by_category(&self) -> HashMap<String, Vec<HelpEntry>> {
        let mut by_cat: HashMap<String, Vec<HelpEntry>> = HashMap::new();
        for entry in self.entries.values() {
            by_cat
                .entry(entry.category.clone())
                .or_default()
                .push(entry.clone());
        }
        // Sort each category
        for entries in by_cat.values_mut() {
            entries.sort_by(|a, b| a.name.cmp(&b.name));
        }
        by_cat
    }

    /// Get all function names
    #[allow(dead_code)]
    pub fn all_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for HelpRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Thread-local help registry
thread_local! {
    static HELP_REGISTRY: RefCell<HelpRegistry> = RefCell::new(HelpRegistry::new());
}

/// Register a help entry in the global registry
pub fn register_help(entry: HelpEntry) {
    HELP_REGISTRY.with(|reg| {
        reg.borrow_mut().register(entry);
    });
}

/// Get a help entry by name
pub fn get_help(name: &str) -> Option<HelpEntry> {
    HELP_REGISTRY.with(|reg| reg.borrow().get(name))
}

/// Get all entries organized by category
pub fn all_by_category() -> HashMap<String, Vec<HelpEntry>> {
    HELP_REGISTRY.with(|reg| reg.borrow().by_category())
}

/// Get all function names
#[allow(dead_code)]
pub fn all_names() -> Vec<String> {
    HELP_REGISTRY.with(|reg| reg.borrow().all_names())
}

/// Format a single help entry for display with syntax highlighting
pub fn format_help_entry(entry: &HelpEntry) -> String {
    let mut output = String::new();

    // Header with name and category
    output.push_str(&format!("{} - {}\n", entry.name, entry.category));
    output.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    // Signature - split multi-line signatures nicely
    output.push_str("Signature:\n");
    for sig_line in entry.signature.lines() {
        output.push_str(&format!("  {}\n", sig_line));
    }
    output.push('\n');

    // Description
    output.push_str("Description:\n");
    for line in entry.description.lines() {
        output.push_str(&format!("  {}\n", line));
    }
    output.push('\n');

    // Examples with better formatting
    if !entry.examples.is_empty() {
        output.push_str("Examples:\n");
        for example in &entry.examples {
            output.push_str("  ");
            output.push_str(example);
            output.push('\n');
        }
        output.push('\n');
    }

    // Related functions
    if !entry.related.is_empty() {
        output.push_str("Related:\n");
        output.push_str(&format!("  {}\n", entry.related.join(", ")));
        output.push('\n');
    }

    output.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    output
}

/// Format quick reference showing all functions
pub fn format_quick_reference() -> String {
    let mut output = String::new();

    let by_cat = all_by_category();
    let total = by_cat.values().map(|v| v.len()).sum::<usize>();

    output.push_str(&format!("Available Functions ({} total)\n", total));
    output.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    // Define category display order
    let categories = vec![
        "Data structures",
        "Shell",
        "Console I/O",
        "Filesystem",
        "Archives",
        "Process",
        "Network",
        "Redirection",
        "Help system",
    ];

    for category in categories {
        if let Some(entries) = by_cat.get(category) {
            let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
            output.push_str(&format!("{} ({})\n", category, names.len()));
            output.push_str(&format!("  {}\n\n", names.join(", ")));
        }
    }

    output.push_str("Type help(\"function-name\") for detailed help.\n");
    output.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    output
}

/// Populate the registry with all built-in function documentation
pub fn populate_builtin_help() {
    // Data structures
    help_entry!("len", "Data structures", "len(value)", "Returns the length of a string or array.",
        ["len(\"hello\") => 5", "len([1, 2, 3]) => 3"], ["first", "last", "rest"]);
    help_entry!("first", "Data structures", "first(array)", "Returns the first element of an array, or null if empty.",
        ["first([1, 2, 3]) => 1", "first([]) => null"], ["last", "rest", "len"]);
    help_entry!("last", "Data structures", "last(array)", "Returns the last element of an array, or null if empty.",
        ["last([1, 2, 3]) => 3", "last([]) => null"], ["first", "rest", "len"]);
    help_entry!("rest", "Data structures", "rest(array)", "Returns a new array with every element but the first.",
        ["rest([1, 2, 3]) => [2, 3]", "rest([]) => []"], ["first", "push"]);
    help_entry!("push", "Data structures", "push(array, value)", "Returns a new array with value appended.",
        ["push([1, 2], 3) => [1, 2, 3]"], ["rest", "len"]);

    // Shell
    help_entry!("pwd", "Shell", "pwd()", "Returns the current working directory as a string.",
        ["pwd() => \"/home/user\""], ["cd"]);
    help_entry!("cd", "Shell", "cd(path)", "Changes the current working directory. Returns null.",
        ["cd(\"/tmp\")"], ["pwd"]);
    help_entry!("exit", "Shell", "exit()\nexit(code)", "Terminates the process, optionally with a status code.",
        ["exit()", "exit(1)"], []);

    // Console I/O
    help_entry!("echo", "Console I/O", "echo(value, ...)", "Writes each argument to stdout separated by spaces, followed by a newline.",
        ["echo(\"hi\") => prints: hi"], ["cat", "tee"]);
    help_entry!("cat", "Console I/O", "cat(path, ...)", "Writes the contents of each file (or stdin if no paths given) to stdout.",
        ["cat(\"file.txt\")", "echo(\"hi\") | cat()"], ["echo", "head", "tail"]);
    help_entry!("head", "Console I/O", "head(n(count), path)", "Writes the first `count` lines (default 10) to stdout.",
        ["head(\"file.txt\")", "head(n(5), \"file.txt\")"], ["tail", "cat"]);
    help_entry!("tail", "Console I/O", "tail(n(count), path)", "Writes the last `count` lines (default 10) to stdout.",
        ["tail(\"file.txt\")", "tail(n(5), \"file.txt\")"], ["head", "cat"]);
    help_entry!("wc", "Console I/O", "wc(path)", "Counts lines, words, and bytes, writing the totals to stdout.",
        ["wc(\"file.txt\") => prints: 3 10 42 file.txt"], ["grep"]);
    help_entry!("grep", "Console I/O", "grep(pattern, path)", "Writes lines matching `pattern` to stdout.",
        ["grep(\"error\", \"log.txt\")"], ["wc"]);
    help_entry!("tee", "Console I/O", "tee(path)", "Copies stdin to stdout and also writes it to `path`.",
        ["cat(\"a.txt\") | tee(\"copy.txt\")"], ["cat", "echo"]);

    // Filesystem
    help_entry!("ls", "Filesystem", "ls(path)", "Returns an array of filenames in a directory.",
        ["ls(\".\") => [\"a.txt\", \"b.txt\"]"], ["cp", "mv", "rm"]);
    help_entry!("cp", "Filesystem", "cp(src, dst)", "Copies a file. Returns null.",
        ["cp(\"a.txt\", \"b.txt\")"], ["mv", "rm"]);
    help_entry!("mv", "Filesystem", "mv(src, dst)", "Moves/renames a file. Returns null.",
        ["mv(\"a.txt\", \"b.txt\")"], ["cp", "rm"]);
    help_entry!("rm", "Filesystem", "rm(path)", "Removes a file. Returns null.",
        ["rm(\"a.txt\")"], ["cp", "mv"]);
    help_entry!("touch", "Filesystem", "touch(path)", "Creates an empty file if it doesn't already exist. Returns null.",
        ["touch(\"new.txt\")"], ["ls"]);
    help_entry!("basename", "Filesystem", "basename(path)", "Returns the final path component.",
        ["basename(\"/a/b/c.txt\") => \"c.txt\""], ["dirname"]);
    help_entry!("dirname", "Filesystem", "dirname(path)", "Returns the path with its final component removed.",
        ["dirname(\"/a/b/c.txt\") => \"/a/b\""], ["basename"]);
    help_entry!("which", "Filesystem", "which(name)", "Searches $PATH for an executable, returning its full path or null.",
        ["which(\"ls\") => \"/usr/bin/ls\""], ["ls"]);

    // Archives
    help_entry!("gzip", "Archives", "gzip(path)", "Compresses a file with gzip, writing `path.gz`. Returns null.",
        ["gzip(\"a.txt\")"], ["gunzip"]);
    help_entry!("gunzip", "Archives", "gunzip(path)", "Decompresses a gzip file, writing the output without the `.gz` suffix.",
        ["gunzip(\"a.txt.gz\")"], ["gzip"]);
    help_entry!("zip", "Archives", "zip(archive, path, ...)", "Adds one or more files to a (store-format) zip archive.",
        ["zip(\"out.zip\", \"a.txt\", \"b.txt\")"], ["unzip"]);
    help_entry!("unzip", "Archives", "unzip(archive, dest)", "Extracts a zip archive into `dest`.",
        ["unzip(\"out.zip\", \".\")"], ["zip"]);

    // Process
    help_entry!("sleep", "Process", "sleep(seconds)", "Blocks the current stage for `seconds`. Returns null.",
        ["sleep(1)"], []);

    // Network
    help_entry!("http.Get", "Network", "http.Get(url)", "Performs an HTTP GET request, returning a hash with `status`, `headers`, and `body`.",
        ["http.Get(\"https://example.com\")"], []);

    // Redirection
    help_entry!("r", "Redirection", "r(path)", "Opens `path` for reading, producing a pipeline source.",
        ["r(\"in.txt\") | cat()"], ["w"]);
    help_entry!("w", "Redirection", "w(path)", "Opens `path` for writing, consuming piped stdin.",
        ["echo(\"hi\") | w(\"out.txt\")"], ["r"]);

    // Help system
    help_entry!("help", "Help system", "help()\nhelp(name)", "Shows the quick reference, or detailed help for a specific builtin.",
        ["help()", "help(\"grep\")"], []);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_registry_register_and_get() {
        let mut registry = HelpRegistry::new();
        let entry = HelpEntry {
            name: "test-fn".to_string(),
            signature: "(test-fn x)".to_string(),
            description: "Test function".to_string(),
            examples: vec![],
            related: vec![],
            category: "Test".to_string(),
        };

        registry.register(entry.clone());
        assert_eq!(registry.get("test-fn").unwrap().name, "test-fn");
    }

    #[test]
    fn test_help_registry_by_category() {
        let mut registry = HelpRegistry::new();
        registry.register(HelpEntry {
            name: "fn1".to_string(),
            signature: "".to_string(),
            description: "".to_string(),
            examples: vec![],
            related: vec![],
            category: "Arithmetic".to_string(),
        });
        registry.register(HelpEntry {
            name: "fn2".to_string(),
            signature: "".to_string(),
            description: "".to_string(),
            examples: vec![],
            related: vec![],
            category: "Arithmetic".to_string(),
        });

        let by_cat = registry.by_category();
        assert_eq!(by_cat["Arithmetic"].len(), 2);
    }

    #[test]
    fn test_format_help_entry() {
        let entry = HelpEntry {
            name: "test".to_string(),
            signature: "(test x)".to_string(),
            description: "A test function".to_string(),
            examples: vec!["(test 1)".to_string()],
            related: vec!["other".to_string()],
            category: "Test".to_string(),
        };

        let formatted = format_help_entry(&entry);
        assert!(formatted.contains("test - Test"));
        assert!(formatted.contains("A test function"));
        assert!(formatted.contains("(test 1)"));
    }

    #[test]
    fn test_populate_builtin_help() {
        populate_builtin_help();
        assert!(get_help("echo").is_some());
        assert!(get_help("grep").is_some());
        assert!(get_help("gzip").is_some());
        assert!(get_help("help").is_some());
    }
}
