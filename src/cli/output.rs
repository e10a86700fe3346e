//! Colored output helpers for the docqa CLI.

use crate::types::Answer;
use owo_colors::OwoColorize;

/// Terminal printer; plain tags replace colors and symbols when `colored` is off.
pub struct Output {
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    pub fn new() -> Self {
        Self { colored: true }
    }

    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// One-line startup banner for `serve`.
    pub fn banner(&self, address: &str) {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!(
                "\n  {} {}  {}\n",
                "docqa".bright_cyan().bold(),
                version.dimmed(),
                format!("listening on http://{}", address).bright_white()
            );
        } else {
            println!("\n  docqa {}  listening on http://{}\n", version, address);
        }
    }

    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Errors go to stderr.
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print an answer followed by the sources it was grounded on.
    pub fn answer(&self, answer: &Answer) {
        println!();
        for line in answer.text.lines() {
            println!("  {}", line);
        }

        if answer.metadata.fallback {
            self.hint("No documentation excerpt matched this question.");
            return;
        }

        self.header("Sources");
        for source in dedup_sources(&answer.metadata.sources) {
            self.list_item(source);
        }
        if let Some(score) = answer.metadata.top_score {
            self.kv("top score", &format!("{:.3}", score));
        }
        self.kv("chunks", &answer.metadata.chunk_count.to_string());
        println!();
    }
}

/// Sources in first-seen order without repeats (several chunks often share a document).
fn dedup_sources(sources: &[String]) -> Vec<&str> {
    let mut unique: Vec<&str> = Vec::with_capacity(sources.len());
    for source in sources {
        if !unique.contains(&source.as_str()) {
            unique.push(source);
        }
    }
    unique
}
