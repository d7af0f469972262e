use pagetap_core::LogEvent;
use pagetap_render::Renderer;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

/// Live sink for watch mode: each accepted event is rendered single-event
/// and either appended to the output file or written to the console.
/// At-most-once, best-effort.
pub struct Mirror {
    renderer: Renderer,
    output_file: Option<PathBuf>,
}

impl Mirror {
    pub fn new(format: &str, output_file: Option<PathBuf>) -> Self {
        Self {
            renderer: Renderer::from_name(format),
            output_file,
        }
    }

    pub fn write(&self, event: &LogEvent) {
        let formatted = self.renderer.format_single(event);
        match &self.output_file {
            Some(path) => {
                if let Err(e) = append_line(path, &formatted) {
                    warn!(path = %path.display(), error = %e, "failed to mirror event");
                }
            }
            None => println!("{}", formatted),
        }
    }
}

fn append_line(path: &std::path::Path, content: &str) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{}", content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagetap_core::LogLevel;
    use tempfile::TempDir;

    #[test]
    fn test_mirror_appends_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        let mirror = Mirror::new("text", Some(path.clone()));

        let mut event = LogEvent::new(LogLevel::Error, "boom");
        event.timestamp = 1_700_000_000_000;
        mirror.write(&event);
        mirror.write(&event);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("ERROR: boom").count(), 2);
    }

    #[test]
    fn test_mirror_failure_is_nonfatal() {
        let mirror = Mirror::new("text", Some(PathBuf::from("/nonexistent/dir/out.txt")));
        mirror.write(&LogEvent::new(LogLevel::Log, "fine"));
    }
}
