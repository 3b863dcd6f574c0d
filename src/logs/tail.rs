//! Bounded reads from the end of a text file.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

const CHUNK_SIZE: u64 = 64 * 1024;

/// The last `limit` lines of `path` and the file size.
///
/// Chunks are read backwards from the end until enough line breaks have
/// been seen, so the cost depends on `limit` rather than the file size.
pub(crate) fn read_last_lines(path: &Path, limit: usize) -> io::Result<(Vec<String>, u64)> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    if limit == 0 || size == 0 {
        return Ok((Vec::new(), size));
    }

    let mut pos = size;
    let mut tail: Vec<u8> = Vec::new();
    let mut breaks = 0usize;
    let mut trailing_checked = false;

    while pos > 0 {
        let read = pos.min(CHUNK_SIZE);
        pos -= read;
        file.seek(SeekFrom::Start(pos))?;
        let mut chunk = vec![0u8; read as usize];
        file.read_exact(&mut chunk)?;

        breaks += chunk.iter().filter(|b| **b == b'\n').count();
        if !trailing_checked {
            // The newline that ends the final line does not separate lines.
            if chunk.last() == Some(&b'\n') {
                breaks -= 1;
            }
            trailing_checked = true;
        }

        chunk.extend_from_slice(&tail);
        tail = chunk;
        if breaks >= limit {
            break;
        }
    }

    let text = String::from_utf8_lossy(&tail);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(limit);
    Ok((lines[start..].iter().map(|l| l.to_string()).collect(), size))
}

/// Number of lines in `path`, counting an unterminated last line.
pub(crate) fn count_lines(path: &Path) -> io::Result<usize> {
    let mut reader = BufReader::with_capacity(CHUNK_SIZE as usize, File::open(path)?);
    let mut count = 0;
    let mut last = None;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        count += buf.iter().filter(|b| **b == b'\n').count();
        last = buf.last().copied();
        let len = buf.len();
        reader.consume(len);
    }
    if matches!(last, Some(b) if b != b'\n') {
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_last_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.log", "one\ntwo\nthree\n");

        let (lines, size) = read_last_lines(&path, 2).unwrap();
        assert_eq!(lines, vec!["two", "three"]);
        assert_eq!(size, 14);

        let (lines, _) = read_last_lines(&path, 10).unwrap();
        assert_eq!(lines, vec!["one", "two", "three"]);

        let (lines, _) = read_last_lines(&path, 0).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_unterminated_and_crlf() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "b.log", "one\r\ntwo\r\nthree");
        let (lines, _) = read_last_lines(&path, 2).unwrap();
        assert_eq!(lines, vec!["two", "three"]);
        assert_eq!(count_lines(&path).unwrap(), 3);
    }

    #[test]
    fn test_spans_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let line = "x".repeat(1000);
        let content: String = (0..200).map(|i| format!("{i} {line}\n")).collect();
        let path = write(&dir, "big.log", &content);

        let (lines, _) = read_last_lines(&path, 150).unwrap();
        assert_eq!(lines.len(), 150);
        assert!(lines[0].starts_with("50 "));
        assert!(lines[149].starts_with("199 "));
        assert_eq!(count_lines(&path).unwrap(), 200);
    }

    #[test]
    fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "empty.log", "");
        assert!(read_last_lines(&path, 5).unwrap().0.is_empty());
        assert_eq!(count_lines(&path).unwrap(), 0);
    }
}
