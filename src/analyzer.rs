use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Line count for one file plus whether its bytes were valid UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLines {
    pub lines: usize,
    pub valid_utf8: bool,
}

/// Counts the lines of a file.
///
/// Files at or above `mmap_threshold` bytes are memory-mapped; everything
/// else is streamed through [`count_reader`].
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn count_file(path: &Path, mmap_threshold: Option<u64>) -> io::Result<FileLines> {
    let file = File::open(path)?;
    if let Some(threshold) = mmap_threshold {
        if let Ok(meta) = file.metadata() {
            if meta.len() >= threshold {
                // Safety: read-only map; the file is not mutated by us while mapped
                if let Ok(mmap) = unsafe { memmap2::Mmap::map(&file) } {
                    let mut tally = LineTally::default();
                    tally.feed(&mmap[..]);
                    return Ok(tally.finish());
                }
            }
        }
    }
    count_reader(file)
}

/// Counts lines from any reader using universal-newline rules:
/// `\n`, `\r\n` and a lone `\r` each end one line, and a final
/// unterminated line counts too.
///
/// # Errors
/// Returns an error if reading fails.
pub fn count_reader<R: Read>(mut reader: R) -> io::Result<FileLines> {
    let mut tally = LineTally::default();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        tally.feed(&buf[..n]);
    }
    Ok(tally.finish())
}

#[derive(Default)]
struct LineTally {
    terminators: usize,
    seen_bytes: bool,
    prev_cr: bool,
    ends_terminated: bool,
    invalid_utf8: bool,
    // incomplete multi-byte sequence carried across chunk boundaries
    utf8_tail: Vec<u8>,
}

impl LineTally {
    fn feed(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.seen_bytes = true;

        for i in memchr::memchr2_iter(b'\n', b'\r', chunk) {
            // \r\n is one terminator, counted at the \r
            if chunk[i] == b'\n' {
                let after_cr = if i == 0 { self.prev_cr } else { chunk[i - 1] == b'\r' };
                if after_cr {
                    continue;
                }
            }
            self.terminators += 1;
        }

        // Carry boundary state into the next chunk
        let last = chunk[chunk.len() - 1];
        self.prev_cr = last == b'\r';
        self.ends_terminated = last == b'\n' || last == b'\r';

        self.check_utf8(chunk);
    }

    fn check_utf8(&mut self, chunk: &[u8]) {
        if self.invalid_utf8 {
            return;
        }
        let joined;
        let bytes: &[u8] = if self.utf8_tail.is_empty() {
            chunk
        } else {
            let mut tail = std::mem::take(&mut self.utf8_tail);
            tail.extend_from_slice(chunk);
            joined = tail;
            &joined
        };
        match std::str::from_utf8(bytes) {
            Ok(_) => {}
            // truncated sequence at the chunk end; retry with the next chunk
            Err(e) if e.error_len().is_none() => {
                self.utf8_tail = bytes[e.valid_up_to()..].to_vec();
            }
            Err(_) => self.invalid_utf8 = true,
        }
    }

    fn finish(self) -> FileLines {
        // An unterminated final line still counts
        let partial = usize::from(self.seen_bytes && !self.ends_terminated);
        FileLines {
            lines: self.terminators + partial,
            valid_utf8: !self.invalid_utf8 && self.utf8_tail.is_empty(),
        }
    }
}
