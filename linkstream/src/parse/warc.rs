use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use super::ParseError;

/// One record of a WARC (or WAT, which is WARC-framed) stream: the named
/// header block plus the raw record body.
#[derive(Debug)]
pub struct WarcRecord {
    headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl WarcRecord {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn record_type(&self) -> Option<&str> {
        self.header("WARC-Type")
    }
}

/// Streaming reader over WARC framing: a `WARC/x.y` version line, header
/// lines up to a blank line, then `Content-Length` bytes of body. Archive
/// files are usually one gzip member per record, so the gz entry point uses
/// a multi-member decoder.
pub struct WarcReader<R> {
    input: R,
}

pub fn open_gz(path: &Path) -> std::io::Result<WarcReader<BufReader<MultiGzDecoder<File>>>> {
    let file = File::open(path)?;
    Ok(WarcReader::new(BufReader::new(MultiGzDecoder::new(file))))
}

impl<R: BufRead> WarcReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    fn next_record(&mut self) -> Result<Option<WarcRecord>, ParseError> {
        let mut line = String::new();

        // Skip record separators until the next version line.
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            if line.starts_with("WARC/") {
                break;
            }
            if !line.trim_end_matches(['\r', '\n']).is_empty() {
                return Err(ParseError::Warc(format!(
                    "expected WARC version line, got {:?}",
                    line.trim_end()
                )));
            }
        }

        let mut headers: HashMap<String, String> = HashMap::new();
        let mut last_name: Option<String> = None;
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Err(ParseError::Warc("eof inside header block".to_string()));
            }
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() {
                break;
            }
            if line.starts_with([' ', '\t']) {
                // Folded continuation of the previous header value.
                if let Some(name) = &last_name {
                    if let Some(value) = headers.get_mut(name) {
                        value.push(' ');
                        value.push_str(trimmed.trim_start());
                    }
                }
                continue;
            }
            let Some((name, value)) = trimmed.split_once(':') else {
                return Err(ParseError::Warc(format!("malformed header line {trimmed:?}")));
            };
            let name = name.trim().to_ascii_lowercase();
            headers.insert(name.clone(), value.trim().to_string());
            last_name = Some(name);
        }

        let length: usize = headers
            .get("content-length")
            .ok_or_else(|| ParseError::Warc("missing Content-Length".to_string()))?
            .parse()
            .map_err(|_| ParseError::Warc("unparseable Content-Length".to_string()))?;

        let mut body = vec![0u8; length];
        self.input.read_exact(&mut body)?;

        Ok(Some(WarcRecord { headers, body }))
    }
}

impl<R: BufRead> Iterator for WarcReader<R> {
    type Item = Result<WarcRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
