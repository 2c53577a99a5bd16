use std::io::BufRead;

use serde_json::Value;
use tracing::{debug, trace};

use super::warc::{WarcReader, WarcRecord};
use super::{normalize_timestamp, ParseError};
use crate::canon::{Canonical, Canonicalizer};
use crate::event::LinkRecord;

const LINKS_POINTER: &str =
    "/Envelope/Payload-Metadata/HTTP-Response-Metadata/HTML-Metadata/Links";
const DATE_POINTER: &str = "/Envelope/WARC-Header-Metadata/WARC-Date";

/// Running (identifier, timestamp) of the last emitted record, used to drop
/// consecutive re-captures of the same page version. Scope is decided by the
/// caller: a fresh state per file by default, or one state threaded through
/// the whole run in legacy mode.
#[derive(Debug, Default, Clone)]
pub struct DedupState {
    last: Option<(String, String)>,
}

impl DedupState {
    /// Returns true when (identifier, timestamp) repeats the previously
    /// emitted pair; otherwise remembers the pair as emitted.
    pub fn observe(&mut self, identifier: &str, timestamp: &str) -> bool {
        if let Some((last_id, last_ts)) = &self.last {
            if last_id == identifier && last_ts == timestamp {
                return true;
            }
        }
        self.last = Some((identifier.to_string(), timestamp.to_string()));
        false
    }
}

/// Iterates the metadata records of one WAT stream as LinkRecords.
pub struct WatLinkRecords<R> {
    records: WarcReader<R>,
    canon: Canonicalizer,
    dt14: bool,
    dedup: DedupState,
}

impl<R: BufRead> WatLinkRecords<R> {
    pub fn new(records: WarcReader<R>, canon: Canonicalizer, dt14: bool, dedup: DedupState) -> Self {
        Self {
            records,
            canon,
            dt14,
            dedup,
        }
    }

    /// Hand the dedup state back so legacy mode can carry it into the next file.
    pub fn into_dedup(self) -> DedupState {
        self.dedup
    }

    fn record_to_link_record(&mut self, record: &WarcRecord) -> Option<LinkRecord> {
        if record.record_type() != Some("metadata") {
            return None;
        }

        let target = record.header("WARC-Target-URI")?;
        let target = match self.canon.canonicalize(target, None) {
            Ok(canonical) => canonical,
            Err(reject) => {
                debug!("skipping record, target uri rejected: {reject}");
                return None;
            }
        };

        // The payload is the WAT metadata envelope; a missing or malformed
        // envelope means no outlinks, not a broken record.
        let payload: Option<Value> = serde_json::from_slice(&record.body).ok();

        let timestamp = payload
            .as_ref()
            .and_then(|p| p.pointer(DATE_POINTER))
            .and_then(Value::as_str)
            .unwrap_or("");
        let timestamp = normalize_timestamp(timestamp, self.dt14);

        if self.dedup.observe(target.identifier.as_str(), &timestamp) {
            trace!("suppressing duplicate capture of {}", target.identifier);
            return None;
        }

        let outlinks = payload
            .as_ref()
            .and_then(|p| p.pointer(LINKS_POINTER))
            .and_then(Value::as_array)
            .map(|links| self.canonical_outlinks(&target, links))
            .unwrap_or_default();

        Some(LinkRecord {
            source: target.identifier,
            timestamp,
            outlinks,
        })
    }

    fn canonical_outlinks(
        &self,
        target: &Canonical,
        links: &[Value],
    ) -> Vec<crate::canon::Identifier> {
        links
            .iter()
            // Empty outlink elements happen in the wild, likely a quirk of the
            // WAT extraction tool; they are dropped one by one.
            .filter_map(|link| link.get("url").and_then(Value::as_str))
            .filter_map(|raw| match self.canon.canonicalize(raw, Some(&target.url)) {
                Ok(canonical) => Some(canonical.identifier),
                Err(reject) => {
                    trace!("dropping outlink {raw:?}: {reject}");
                    None
                }
            })
            .collect()
    }
}

impl<R: BufRead> Iterator for WatLinkRecords<R> {
    type Item = Result<LinkRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e)),
            };
            if let Some(link_record) = self.record_to_link_record(&record) {
                return Some(Ok(link_record));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    fn wat_record(record_type: &str, target: &str, payload: &Value) -> Vec<u8> {
        let body = payload.to_string();
        format!(
            "WARC/1.0\r\n\
             WARC-Type: {record_type}\r\n\
             WARC-Target-URI: {target}\r\n\
             Content-Length: {}\r\n\
             \r\n\
             {body}\r\n\r\n",
            body.len()
        )
        .into_bytes()
    }

    fn envelope(date: &str, urls: &[&str]) -> Value {
        json!({
            "Envelope": {
                "WARC-Header-Metadata": { "WARC-Date": date },
                "Payload-Metadata": {
                    "HTTP-Response-Metadata": {
                        "HTML-Metadata": {
                            "Links": urls.iter().map(|u| json!({"url": u})).collect::<Vec<_>>()
                        }
                    }
                }
            }
        })
    }

    fn parse_all(bytes: Vec<u8>, dt14: bool) -> Vec<LinkRecord> {
        WatLinkRecords::new(
            WarcReader::new(Cursor::new(bytes)),
            Canonicalizer::default(),
            dt14,
            DedupState::default(),
        )
        .collect::<Result<_, _>>()
        .unwrap()
    }

    #[test]
    fn emits_link_record_with_resolved_outlinks() {
        let payload = envelope("2020-01-02T03:04:05Z", &["/a", "http://other.org/b"]);
        let records = parse_all(wat_record("metadata", "http://example.com/page", &payload), false);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.source.as_str(), "com,example,//http:/page");
        assert_eq!(record.timestamp, "2020-01-02T03:04:05Z");
        assert_eq!(
            record
                .outlinks
                .iter()
                .map(|o| o.as_str())
                .collect::<Vec<_>>(),
            vec!["com,example,//http:/a", "org,other,//http:/b"]
        );
    }

    #[test]
    fn non_metadata_records_are_skipped() {
        let payload = envelope("2020-01-02T03:04:05Z", &["/a"]);
        let mut bytes = wat_record("warcinfo", "http://example.com/", &payload);
        bytes.extend(wat_record("response", "http://example.com/", &payload));
        assert!(parse_all(bytes, false).is_empty());
    }

    #[test]
    fn rejected_target_uri_skips_the_whole_record() {
        let payload = envelope("2020-01-02T03:04:05Z", &["/a"]);
        let bytes = wat_record("metadata", "ftp://example.com/page", &payload);
        assert!(parse_all(bytes, false).is_empty());
    }

    #[test]
    fn malformed_payload_means_empty_outlinks() {
        let bytes = b"WARC/1.0\r\n\
             WARC-Type: metadata\r\n\
             WARC-Target-URI: http://example.com/\r\n\
             Content-Length: 8\r\n\
             \r\n\
             not-json\r\n\r\n"
            .to_vec();

        let records = parse_all(bytes, false);
        assert_eq!(records.len(), 1);
        assert!(records[0].outlinks.is_empty());
        assert_eq!(records[0].timestamp, "");
    }

    #[test]
    fn bad_outlink_never_aborts_the_record() {
        let payload = envelope(
            "2020-01-02T03:04:05Z",
            &["mailto:x@example.com", "/kept", "javascript:void(0)"],
        );
        let records = parse_all(wat_record("metadata", "http://example.com/", &payload), false);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outlinks.len(), 1);
        assert_eq!(records[0].outlinks[0].as_str(), "com,example,//http:/kept");
    }

    #[test]
    fn consecutive_duplicate_captures_are_suppressed() {
        let payload = envelope("2020-01-02T03:04:05Z", &["/a"]);
        let mut bytes = wat_record("metadata", "http://example.com/page", &payload);
        bytes.extend(wat_record("metadata", "http://example.com/page", &payload));
        let later = envelope("2020-01-02T03:09:05Z", &["/a"]);
        bytes.extend(wat_record("metadata", "http://example.com/page", &later));

        let records = parse_all(bytes, false);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, "2020-01-02T03:04:05Z");
        assert_eq!(records[1].timestamp, "2020-01-02T03:09:05Z");
    }

    #[test]
    fn dedup_state_can_be_carried_across_files() {
        let payload = envelope("2020-01-02T03:04:05Z", &[]);
        let first = wat_record("metadata", "http://example.com/page", &payload);
        let second = wat_record("metadata", "http://example.com/page", &payload);

        let mut parser = WatLinkRecords::new(
            WarcReader::new(Cursor::new(first)),
            Canonicalizer::default(),
            false,
            DedupState::default(),
        );
        assert_eq!(parser.by_ref().count(), 1);
        let carried = parser.into_dedup();

        // Legacy run-scoped mode: the repeat in the next file is suppressed.
        let mut continued = WatLinkRecords::new(
            WarcReader::new(Cursor::new(second.clone())),
            Canonicalizer::default(),
            false,
            carried,
        );
        assert_eq!(continued.by_ref().count(), 0);

        // Default per-file mode: a fresh state lets it through.
        let fresh = WatLinkRecords::new(
            WarcReader::new(Cursor::new(second)),
            Canonicalizer::default(),
            false,
            DedupState::default(),
        );
        assert_eq!(fresh.count(), 1);
    }

    #[test]
    fn dt14_reformats_envelope_date() {
        let payload = envelope("2020-01-02T03:04:05Z", &[]);
        let records = parse_all(wat_record("metadata", "http://example.com/", &payload), true);
        assert_eq!(records[0].timestamp, "20200102030405");
    }
}
