use std::io::BufRead;

use tracing::{debug, trace};
use url::Url;

use super::{normalize_timestamp, ParseError};
use crate::canon::{Canonicalizer, Identifier};
use crate::event::LinkRecord;

/// Streaming group-by over pre-sorted `identifier,timestamp,outlink` lines:
/// outlinks accumulate while consecutive lines share the (identifier,
/// timestamp) key and a LinkRecord is emitted the moment the key changes or
/// the file ends.
///
/// Precondition: input is sorted by (identifier, timestamp). Out-of-order
/// input silently produces one record per contiguous run of the key; the
/// parser does not detect or repair that.
pub struct CsvLinkRecords<R> {
    input: R,
    canon: Canonicalizer,
    dt14: bool,
    state: GroupState,
    line: String,
    line_no: u64,
    done: bool,
}

enum GroupState {
    Idle,
    Active(Group),
    /// The group's identifier was rejected; its remaining lines are skipped.
    Rejected {
        key: (String, String),
    },
}

struct Group {
    key: (String, String),
    base: Url,
    source: Identifier,
    timestamp: String,
    outlinks: Vec<Identifier>,
}

impl Group {
    fn push_outlink(&mut self, raw: &str, canon: &Canonicalizer) {
        match canon.canonicalize(raw, Some(&self.base)) {
            Ok(canonical) => self.outlinks.push(canonical.identifier),
            Err(reject) => trace!("dropping outlink {raw:?}: {reject}"),
        }
    }

    fn into_record(self) -> LinkRecord {
        LinkRecord {
            source: self.source,
            timestamp: self.timestamp,
            outlinks: self.outlinks,
        }
    }
}

impl<R: BufRead> CsvLinkRecords<R> {
    pub fn new(input: R, canon: Canonicalizer, dt14: bool) -> Self {
        Self {
            input,
            canon,
            dt14,
            state: GroupState::Idle,
            line: String::new(),
            line_no: 0,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for CsvLinkRecords<R> {
    type Item = Result<LinkRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            self.line.clear();
            match self.input.read_line(&mut self.line) {
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                Ok(0) => {
                    self.done = true;
                    return match std::mem::replace(&mut self.state, GroupState::Idle) {
                        GroupState::Active(group) => Some(Ok(group.into_record())),
                        _ => None,
                    };
                }
                Ok(_) => {}
            }
            self.line_no += 1;

            let trimmed = self.line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() {
                continue;
            }

            // The outlink column is the remainder, URLs may themselves
            // contain commas. No quoting or escaping is supported.
            let mut fields = trimmed.splitn(3, ',');
            let (Some(identifier), Some(raw_ts), Some(outlink)) =
                (fields.next(), fields.next(), fields.next())
            else {
                debug!("skipping malformed csv line {}", self.line_no);
                continue;
            };
            let outlink = outlink.trim_end();
            let timestamp = normalize_timestamp(raw_ts, self.dt14);
            let key = (identifier.to_string(), timestamp.clone());

            match &mut self.state {
                GroupState::Active(group) if group.key == key => {
                    group.push_outlink(outlink, &self.canon);
                    continue;
                }
                GroupState::Rejected { key: rejected } if *rejected == key => continue,
                _ => {}
            }

            // Key change: open the next group, then emit the finished one.
            let next_state = match self.canon.canonicalize(identifier, None) {
                Ok(canonical) => {
                    let mut group = Group {
                        key,
                        base: canonical.url,
                        source: canonical.identifier,
                        timestamp,
                        outlinks: Vec::new(),
                    };
                    group.push_outlink(outlink, &self.canon);
                    GroupState::Active(group)
                }
                Err(reject) => {
                    debug!("skipping record group at line {}: {reject}", self.line_no);
                    GroupState::Rejected { key }
                }
            };

            match std::mem::replace(&mut self.state, next_state) {
                GroupState::Active(group) => return Some(Ok(group.into_record())),
                _ => continue,
            }
        }
    }
}
