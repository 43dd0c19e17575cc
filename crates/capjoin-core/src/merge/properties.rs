use pcap_parser::Linktype;

use super::MergeError;
use crate::sink::CaptureHeader;
use crate::source::SourceProperties;

/// Running global snaplen and link type across admitted inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureProperties {
    snaplen: u32,
    linktype: Option<Linktype>,
}

impl CaptureProperties {
    pub fn snaplen(&self) -> u32 {
        self.snaplen
    }

    pub fn linktype(&self) -> Option<Linktype> {
        self.linktype
    }

    /// Fold one input's properties into the global ones.
    ///
    /// # Errors
    /// Returns `MergeError::LinktypeMismatch` when `input` uses a different
    /// link type than the first admitted input. Nothing is updated then.
    pub fn reconcile(&mut self, input: &str, properties: SourceProperties) -> Result<(), MergeError> {
        match self.linktype {
            None => self.linktype = Some(properties.linktype),
            Some(expected) if expected != properties.linktype => {
                return Err(MergeError::LinktypeMismatch {
                    input: input.to_string(),
                    expected,
                    found: properties.linktype,
                });
            }
            Some(_) => {}
        }
        self.snaplen = self.snaplen.max(properties.snaplen);
        Ok(())
    }

    /// Header for the merged output; an empty merge is written as `NULL`.
    pub fn header(&self) -> CaptureHeader {
        CaptureHeader {
            snaplen: self.snaplen,
            linktype: self.linktype.unwrap_or(Linktype::NULL),
        }
    }
}
