//! Text formatting for the kinematics store
use std::fmt::Write;

use itertools::Itertools;
use xmltree::{EmitterConfig, XMLNode};

use crate::data::{EventSummary, ParticleRecord, RunContext, XmlTree};
use crate::error::StoreError;
use crate::tags::*;

/// Accumulates one block of output before it is written in one go
#[derive(Debug, Default)]
pub(crate) struct Block {
    text: String,
}

impl Block {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    fn write(&mut self, text: &str) {
        self.text.push_str(text)
    }

    fn write_field<T: std::fmt::Display>(&mut self, field: T) {
        // writing into a String cannot fail
        let _ = write!(self.text, "{} ", field);
    }

    pub(crate) fn first_line(&mut self) {
        let output = [STORE_TAG_OPEN, "\"", VERSION, "\">\n"];
        for text in &output {
            self.write(text)
        }
    }

    pub(crate) fn header(&mut self, context: &RunContext) -> Result<(), StoreError> {
        let mut header = XmlTree::new(HEADER_TAG);
        header
            .attributes
            .insert(RUN_ATTR.to_owned(), context.run.to_string());
        header
            .attributes
            .insert(FOLDER_ATTR.to_owned(), context.folder.clone());
        if let Some(info) = &context.info {
            header.children.push(XMLNode::Element(info.clone()));
        }
        let config = EmitterConfig::new()
            .write_document_declaration(false)
            .normalize_empty_elements(false)
            .perform_indent(true);
        let mut xml = Vec::new();
        header
            .write_with_config(&mut xml, config)
            .map_err(|err| StoreError::Xml(err.to_string()))?;
        let xml = String::from_utf8(xml).map_err(|err| StoreError::Xml(err.to_string()))?;
        self.write(xml.trim_end());
        self.write("\n");
        Ok(())
    }

    pub(crate) fn event_start(&mut self, number: usize) {
        let _ = writeln!(self.text, "{} {}=\"{}\">", EVENT_START, NUMBER_ATTR, number);
    }

    pub(crate) fn event_end(&mut self, summary: &EventSummary) {
        let _ = writeln!(
            self.text,
            "{} {}=\"{}\" {}=\"{}\"/>",
            SUMMARY_START, NTRACK_ATTR, summary.n_track, NPRIMARY_ATTR, summary.n_primary
        );
        self.write(EVENT_END);
        self.write("\n");
    }

    pub(crate) fn last_line(&mut self) {
        self.write(STORE_LAST_LINE);
        self.write("\n");
    }

    pub(crate) fn record(&mut self, record: &ParticleRecord) {
        let lineage = |label: Option<usize>| label.map_or(-1, |l| l as i64);
        self.write_field(record.label);
        self.write_field(record.pdg);
        self.write_field(record.status);
        self.write_field(record.mechanism.0);
        self.write_field(lineage(record.mother));
        self.write_field(lineage(record.first_daughter));
        self.write_field(lineage(record.last_daughter));
        self.write_field(record.flags.bits());
        let floats = record
            .momentum
            .iter()
            .chain(&record.vertex)
            .chain(std::iter::once(&record.tof))
            .chain(&record.polarisation)
            .chain(std::iter::once(&record.weight));
        let floats = floats
            .map(|&x| {
                let mut buffer = ryu::Buffer::new();
                buffer.format(x).to_owned()
            })
            .join(" ");
        self.write(&floats);
        self.write("\n");
    }

    #[cfg(test)]
    pub(crate) fn text(&self) -> &str {
        &self.text
    }
}
