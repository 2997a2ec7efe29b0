//! Text parsing for the kinematics store
use std::collections::HashMap;
use std::str;

use crate::data::{EventSummary, ParticleFlags, ParticleRecord, RunContext, XmlTree};
use crate::error::StoreError;
use crate::status::Mechanism;
use crate::tags::*;

pub type XmlAttr = HashMap<String, String>;

pub(crate) fn parse_version(first_line: &str) -> Result<&'static str, StoreError> {
    use StoreError::*;
    let mut line_entries = first_line.trim().split('"');
    if line_entries.next() != Some(STORE_TAG_OPEN) {
        return Err(BadFirstLine(first_line.to_owned()));
    };
    let version = match line_entries.next() {
        Some(VERSION) => VERSION,
        Some(version) => return Err(UnsupportedVersion(version.to_owned())),
        None => return Err(MissingVersion),
    };
    if line_entries.next() != Some(">") {
        return Err(BadFirstLine(first_line.to_owned()));
    };
    Ok(version)
}

/// Whether `line` closes a header block that started with `first`
pub(crate) fn is_header_end(first: &str, line: &str) -> bool {
    // nested elements are indented, only the outermost closing tag starts the line
    line.trim_end() == HEADER_END || (first == line && line.trim_end().ends_with(HEADER_END))
}

pub(crate) fn parse_header(text: &str) -> Result<RunContext, StoreError> {
    let header =
        XmlTree::parse(text.as_bytes()).map_err(|err| StoreError::Xml(err.to_string()))?;
    let run = parse(RUN_ATTR, header.attributes.get(RUN_ATTR).map(String::as_str))?;
    let folder = header
        .attributes
        .get(FOLDER_ATTR)
        .cloned()
        .unwrap_or_else(|| RunContext::DEFAULT_FOLDER.to_owned());
    let info = header
        .children
        .into_iter()
        .find_map(|node| node.as_element().cloned());
    Ok(RunContext { run, folder, info })
}

fn parse<T>(name: &'static str, text: Option<&str>) -> Result<T, StoreError>
where
    T: str::FromStr,
{
    let text = text.ok_or(StoreError::MissingEntry(name))?;
    text.parse::<T>()
        .map_err(|_| StoreError::ConversionError(text.to_owned()))
}

fn parse_float(name: &'static str, text: Option<&str>) -> Result<f64, StoreError> {
    let text = text.ok_or(StoreError::MissingEntry(name))?;
    fast_float::parse(text).map_err(|_| StoreError::ConversionError(text.to_owned()))
}

fn parse_lineage(name: &'static str, text: Option<&str>) -> Result<Option<usize>, StoreError> {
    let label: i64 = parse(name, text)?;
    match label {
        -1 => Ok(None),
        label if label >= 0 => Ok(Some(label as usize)),
        _ => Err(StoreError::ConversionError(label.to_string())),
    }
}

pub(crate) fn parse_record(line: &str) -> Result<ParticleRecord, StoreError> {
    let mut entries = line.split_whitespace();
    let label = parse("label", entries.next())?;
    let pdg = parse("pdg", entries.next())?;
    let status = parse("status", entries.next())?;
    let mechanism = Mechanism(parse("mechanism", entries.next())?);
    let mother = parse_lineage("mother", entries.next())?;
    let first_daughter = parse_lineage("first daughter", entries.next())?;
    let last_daughter = parse_lineage("last daughter", entries.next())?;
    let flags = ParticleFlags::from_bits(parse("flags", entries.next())?);
    let momentum = [
        parse_float("px", entries.next())?,
        parse_float("py", entries.next())?,
        parse_float("pz", entries.next())?,
        parse_float("E", entries.next())?,
    ];
    let vertex = [
        parse_float("vx", entries.next())?,
        parse_float("vy", entries.next())?,
        parse_float("vz", entries.next())?,
    ];
    let tof = parse_float("tof", entries.next())?;
    let polarisation = [
        parse_float("polarisation x", entries.next())?,
        parse_float("polarisation y", entries.next())?,
        parse_float("polarisation z", entries.next())?,
    ];
    let weight = parse_float("weight", entries.next())?;
    if entries.next().is_some() {
        return Err(StoreError::BadLine(line.to_owned()));
    }
    Ok(ParticleRecord {
        label,
        pdg,
        status,
        mechanism,
        momentum,
        vertex,
        tof,
        polarisation,
        weight,
        mother,
        first_daughter,
        last_daughter,
        flags,
    })
}

pub(crate) fn parse_event_start(line: &str) -> Result<usize, StoreError> {
    let attr = extract_xml_attr(line)?;
    parse(NUMBER_ATTR, attr.get(NUMBER_ATTR).map(String::as_str))
}

pub(crate) fn parse_summary(line: &str, number: usize) -> Result<EventSummary, StoreError> {
    let attr = extract_xml_attr(line)?;
    let n_track = parse(NTRACK_ATTR, attr.get(NTRACK_ATTR).map(String::as_str))?;
    let n_primary = parse(NPRIMARY_ATTR, attr.get(NPRIMARY_ATTR).map(String::as_str))?;
    if n_primary > n_track {
        return Err(StoreError::InconsistentSummary { n_track, n_primary });
    }
    Ok(EventSummary {
        number,
        n_track,
        n_primary,
    })
}

fn extract_xml_attr_str(xml_tag: &str) -> Result<&str, StoreError> {
    let tag = xml_tag.trim();
    let tag = tag
        .strip_suffix('>')
        .ok_or_else(|| StoreError::BadLine(xml_tag.to_owned()))?;
    let tag = tag.strip_suffix('/').unwrap_or(tag);
    match tag.find(char::is_whitespace) {
        None => Ok(""),
        Some(idx) => Ok(tag[idx + 1..].trim_start()),
    }
}

struct Attr<'a> {
    name: &'a str,
    value: &'a str,
}

fn next_attr(attr_str: &str) -> Result<(Option<Attr<'_>>, &str), StoreError> {
    let bad_tag = || StoreError::BadLine(attr_str.to_owned());
    let mut rem = attr_str;
    let name = match rem.find(|c: char| c.is_whitespace() || c == '=') {
        None => return Ok((None, rem)),
        Some(idx) => &rem[..idx],
    };
    rem = rem[name.len()..].trim_start();
    rem = rem.strip_prefix('=').ok_or_else(bad_tag)?.trim_start();
    let quote = match rem.chars().next() {
        Some(quote @ ('\'' | '"')) => quote,
        _ => return Err(bad_tag()),
    };
    rem = &rem[1..];
    let value = match rem.find(quote) {
        Some(idx) => &rem[..idx],
        None => return Err(bad_tag()),
    };
    rem = rem[value.len() + 1..].trim_start();
    Ok((Some(Attr { name, value }), rem))
}

pub(crate) fn extract_xml_attr(xml_tag: &str) -> Result<XmlAttr, StoreError> {
    let mut attr_str = extract_xml_attr_str(xml_tag)?;
    let mut attr = XmlAttr::new();
    loop {
        let (parsed, rem) = next_attr(attr_str)?;
        match parsed {
            None => return Ok(attr),
            Some(next_attr) => {
                attr.insert(next_attr.name.to_owned(), next_attr.value.to_owned());
            }
        };
        attr_str = rem;
    }
}
