use log::warn;
use serde::Serialize;

use intel_fit::fit::{Fit, entry::FitEntry};

/// One line of JSON output
#[derive(Serialize)]
struct Record<'a> {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<&'a str>,
    type_name: String,
    #[serde(flatten)]
    entry: &'a FitEntry,
    image_offset: Option<usize>,
}

impl<'a> Record<'a> {
    fn new(index: usize, entry: &'a FitEntry, image_len: usize) -> Self {
        Self {
            index,
            signature: None,
            type_name: entry.entry_type.to_string(),
            entry,
            image_offset: entry.image_offset(image_len),
        }
    }
}

fn print_fit(fit: &Fit, image_len: usize) {
    println!("FIT @ {:08x}, {}", fit.offset, fit.header);
    for (i, e) in fit.entries.iter().enumerate() {
        println!("  {e}");
        if e.image_offset(image_len).is_none() {
            warn!("Entry {} points outside of the image", i + 1);
        }
    }
}

pub fn show(fit: &Fit, image_len: usize, verbose: bool) {
    if verbose {
        println!("{fit:#02x?}");
    }
    println!();
    print_fit(fit, image_len);
    println!();
}

/// The header first, then every entry, one JSON object each.
pub fn json_lines(fit: &Fit, image_len: usize) -> Result<Vec<String>, serde_json::Error> {
    let mut header = Record::new(0, &fit.header.entry, image_len);
    header.signature = Some(fit.header.signature.as_str());
    // The header has no data of its own.
    header.image_offset = None;

    let entries = fit
        .entries
        .iter()
        .enumerate()
        .map(|(i, e)| Record::new(i + 1, e, image_len));

    std::iter::once(header)
        .chain(entries)
        .map(|r| serde_json::to_string(&r))
        .collect()
}

pub fn json(fit: &Fit, image_len: usize) -> Result<(), serde_json::Error> {
    for l in json_lines(fit, image_len)? {
        println!("{l}");
    }
    Ok(())
}

#[cfg(test)]
static DATA: &[u8] = include_bytes!("../tests/fit.bin");

#[test]
fn json_records() {
    let fit = Fit::parse(DATA).unwrap();
    let lines = json_lines(&fit, DATA.len()).unwrap();
    assert_eq!(lines.len(), fit.entry_count());

    let h: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(h["index"], 0);
    assert_eq!(h["signature"], "_FIT_   ");
    assert_eq!(h["type_name"], "FIT_HEADER");
    assert_eq!(h["size"], 5);
    assert!(h["image_offset"].is_null());

    let e: serde_json::Value = serde_json::from_str(&lines[4]).unwrap();
    assert_eq!(e["index"], 4);
    assert!(e.get("signature").is_none());
    assert_eq!(e["type_name"], "BIOS_STARTUP_MODULE");
    assert_eq!(e["entry_type"], 7);
    assert_eq!(e["checksum_available"], true);
    assert_eq!(e["checksum"], 0x3c);
    assert_eq!(e["address"], 0xa00);
    assert_eq!(e["image_offset"], 0xa00);
}

#[test]
fn entry_round_trip() {
    let fit = Fit::parse(DATA).unwrap();
    let lines = json_lines(&fit, DATA.len()).unwrap();
    // Extra fields are ignored when reading back.
    let e: FitEntry = serde_json::from_str(&lines[1]).unwrap();
    assert_eq!(e, fit.entries[0]);
}
