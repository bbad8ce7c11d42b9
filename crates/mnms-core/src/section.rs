//! Splitting a CLI listing into per-entity records
//!
//! RouterOS `print as-value` output prefixes every listed object with its
//! internal identifier, written as `.id=*N`. That marker is the only
//! reliable entity boundary, so a section is cut at each occurrence of
//! `.id`; text before the first marker is preamble and is discarded.

use crate::record::Record;

/// Literal that starts every entity in a listing
pub const IDENTITY_MARKER: &str = ".id";

/// Iterate over the entity chunks of a section, in source order.
///
/// Each chunk starts at the marker with its leading `.` dropped, so the
/// identifier surfaces as an ordinary `id=...` field when tokenized.
pub fn entity_chunks(section: &str) -> impl Iterator<Item = &str> + '_ {
    let starts: Vec<usize> = section
        .match_indices(IDENTITY_MARKER)
        .map(|(pos, _)| pos)
        .collect();

    let ends: Vec<usize> = starts
        .iter()
        .skip(1)
        .copied()
        .chain(std::iter::once(section.len()))
        .collect();

    starts
        .into_iter()
        .zip(ends)
        .map(move |(start, end)| &section[start + 1..end])
}

/// Split a section into one record per entity.
///
/// A section with no marker yields no records, which is how an empty
/// listing (e.g. a device with no ethernet ports) arrives.
pub fn split_section(section: &str) -> Vec<Record> {
    entity_chunks(section).map(Record::tokenize).collect()
}
