//! UniProtKB flat-record (`format=txt`) parsing.
//!
//! A response is a run of records, each closed by a `//` line. Every line
//! carries a two-letter tag in columns 1-2 and content from column 6; residue
//! lines under `SQ` have a blank tag. Only the fields this crate needs are
//! extracted, plus the `VAR_SEQ` features and the `ALTERNATIVE PRODUCTS`
//! block used to rebuild isoform sequences.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

static VAR_SEQ_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^VAR_SEQ\s+(\d+)(?:\.\.(\d+)|\s+(\d+))?(?:\s+(.*))?$").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoTerm {
    pub id: String,
    pub term: Option<String>,
}

/// Replace residues `start..=end` (1-based, canonical coordinates) with
/// `replacement`. An empty replacement deletes the range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsoformEdit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

impl IsoformEdit {
    pub fn new(start: usize, end: usize, replacement: impl Into<String>) -> Self {
        Self {
            start,
            end,
            replacement: replacement.into(),
        }
    }
}

/// One `VAR_SEQ` feature as written in the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceVariant {
    pub feature_id: Option<String>,
    pub start: usize,
    pub end: usize,
    pub original: Option<String>,
    pub replacement: String,
    /// Isoform names from the `(in isoform ...)` note.
    pub isoforms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "features", rename_all = "snake_case")]
pub enum IsoformSequence {
    Displayed,
    Described(Vec<String>),
    External,
    NotDescribed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Isoform {
    pub name: String,
    pub isoform_id: Option<String>,
    pub sequence_ref: IsoformSequence,
    /// Edits accepted for reconstruction, in descending start order.
    pub edits: Vec<IsoformEdit>,
    /// `None` when the isoform is external or not described.
    pub sequence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub accession: String,
    pub entry_name: String,
    pub secondary_accessions: Vec<String>,
    pub is_reviewed: bool,
    pub length: Option<usize>,
    pub organism: Option<String>,
    pub description: String,
    pub gene: Option<String>,
    pub sequence: String,
    pub go_terms: Vec<GoTerm>,
    pub pdb: Vec<String>,
    pub refseq: Vec<String>,
    pub kegg: Vec<String>,
    pub pfam: Vec<String>,
    pub comment: String,
    pub variants: Vec<SequenceVariant>,
    pub isoforms: Vec<Isoform>,
}

impl MetadataRecord {
    /// Primary accession first, then secondaries.
    pub fn accessions(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.accession.as_str())
            .chain(self.secondary_accessions.iter().map(String::as_str))
    }

    /// Looks an isoform up by name (`2`) or isoform id (`P04637-2`).
    pub fn isoform(&self, key: &str) -> Option<&Isoform> {
        self.isoforms
            .iter()
            .find(|iso| iso.name == key || iso.isoform_id.as_deref() == Some(key))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum ParseWarning {
    #[error("record #{index} ({entry}) skipped: {reason}")]
    MalformedRecord {
        index: usize,
        entry: String,
        reason: String,
    },

    #[error("{accession}: unparsable VAR_SEQ feature: {text}")]
    UnparsableFeature { accession: String, text: String },

    #[error("{accession}: edit {start}-{end} refers to unknown isoform {isoform}")]
    DanglingIsoform {
        accession: String,
        isoform: String,
        start: usize,
        end: usize,
    },

    #[error("{accession} isoform {isoform}: edit {start}-{end} outside sequence of length {length}")]
    EditOutOfRange {
        accession: String,
        isoform: String,
        start: usize,
        end: usize,
        length: usize,
    },

    #[error("{accession}: edit {start}-{end} expects {expected} but sequence has {found}")]
    EditMismatch {
        accession: String,
        start: usize,
        end: usize,
        expected: String,
        found: String,
    },

    #[error("{accession} isoform {isoform}: edit {start}-{end} overlaps edit starting at {other_start}")]
    OverlappingEdit {
        accession: String,
        isoform: String,
        start: usize,
        end: usize,
        other_start: usize,
    },

    #[error("{accession} isoform {isoform}: listed feature {feature_id} has no VAR_SEQ entry")]
    UnknownFeature {
        accession: String,
        isoform: String,
        feature_id: String,
    },

    #[error("{accession} isoform {isoform}: edit {start}-{end} skipped, canonical sequence is not ASCII")]
    NonAsciiSequence {
        accession: String,
        isoform: String,
        start: usize,
        end: usize,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseReport {
    pub records: BTreeMap<String, MetadataRecord>,
    pub warnings: Vec<ParseWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditRejection {
    OutOfRange { length: usize },
    Overlap { other_start: usize },
    NonAscii,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconstruction {
    pub sequence: String,
    /// Edits that were applied, in application (descending start) order.
    pub applied: Vec<IsoformEdit>,
    pub rejected: Vec<(IsoformEdit, EditRejection)>,
}

/// Applies `edits` to `canonical` in descending start order.
///
/// Each edit is applied to the right of every edit applied before it, so its
/// canonical coordinates still address the same residues. Edits outside
/// `1..=len` or overlapping an already applied edit are rejected and the rest
/// still apply. Residues are single ASCII letters; a sequence with anything
/// else is returned unchanged with every edit rejected.
pub fn reconstruct(canonical: &str, edits: &[IsoformEdit]) -> Reconstruction {
    let mut ordered: Vec<&IsoformEdit> = edits.iter().collect();
    ordered.sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));

    let length = canonical.len();
    let mut result = Reconstruction {
        sequence: canonical.to_string(),
        ..Reconstruction::default()
    };
    if !canonical.is_ascii() {
        result.rejected = ordered
            .into_iter()
            .map(|edit| (edit.clone(), EditRejection::NonAscii))
            .collect();
        return result;
    }
    let mut leftmost_applied: Option<usize> = None;
    for edit in ordered {
        if edit.start == 0 || edit.end < edit.start || edit.end > length {
            result
                .rejected
                .push((edit.clone(), EditRejection::OutOfRange { length }));
            continue;
        }
        if let Some(other_start) = leftmost_applied {
            if edit.end >= other_start {
                result
                    .rejected
                    .push((edit.clone(), EditRejection::Overlap { other_start }));
                continue;
            }
        }
        result
            .sequence
            .replace_range(edit.start - 1..edit.end, &edit.replacement);
        leftmost_applied = Some(edit.start);
        result.applied.push(edit.clone());
    }
    result
}

/// Parses every `//`-terminated record in `raw`. Malformed records and bad
/// isoform edits become warnings; they never fail the batch.
pub fn parse(raw: &str) -> ParseReport {
    let mut report = ParseReport::default();
    let mut lines: Vec<&str> = Vec::new();
    let mut index = 0usize;
    for line in raw.lines() {
        if line.starts_with("//") {
            if !lines.is_empty() {
                parse_record(index, &lines, &mut report);
                index += 1;
            }
            lines.clear();
            continue;
        }
        if lines.is_empty() && line.trim().is_empty() {
            continue;
        }
        lines.push(line);
    }
    if !lines.is_empty() {
        let entry = lines
            .iter()
            .find_map(|line| line.strip_prefix("ID"))
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or("?")
            .to_string();
        report.warnings.push(ParseWarning::MalformedRecord {
            index,
            entry,
            reason: "missing // terminator".to_string(),
        });
    }
    for warning in &report.warnings {
        warn!("{warning}");
    }
    report
}

fn parse_record(index: usize, lines: &[&str], report: &mut ParseReport) {
    let mut builder = RecordBuilder::default();
    for line in lines {
        builder.push_line(line);
    }
    let entry = builder.entry_name.clone().unwrap_or_else(|| "?".to_string());
    match builder.finish() {
        Ok((record, warnings)) => {
            report.warnings.extend(warnings);
            report.records.insert(record.accession.clone(), record);
        }
        Err(reason) => report.warnings.push(ParseWarning::MalformedRecord {
            index,
            entry,
            reason,
        }),
    }
}

#[derive(Debug, Default)]
struct IsoformDef {
    name: String,
    isoform_id: Option<String>,
    sequence_ref: Option<IsoformSequence>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Qualifier {
    #[default]
    Legacy,
    Note,
    Other,
}

#[derive(Debug, Default)]
struct FeatureBuilder {
    header: String,
    legacy: Vec<String>,
    note: Vec<String>,
    feature_id: Option<String>,
    qualifier: Qualifier,
}

impl FeatureBuilder {
    fn absorb(&mut self, text: &str) {
        if let Some(rest) = text.strip_prefix('/') {
            let (name, value) = rest.split_once('=').unwrap_or((rest, ""));
            match name {
                "note" => {
                    self.qualifier = Qualifier::Note;
                    self.note.push(value.to_string());
                }
                "id" | "FTId" => {
                    self.qualifier = Qualifier::Other;
                    let id = value.trim_matches('"').trim_end_matches('.');
                    self.feature_id = Some(id.to_string());
                }
                _ => self.qualifier = Qualifier::Other,
            }
            return;
        }
        match self.qualifier {
            Qualifier::Legacy => self.legacy.push(text.to_string()),
            Qualifier::Note => self.note.push(text.to_string()),
            Qualifier::Other => {}
        }
    }

    fn build(self) -> Result<SequenceVariant, String> {
        let caps = VAR_SEQ_RE.captures(&self.header).ok_or(self.header.clone())?;
        let start: usize = caps[1].parse().map_err(|_| self.header.clone())?;
        let end = match caps.get(2).or_else(|| caps.get(3)) {
            Some(end) => end.as_str().parse().map_err(|_| self.header.clone())?,
            None => start,
        };
        let description = if self.note.is_empty() {
            let mut parts: Vec<String> = caps
                .get(4)
                .map(|m| vec![m.as_str().to_string()])
                .unwrap_or_default();
            parts.extend(self.legacy);
            parts.join(" ")
        } else {
            self.note.join(" ").trim().trim_matches('"').to_string()
        };
        let (original, replacement, isoforms) =
            parse_variant_description(&description).ok_or(self.header.clone())?;
        Ok(SequenceVariant {
            feature_id: self.feature_id,
            start,
            end,
            original,
            replacement,
            isoforms,
        })
    }
}

/// Splits `A -> B (in isoform 2 and isoform 3)` or `Missing (in isoform 2)`.
fn parse_variant_description(
    description: &str,
) -> Option<(Option<String>, String, Vec<String>)> {
    let description = description.trim().trim_end_matches('.');
    let (head, refs) = match (description.find('('), description.rfind(')')) {
        (Some(open), Some(close)) if close > open => {
            (&description[..open], &description[open + 1..close])
        }
        _ => (description, ""),
    };
    let head = head.trim();
    let (original, replacement) = if head.eq_ignore_ascii_case("missing") {
        (None, String::new())
    } else {
        let (from, to) = head.split_once("->")?;
        let from = residues(from);
        let to = residues(to);
        if to.is_empty() {
            return None;
        }
        ((!from.is_empty()).then_some(from), to)
    };

    let tokens: Vec<&str> = refs
        .split(|ch: char| ch.is_whitespace() || ch == ',')
        .filter(|token| !token.is_empty())
        .collect();
    let mut isoforms = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if token.eq_ignore_ascii_case("isoform") {
            if let Some(name) = tokens.get(i + 1) {
                isoforms.push(name.to_string());
            }
        }
    }
    Some((original, replacement, isoforms))
}

fn residues(text: &str) -> String {
    text.chars().filter(|ch| ch.is_ascii_alphabetic()).collect()
}

/// Drops a trailing `{ECO:...}` evidence block.
fn strip_evidence(value: &str) -> String {
    let value = match value.find('{') {
        Some(pos) => &value[..pos],
        None => value,
    };
    value.trim().trim_end_matches([';', ',']).trim().to_string()
}

fn parse_sequence_ref(value: &str) -> IsoformSequence {
    let value = strip_evidence(value);
    match value.as_str() {
        "Displayed" => IsoformSequence::Displayed,
        "External" => IsoformSequence::External,
        "Not described" => IsoformSequence::NotDescribed,
        _ => IsoformSequence::Described(split_feature_ids(&value)),
    }
}

fn split_feature_ids(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|id| id.trim().trim_end_matches(';'))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Default)]
struct RecordBuilder {
    tag: String,
    entry_name: Option<String>,
    is_reviewed: bool,
    length: Option<usize>,
    accessions: Vec<String>,
    organism: Vec<String>,
    descriptions: Vec<String>,
    gene: Option<String>,
    comment: Vec<String>,
    in_alt_products: bool,
    in_copyright: bool,
    sequence_list_open: bool,
    isoforms: Vec<IsoformDef>,
    go_terms: Vec<GoTerm>,
    pdb: Vec<String>,
    refseq: Vec<String>,
    kegg: Vec<String>,
    pfam: Vec<String>,
    sequence: String,
    current: Option<FeatureBuilder>,
    features: Vec<FeatureBuilder>,
}

impl RecordBuilder {
    fn push_line(&mut self, line: &str) {
        let head = line.get(..5).unwrap_or(line).trim();
        if !head.is_empty() {
            self.tag = head.to_string();
        }
        let content = line.get(5..).unwrap_or("");
        match self.tag.as_str() {
            "ID" => self.id_line(content),
            "AC" => self.accessions.extend(
                content
                    .split(';')
                    .map(str::trim)
                    .filter(|acc| !acc.is_empty())
                    .map(str::to_string),
            ),
            "OS" => self.organism.push(content.trim().to_string()),
            "DE" => self.descriptions.push(content.trim().to_string()),
            "GN" => self.gene_line(content),
            "CC" => self.comment_line(content.trim()),
            "DR" => self.xref_line(content),
            "FT" => self.feature_line(content),
            "SQ" => {
                if !head.is_empty() {
                    return;
                }
                self.sequence
                    .extend(content.chars().filter(|ch| ch.is_ascii_alphabetic()));
            }
            _ => {}
        }
    }

    fn id_line(&mut self, content: &str) {
        if self.entry_name.is_some() {
            return;
        }
        let words: Vec<&str> = content.split_whitespace().collect();
        let Some(name) = words.first() else {
            return;
        };
        self.entry_name = Some(name.trim_end_matches(';').to_string());
        // pre-2004 records say STANDARD where current ones say Reviewed
        self.is_reviewed = words
            .get(1)
            .is_some_and(|w| w.starts_with("Reviewed") || w.starts_with("STANDARD"));
        self.length = words
            .windows(2)
            .find(|pair| pair[1].starts_with("AA"))
            .and_then(|pair| pair[0].parse().ok());
    }

    fn gene_line(&mut self, content: &str) {
        if self.gene.is_some() {
            return;
        }
        let fields: Vec<&str> = content.split(';').map(str::trim).collect();
        let named = fields.iter().find_map(|field| field.strip_prefix("Name="));
        let fallback = fields.iter().find_map(|field| {
            field
                .strip_prefix("OrderedLocusNames=")
                .or_else(|| field.strip_prefix("ORFNames="))
        });
        if let Some(value) = named.or(fallback) {
            let first = value.split(',').next().unwrap_or(value);
            self.gene = Some(strip_evidence(first));
        }
    }

    fn comment_line(&mut self, text: &str) {
        if text.starts_with("-----") {
            self.in_copyright = !self.in_copyright;
            return;
        }
        if self.in_copyright {
            return;
        }
        if let Some(topic) = text.strip_prefix("-!-") {
            self.in_alt_products = topic.trim_start().starts_with("ALTERNATIVE PRODUCTS");
            self.sequence_list_open = false;
        }
        self.comment.push(text.to_string());
        if self.in_alt_products {
            self.isoform_line(text);
        }
    }

    fn isoform_line(&mut self, text: &str) {
        if self.sequence_list_open {
            let (more, _) = text.split_once(';').unwrap_or((text, ""));
            if let Some(IsoformSequence::Described(ids)) = self
                .isoforms
                .last_mut()
                .and_then(|def| def.sequence_ref.as_mut())
            {
                ids.extend(split_feature_ids(more));
            }
            self.sequence_list_open = text.trim_end().ends_with(',');
            return;
        }
        for field in text.split(';').map(str::trim) {
            if let Some(name) = field.strip_prefix("Name=") {
                self.isoforms.push(IsoformDef {
                    name: strip_evidence(name),
                    ..IsoformDef::default()
                });
            } else if let Some(ids) = field.strip_prefix("IsoId=") {
                if let Some(def) = self.isoforms.last_mut() {
                    def.isoform_id = ids.split(',').next().map(strip_evidence);
                }
            } else if let Some(value) = field.strip_prefix("Sequence=") {
                if let Some(def) = self.isoforms.last_mut() {
                    def.sequence_ref = Some(parse_sequence_ref(value));
                }
                self.sequence_list_open = text.trim_end().ends_with(',');
            }
        }
    }

    fn xref_line(&mut self, content: &str) {
        let fields: Vec<&str> = content.split(';').map(str::trim).collect();
        let Some(db) = fields.first() else {
            return;
        };
        let first = fields.get(1).map(|v| v.trim_end_matches('.')).unwrap_or("");
        match *db {
            "GO" if !first.is_empty() => self.go_terms.push(GoTerm {
                id: first.to_string(),
                term: fields.get(2).map(|t| t.trim_end_matches('.').to_string()),
            }),
            "PDB" if !first.is_empty() => self.pdb.push(first.to_string()),
            "Pfam" if !first.is_empty() => self.pfam.push(first.to_string()),
            "KEGG" if first.len() > 1 => self.kegg.push(first.to_string()),
            "RefSeq" => {
                for field in &fields[1..] {
                    let id = field
                        .split_whitespace()
                        .next()
                        .unwrap_or("")
                        .trim_end_matches('.');
                    if !id.is_empty() && id != "-" {
                        self.refseq.push(id.to_string());
                    }
                }
            }
            _ => {}
        }
    }

    fn feature_line(&mut self, content: &str) {
        if content.starts_with(' ') {
            if let Some(current) = self.current.as_mut() {
                current.absorb(content.trim());
            }
            return;
        }
        if let Some(done) = self.current.take() {
            self.features.push(done);
        }
        let content = content.trim_end();
        if content.starts_with("VAR_SEQ") {
            self.current = Some(FeatureBuilder {
                header: content.to_string(),
                ..FeatureBuilder::default()
            });
        }
    }

    fn description(&self) -> String {
        let names: Vec<String> = self
            .descriptions
            .iter()
            .filter(|line| line.contains("Full=") || line.contains("Short="))
            .filter_map(|line| line.split_once('=').map(|(_, value)| strip_evidence(value)))
            .collect();
        if !names.is_empty() {
            return names.join("; ");
        }
        self.descriptions
            .join(" ")
            .trim()
            .trim_end_matches('.')
            .to_string()
    }

    fn finish(mut self) -> Result<(MetadataRecord, Vec<ParseWarning>), String> {
        let Some(entry_name) = self.entry_name.take() else {
            return Err("missing ID line".to_string());
        };
        if self.accessions.is_empty() {
            return Err("missing AC line".to_string());
        }
        if self.sequence.is_empty() {
            return Err("missing sequence block".to_string());
        }
        if let Some(done) = self.current.take() {
            self.features.push(done);
        }

        let accession = self.accessions.remove(0);
        let mut warnings = Vec::new();
        let mut variants = Vec::new();
        for feature in std::mem::take(&mut self.features) {
            match feature.build() {
                Ok(variant) => variants.push(variant),
                Err(text) => warnings.push(ParseWarning::UnparsableFeature {
                    accession: accession.clone(),
                    text,
                }),
            }
        }
        let isoforms = build_isoforms(
            &accession,
            &self.sequence,
            std::mem::take(&mut self.isoforms),
            &variants,
            &mut warnings,
        );

        let organism = (!self.organism.is_empty()).then(|| {
            self.organism
                .join(" ")
                .trim()
                .trim_end_matches('.')
                .to_string()
        });
        let record = MetadataRecord {
            description: self.description(),
            accession,
            entry_name,
            secondary_accessions: self.accessions,
            is_reviewed: self.is_reviewed,
            length: self.length,
            organism,
            gene: self.gene,
            sequence: self.sequence,
            go_terms: self.go_terms,
            pdb: self.pdb,
            refseq: self.refseq,
            kegg: self.kegg,
            pfam: self.pfam,
            comment: self.comment.join("\n"),
            variants,
            isoforms,
        };
        Ok((record, warnings))
    }
}

fn build_isoforms(
    accession: &str,
    canonical: &str,
    defs: Vec<IsoformDef>,
    variants: &[SequenceVariant],
    warnings: &mut Vec<ParseWarning>,
) -> Vec<Isoform> {
    let mut edits_by_isoform: Vec<Vec<IsoformEdit>> = vec![Vec::new(); defs.len()];
    let known_features: BTreeSet<&str> = variants
        .iter()
        .filter_map(|variant| variant.feature_id.as_deref())
        .collect();
    for def in &defs {
        if let Some(IsoformSequence::Described(ids)) = &def.sequence_ref {
            for feature_id in ids {
                if !known_features.contains(feature_id.as_str()) {
                    warnings.push(ParseWarning::UnknownFeature {
                        accession: accession.to_string(),
                        isoform: def.name.clone(),
                        feature_id: feature_id.clone(),
                    });
                }
            }
        }
    }
    for variant in variants {
        if let Some(expected) = &variant.original {
            let found = canonical
                .get(variant.start.saturating_sub(1)..variant.end)
                .unwrap_or("");
            if variant.start > 0 && !found.is_empty() && found != expected {
                warnings.push(ParseWarning::EditMismatch {
                    accession: accession.to_string(),
                    start: variant.start,
                    end: variant.end,
                    expected: expected.clone(),
                    found: found.to_string(),
                });
                continue;
            }
        }

        let edit = IsoformEdit::new(variant.start, variant.end, variant.replacement.clone());
        let mut targets: Vec<usize> = Vec::new();
        for name in &variant.isoforms {
            match defs.iter().position(|def| &def.name == name) {
                Some(pos) => targets.push(pos),
                None => warnings.push(ParseWarning::DanglingIsoform {
                    accession: accession.to_string(),
                    isoform: name.clone(),
                    start: variant.start,
                    end: variant.end,
                }),
            }
        }
        if let Some(feature_id) = &variant.feature_id {
            for (pos, def) in defs.iter().enumerate() {
                if let Some(IsoformSequence::Described(ids)) = &def.sequence_ref {
                    if ids.contains(feature_id) {
                        targets.push(pos);
                    }
                }
            }
        }
        targets.sort_unstable();
        targets.dedup();
        for pos in targets {
            edits_by_isoform[pos].push(edit.clone());
        }
    }

    defs.into_iter()
        .zip(edits_by_isoform)
        .map(|(def, edits)| {
            let sequence_ref = def
                .sequence_ref
                .unwrap_or_else(|| IsoformSequence::Described(Vec::new()));
            let (edits, sequence) = match &sequence_ref {
                IsoformSequence::Displayed => (Vec::new(), Some(canonical.to_string())),
                IsoformSequence::External | IsoformSequence::NotDescribed => (Vec::new(), None),
                IsoformSequence::Described(_) => {
                    let rebuilt = reconstruct(canonical, &edits);
                    for (edit, rejection) in rebuilt.rejected {
                        warnings.push(match rejection {
                            EditRejection::OutOfRange { length } => ParseWarning::EditOutOfRange {
                                accession: accession.to_string(),
                                isoform: def.name.clone(),
                                start: edit.start,
                                end: edit.end,
                                length,
                            },
                            EditRejection::Overlap { other_start } => {
                                ParseWarning::OverlappingEdit {
                                    accession: accession.to_string(),
                                    isoform: def.name.clone(),
                                    start: edit.start,
                                    end: edit.end,
                                    other_start,
                                }
                            }
                            EditRejection::NonAscii => ParseWarning::NonAsciiSequence {
                                accession: accession.to_string(),
                                isoform: def.name.clone(),
                                start: edit.start,
                                end: edit.end,
                            },
                        });
                    }
                    (rebuilt.applied, Some(rebuilt.sequence))
                }
            };
            Isoform {
                name: def.name,
                isoform_id: def.isoform_id,
                sequence_ref,
                edits,
                sequence,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn descending_application_keeps_coordinates() {
        let edits = vec![IsoformEdit::new(2, 4, "XY"), IsoformEdit::new(5, 5, "")];
        let rebuilt = reconstruct("MSTAVLK", &edits);
        assert_eq!(rebuilt.sequence, "MXYLK");
        assert_eq!(rebuilt.applied[0], IsoformEdit::new(5, 5, ""));
        assert!(rebuilt.rejected.is_empty());
    }

    #[test]
    fn order_of_input_edits_does_not_matter() {
        let forward = vec![IsoformEdit::new(1, 1, "MA"), IsoformEdit::new(6, 7, "")];
        let backward: Vec<_> = forward.iter().rev().cloned().collect();
        assert_eq!(
            reconstruct("MSTAVLK", &forward).sequence,
            reconstruct("MSTAVLK", &backward).sequence
        );
        assert_eq!(reconstruct("MSTAVLK", &forward).sequence, "MASTAV");
    }

    #[test]
    fn out_of_range_and_overlapping_edits_are_rejected() {
        let edits = vec![
            IsoformEdit::new(6, 9, "Q"),
            IsoformEdit::new(3, 5, "W"),
            IsoformEdit::new(4, 6, ""),
            IsoformEdit::new(0, 1, "M"),
        ];
        let rebuilt = reconstruct("MSTAVLK", &edits);
        assert_eq!(rebuilt.sequence, "MSTK");
        assert_eq!(rebuilt.rejected.len(), 3);
        assert_matches!(rebuilt.rejected[0].1, EditRejection::OutOfRange { length: 7 });
        assert_matches!(
            rebuilt.rejected[1].1,
            EditRejection::Overlap { other_start: 4 }
        );
        assert_matches!(rebuilt.rejected[2].1, EditRejection::OutOfRange { .. });
    }

    #[test]
    fn non_ascii_sequence_is_left_untouched() {
        let rebuilt = reconstruct("MSTÄVLK", &[IsoformEdit::new(2, 4, "XY")]);
        assert_eq!(rebuilt.sequence, "MSTÄVLK");
        assert!(rebuilt.applied.is_empty());
        assert_matches!(&rebuilt.rejected[..], [(_, EditRejection::NonAscii)]);
    }

    #[test]
    fn variant_description_forms() {
        assert_eq!(
            parse_variant_description("Missing (in isoform 2 and isoform 3)"),
            Some((None, String::new(), vec!["2".to_string(), "3".to_string()]))
        );
        assert_eq!(
            parse_variant_description("DQTSF -> GFK (in isoform 2, isoform Beta and isoform 4)."),
            Some((
                Some("DQTSF".to_string()),
                "GFK".to_string(),
                vec!["2".to_string(), "Beta".to_string(), "4".to_string()]
            ))
        );
        assert_eq!(parse_variant_description("something odd"), None);
    }

    #[test]
    fn record_without_terminator_is_reported() {
        let report = parse("ID   X_HUMAN   Reviewed;   3 AA.\nAC   P11111;\nSQ   SEQUENCE   3 AA;\n     MAK\n");
        assert!(report.records.is_empty());
        assert_matches!(
            &report.warnings[..],
            [ParseWarning::MalformedRecord { entry, .. }] if entry == "X_HUMAN"
        );
    }
}
