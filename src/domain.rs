use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SeqidError;

/// Every `from`/`to` scheme code the mapping service accepts, in probe order.
pub const SCHEME_UNIVERSE: &[&str] = &[
    "ACC",
    "ID",
    "UPARC",
    "NF50",
    "NF90",
    "NF100",
    "EMBL_ID",
    "EMBL",
    "PIR",
    "UNIGENE_ID",
    "P_ENTREZGENEID",
    "P_GI",
    "P_IPI",
    "P_REFSEQ_AC",
    "REFSEQ_NT_ID",
    "PDB_ID",
    "DISPROT_ID",
    "HSSP_ID",
    "DIP_ID",
    "MINT_ID",
    "ALLERGOME_ID",
    "MEROPS_ID",
    "MYCOCLAP_ID",
    "PEROXIBASE_ID",
    "PPTASEDB_ID",
    "REBASE_ID",
    "TCDB_ID",
    "PHOSSITE_ID",
    "DMDM_ID",
    "AARHUS_GHENT_2DPAGE_ID",
    "WORLD_2DPAGE_ID",
    "DNASU_ID",
    "ENSEMBL_ID",
    "ENSEMBL_PRO_ID",
    "ENSEMBL_TRS_ID",
    "ENSEMBLGENOME_ID",
    "ENSEMBLGENOME_PRO_ID",
    "ENSEMBLGENOME_TRS_ID",
    "GENOMEREVIEWS_ID",
    "KEGG_ID",
    "PATRIC_ID",
    "UCSC_ID",
    "VECTORBASE_ID",
    "AGD_ID",
    "ARACHNOSERVER_ID",
    "CGD",
    "CONOSERVER_ID",
    "CYGD_ID",
    "DICTYBASE_ID",
    "ECHOBASE_ID",
    "ECOGENE_ID",
    "EUHCVDB_ID",
    "EUPATHDB_ID",
    "FLYBASE_ID",
    "GENECARDS_ID",
    "GENEFARM_ID",
    "GENOLIST_ID",
    "H_INVDB_ID",
    "HGNC_ID",
    "HPA_ID",
    "LEGIOLIST_ID",
    "LEPROMA_ID",
    "MAIZEGDB_ID",
    "MIM_ID",
    "MGI_ID",
    "NEXTPROT_ID",
    "ORPHANET_ID",
    "PHARMGKB_ID",
    "POMBASE_ID",
    "PSEUDOCAP_ID",
    "RGD_ID",
    "SGD_ID",
    "TAIR_ID",
    "TUBERCULIST_ID",
    "WORMBASE_ID",
    "WORMBASE_TRS_ID",
    "WORMBASE_PRO_ID",
    "XENBASE_ID",
    "ZFIN_ID",
    "EGGNOG_ID",
    "GENETREE_ID",
    "HOGENOM_ID",
    "HOVERGEN_ID",
    "KO_ID",
    "OMA_ID",
    "ORTHODB_ID",
    "PROTCLUSTDB_ID",
    "BIOCYC_ID",
    "REACTOME_ID",
    "UNIPATHWAY_ID",
    "CLEANEX_ID",
    "GERMONLINE_ID",
    "CHEMBL_ID",
    "CHITARS_ID",
    "DRUGBANK_ID",
    "GENOMERNAI_ID",
    "NEXTBIO_ID",
];

static ACCESSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([OPQ][0-9][A-Z0-9]{3}[0-9]|[A-NR-Z][0-9]([A-Z][A-Z0-9]{2}[0-9]){1,2})(-[0-9]+)?$")
        .unwrap()
});

/// A mapping-service scheme code such as `ACC`, `ID` or `P_REFSEQ_AC`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemeTag(String);

impl SchemeTag {
    pub const ACCESSION: &'static str = "ACC";
    pub const DISPLAY_ID: &'static str = "ID";
    pub const ACCESSION_OR_ID: &'static str = "ACC+ID";

    /// Canonical accession, the scheme everything resolves into.
    pub fn accession() -> Self {
        Self(Self::ACCESSION.to_string())
    }

    pub fn display_id() -> Self {
        Self(Self::DISPLAY_ID.to_string())
    }

    /// Permissive source scheme matching either an accession or a display id.
    pub fn accession_or_id() -> Self {
        Self(Self::ACCESSION_OR_ID.to_string())
    }

    pub fn universe() -> Vec<Self> {
        SCHEME_UNIVERSE
            .iter()
            .map(|code| Self(code.to_string()))
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SchemeTag {
    type Err = SeqidError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '+');
        if !is_valid {
            return Err(SeqidError::InvalidScheme(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// A raw identifier plus the scheme it is known to belong to, if any.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub value: String,
    pub scheme: Option<SchemeTag>,
}

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            scheme: None,
        }
    }

    pub fn with_scheme(value: impl Into<String>, scheme: SchemeTag) -> Self {
        Self {
            value: value.into(),
            scheme: Some(scheme),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A canonical UniProtKB accession, optionally with an isoform suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessionId(String);

impl AccessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The accession without any `-N` isoform suffix.
    pub fn base(&self) -> &str {
        self.0.split_once('-').map(|(base, _)| base).unwrap_or(&self.0)
    }

    pub fn isoform(&self) -> Option<u32> {
        self.0
            .split_once('-')
            .and_then(|(_, suffix)| suffix.parse().ok())
    }
}

impl fmt::Display for AccessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccessionId {
    type Err = SeqidError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        if !ACCESSION_RE.is_match(&normalized) {
            return Err(SeqidError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

pub fn is_accession(value: &str) -> bool {
    ACCESSION_RE.is_match(value)
}

/// One `(source, target)` line of a mapping response. A source with no pair
/// is simply unmapped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MappingPair {
    pub source: String,
    pub target: String,
}

impl MappingPair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}
