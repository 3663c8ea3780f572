//! Record kinds and their validated, store-ready shapes.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The closed set of upstream record kinds that are synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Entity,
    Contract,
    Tender,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Entity, RecordKind::Contract, RecordKind::Tender];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Entity => "entity",
            RecordKind::Contract => "contract",
            RecordKind::Tender => "tender",
        }
    }

    /// REST path segment on the upstream API (also the snapshot directory).
    pub fn endpoint(&self) -> &'static str {
        match self {
            RecordKind::Entity => "entidades",
            RecordKind::Contract => "contratos",
            RecordKind::Tender => "anuncios",
        }
    }

    /// Whether upstream renumbers records of this kind, so a local id that
    /// now answers NotFound is gone. Entities are referenced by contracts and
    /// tenders and are never removed this way.
    pub fn is_renumbered(&self) -> bool {
        matches!(self, RecordKind::Contract | RecordKind::Tender)
    }

    /// Relational table holding records of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            RecordKind::Entity => "entities",
            RecordKind::Contract => "contracts",
            RecordKind::Tender => "tenders",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "entity" | "entities" | "entidades" => Ok(RecordKind::Entity),
            "contract" | "contracts" | "contratos" => Ok(RecordKind::Contract),
            "tender" | "tenders" | "anuncios" => Ok(RecordKind::Tender),
            other => Err(format!("unknown record kind '{other}'")),
        }
    }
}

/// A validated entity (public body or company).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub base_id: i64,
    pub name: String,
    pub nif: String,
    pub country_id: Option<i64>,
}

/// A validated contract. Foreign keys are local row ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractRecord {
    pub base_id: i64,
    pub added_date: NaiveDate,
    pub signing_date: Option<NaiveDate>,
    pub contract_type_id: Option<i64>,
    pub procedure_type_id: Option<i64>,
    pub description: Option<String>,
    pub contract_description: String,
    pub cpvs: Option<String>,
    pub category_id: Option<i64>,
    /// Price in cents.
    pub price: i64,
    pub country_id: Option<i64>,
    pub district_id: Option<i64>,
    pub council_id: Option<i64>,
    /// Local ids of the contracting entities.
    pub contractors: Vec<i64>,
    /// Local ids of the contracted entities.
    pub contracted: Vec<i64>,
}

/// A validated tender announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenderRecord {
    pub base_id: i64,
    pub description: Option<String>,
    pub act_type_id: Option<i64>,
    pub model_type_id: Option<i64>,
    pub contract_type_id: Option<i64>,
    pub announcement_number: Option<String>,
    pub publication_date: NaiveDate,
    pub deadline_date: NaiveDate,
    pub cpvs: Option<String>,
    pub category_id: Option<i64>,
    /// Base price in cents.
    pub price: Option<i64>,
    pub dre_number: i64,
    pub dre_series: i64,
    pub dre_document: i64,
    pub contractors: Vec<i64>,
}

/// Output of the per-kind validators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanedRecord {
    Entity(EntityRecord),
    Contract(ContractRecord),
    Tender(TenderRecord),
}

impl CleanedRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            CleanedRecord::Entity(_) => RecordKind::Entity,
            CleanedRecord::Contract(_) => RecordKind::Contract,
            CleanedRecord::Tender(_) => RecordKind::Tender,
        }
    }

    pub fn base_id(&self) -> i64 {
        match self {
            CleanedRecord::Entity(r) => r.base_id,
            CleanedRecord::Contract(r) => r.base_id,
            CleanedRecord::Tender(r) => r.base_id,
        }
    }
}

/// Result of an insert-or-update keyed by ExternalID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub kind: RecordKind,
    /// Local row id.
    pub id: i64,
    pub base_id: i64,
    pub created: bool,
}

/// One row of a static lookup list (`{"id": .., "description": ..}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupItem {
    pub id: serde_json::Value,
    pub description: String,
}

impl LookupItem {
    /// Upstream ids arrive either as numbers or numeric strings.
    pub fn base_id(&self) -> Option<i64> {
        match &self.id {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
