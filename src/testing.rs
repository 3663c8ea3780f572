//! Test doubles and fixtures shared across modules.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::context::Context;
use crate::error::JsonError;
use crate::models::{Config, LookupItem, RecordKind};
use crate::services::upstream::Upstream;
use crate::storage::{LocalSnapshots, MemoryCache, SqliteStore};

/// In-memory upstream. Missing ids answer `NotFound`, like the `{"id": 0}`
/// placeholder of the real API.
#[derive(Default)]
pub struct FakeUpstream {
    records: Mutex<HashMap<(RecordKind, i64), Value>>,
    failing: Mutex<HashSet<(RecordKind, i64)>>,
    lookups: Mutex<HashMap<String, Vec<LookupItem>>>,
    calls: Mutex<HashMap<(RecordKind, i64), usize>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: RecordKind, id: i64, value: Value) {
        self.records.lock().unwrap().insert((kind, id), value);
    }

    pub fn remove(&self, kind: RecordKind, id: i64) {
        self.records.lock().unwrap().remove(&(kind, id));
    }

    /// Make `(kind, id)` answer with a connection failure.
    pub fn fail(&self, kind: RecordKind, id: i64) {
        self.failing.lock().unwrap().insert((kind, id));
    }

    pub fn insert_lookup(&self, path: &str, items: &[(i64, &str)]) {
        let items = items
            .iter()
            .map(|(id, description)| LookupItem {
                id: json!(id.to_string()),
                description: description.to_string(),
            })
            .collect();
        self.lookups.lock().unwrap().insert(path.to_string(), items);
    }

    pub fn calls(&self, kind: RecordKind, id: i64) -> usize {
        self.calls.lock().unwrap().get(&(kind, id)).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn fetch_record(&self, kind: RecordKind, id: i64) -> Result<Value, JsonError> {
        *self.calls.lock().unwrap().entry((kind, id)).or_default() += 1;
        let url = format!("fake://{}/{}", kind.endpoint(), id);
        if self.failing.lock().unwrap().contains(&(kind, id)) {
            return Err(JsonError::ConnectionFailed {
                url,
                message: "connection reset".into(),
            });
        }
        self.records
            .lock()
            .unwrap()
            .get(&(kind, id))
            .cloned()
            .ok_or(JsonError::NotFound { url })
    }

    async fn fetch_lookup(&self, path: &str) -> Result<Vec<LookupItem>, JsonError> {
        self.lookups
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| JsonError::NotFound {
                url: format!("fake://{path}"),
            })
    }
}

/// Context over an in-memory store, temp snapshots and a fake upstream.
pub fn context(tmp: &TempDir, upstream: Arc<FakeUpstream>) -> Context {
    let config = Config::default();
    Context::new(
        Arc::new(config),
        Arc::new(SqliteStore::open_in_memory().unwrap()),
        Arc::new(LocalSnapshots::new(tmp.path())),
        upstream,
        Arc::new(MemoryCache::new(1_000)),
    )
}

pub fn entity_json(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "description": name,
        "nif": format!("5{id:08}"),
        "country": "Portugal",
    })
}

pub fn contract_json(id: i64, price: &str, contracting: &[i64], contracted: &[i64]) -> Value {
    let refs = |ids: &[i64]| ids.iter().map(|id| json!({"id": id})).collect::<Vec<_>>();
    json!({
        "id": id,
        "description": "Aquisição de serviços",
        "objectBriefDescription": "Prestação de serviços de limpeza",
        "initialContractualPrice": price,
        "publicationDate": "02-05-2013",
        "signingDate": "30-04-2013",
        "cpvs": "90910000-9, Serviços de limpeza",
        "contractingProcedureType": "Ajuste Direto Regime Geral",
        "contractTypes": "Aquisição de serviços",
        "executionPlace": "Portugal, Faro, Loulé",
        "contracting": refs(contracting),
        "contracted": refs(contracted),
    })
}

pub fn tender_json(id: i64, contracting: &[i64]) -> Value {
    let refs: Vec<_> = contracting.iter().map(|id| json!({"id": id})).collect();
    json!({
        "id": id,
        "contractDesignation": "Empreitada de requalificação",
        "basePrice": "250.000,00 €",
        "drPublicationDate": "10-01-2014",
        "proposalDeadline": "20 dias.",
        "cpvs": "45233140-2, Obras rodoviárias",
        "type": "Anúncio de procedimento",
        "modelType": "Concurso público",
        "contractType": "Empreitadas de obras públicas",
        "announcementNumber": "123/2014",
        "contractingEntities": refs,
        "reference": "https://dre.pt/application/external/eurolex?docid=5621834",
        "dreNumber": "7",
        "dreSeries": 2,
    })
}

/// Lookup rows referenced by the JSON fixtures above.
pub fn seed_lookups(store: &SqliteStore) {
    use crate::storage::LookupTable;

    store.insert_country("Portugal").unwrap();
    let portugal = store.country_id("Portugal").unwrap().unwrap();
    store.insert_district(8, "Faro", portugal).unwrap();
    let faro = store.district_id("Faro", portugal).unwrap().unwrap();
    store.insert_council(810, "Loulé", faro).unwrap();

    store.insert_lookup(LookupTable::ProcedureType, 1, "Ajuste Direto Regime Geral").unwrap();
    store.insert_lookup(LookupTable::ContractType, 2, "Aquisição de serviços").unwrap();
    store.insert_lookup(LookupTable::ContractType, 3, "Empreitadas de obras públicas").unwrap();
    store.insert_lookup(LookupTable::ContractType, 4, "Outros").unwrap();
    store.insert_lookup(LookupTable::ActType, 1, "Anúncio de procedimento").unwrap();
    store.insert_lookup(LookupTable::ModelType, 1, "Concurso público").unwrap();
    store.insert_category("90910000-9", "Serviços de limpeza", "Cleaning services").unwrap();
}
